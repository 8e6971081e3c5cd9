use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DroverError;
use crate::schedule::{PostStatus, ScheduleTime};

/// Category every orphaned or unclassified account falls back to.
pub const IMPORTED_CATEGORY: &str = "Imported";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = DroverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" | "logged-in" => Ok(Self::Active),
            "inactive" | "logged-out" => Ok(Self::Inactive),
            other => Err(DroverError::Other(format!(
                "Invalid account status: {other} (must be 'active' or 'inactive')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub proxy: Option<String>,
    pub status: AccountStatus,
    pub category_id: Option<i64>,
    /// Joined category name, when the account has one.
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub remote_id: Option<String>,
}

/// A parsed row of a mass-post CSV, not yet bound to a category.
#[derive(Debug, Clone, PartialEq)]
pub struct PostCandidate {
    pub content: String,
    pub time: ScheduleTime,
}

#[derive(Debug, Clone)]
pub struct ScheduledPost {
    pub id: i64,
    pub category_id: i64,
    pub category: String,
    pub content: String,
    pub time: ScheduleTime,
    pub random_delay_minutes: Option<u32>,
    pub status: PostStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: String,
}
