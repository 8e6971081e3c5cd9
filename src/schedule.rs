use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveTime;
use regex::Regex;

use crate::error::{DroverError, Result};
use crate::models::PostCandidate;

/// Longest random spread the posting service accepts.
pub const MAX_RANDOM_DELAY_MINUTES: u32 = 60;

pub const TIME_FORMAT_HINT: &str =
    "Invalid time format. Use \"HH:MM AM/PM\" (e.g., \"9:00 AM\" or \"2:30 PM\")";

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(1[0-2]|0?[1-9]):([0-5][0-9])\s?(AM|PM)$").expect("valid time regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

/// Time of day in the `H:MM AM/PM` form used by the posting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTime {
    hour: u8,
    minute: u8,
    meridiem: Meridiem,
}

impl ScheduleTime {
    pub fn is_valid(raw: &str) -> bool {
        time_regex().is_match(raw.trim())
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        use chrono::Timelike;
        let h24 = time.hour() as u8;
        let meridiem = if h24 >= 12 { Meridiem::Pm } else { Meridiem::Am };
        let hour = match h24 % 12 {
            0 => 12,
            h => h,
        };
        Self {
            hour,
            minute: time.minute() as u8,
            meridiem,
        }
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        let h24 = match (self.meridiem, self.hour) {
            (Meridiem::Am, 12) => 0,
            (Meridiem::Am, h) => h,
            (Meridiem::Pm, 12) => 12,
            (Meridiem::Pm, h) => h + 12,
        };
        NaiveTime::from_hms_opt(h24 as u32, self.minute as u32, 0).unwrap_or_default()
    }

    /// Whether this time has already gone by today.
    pub fn is_past(&self, now: NaiveTime) -> bool {
        self.to_naive_time() < now
    }
}

impl FromStr for ScheduleTime {
    type Err = DroverError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let caps = time_regex()
            .captures(raw)
            .ok_or_else(|| DroverError::Other(format!("Invalid time format: {raw:?} (use \"H:MM AM/PM\")")))?;
        let hour: u8 = caps[1]
            .parse()
            .map_err(|_| DroverError::Other(format!("Invalid hour in {raw:?}")))?;
        let minute: u8 = caps[2]
            .parse()
            .map_err(|_| DroverError::Other(format!("Invalid minute in {raw:?}")))?;
        let meridiem = if caps[3].eq_ignore_ascii_case("pm") {
            Meridiem::Pm
        } else {
            Meridiem::Am
        };
        Ok(Self {
            hour,
            minute,
            meridiem,
        })
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.meridiem {
            Meridiem::Am => "AM",
            Meridiem::Pm => "PM",
        };
        write!(f, "{}:{:02} {suffix}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Pending,
    Completed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for PostStatus {
    type Err = DroverError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(DroverError::Other(format!("Unknown post status: {other}"))),
        }
    }
}

/// A pending post whose time has already passed today reads as completed.
pub fn effective_status(stored: PostStatus, time: &ScheduleTime, now: NaiveTime) -> PostStatus {
    if stored == PostStatus::Pending && time.is_past(now) {
        PostStatus::Completed
    } else {
        stored
    }
}

/// Posts bound to the category whose accounts will publish them.
#[derive(Debug, Clone)]
pub struct BulkPost {
    pub category_id: i64,
    pub posts: Vec<PostCandidate>,
    pub random_delay_minutes: Option<u32>,
}

impl BulkPost {
    pub fn new(
        category_id: i64,
        posts: Vec<PostCandidate>,
        random_delay_minutes: Option<u32>,
    ) -> Result<Self> {
        if posts.is_empty() {
            return Err(DroverError::Other("No valid posts to schedule".into()));
        }
        if let Some(delay) = random_delay_minutes {
            if delay == 0 || delay > MAX_RANDOM_DELAY_MINUTES {
                return Err(DroverError::Other(format!(
                    "Random delay must be between 1 and {MAX_RANDOM_DELAY_MINUTES} minutes"
                )));
            }
        }
        Ok(Self {
            category_id,
            posts,
            random_delay_minutes,
        })
    }

    pub fn texts(&self) -> Vec<String> {
        self.posts.iter().map(|p| p.content.clone()).collect()
    }

    pub fn scheduled_times(&self) -> Vec<String> {
        self.posts.iter().map(|p| p.time.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(raw: &str) -> ScheduleTime {
        raw.parse().unwrap()
    }

    #[test]
    fn test_valid_times() {
        for raw in ["9:00 AM", "09:00 AM", "12:59 pm", "1:05PM", "10:30 Am"] {
            assert!(ScheduleTime::is_valid(raw), "{raw} should be valid");
        }
    }

    #[test]
    fn test_invalid_times() {
        for raw in ["13:00 AM", "9:60 AM", "9:00", "0:30 AM", "9:5 AM", "9:00  AM", "noon"] {
            assert!(!ScheduleTime::is_valid(raw), "{raw} should be invalid");
            assert!(raw.parse::<ScheduleTime>().is_err());
        }
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(t("09:05am").to_string(), "9:05 AM");
        assert_eq!(t("2:30 pm").to_string(), "2:30 PM");
    }

    #[test]
    fn test_to_24_hour() {
        assert_eq!(t("12:15 AM").to_naive_time(), NaiveTime::from_hms_opt(0, 15, 0).unwrap());
        assert_eq!(t("12:00 PM").to_naive_time(), NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(t("1:45 PM").to_naive_time(), NaiveTime::from_hms_opt(13, 45, 0).unwrap());
        assert_eq!(t("11:00 AM").to_naive_time(), NaiveTime::from_hms_opt(11, 0, 0).unwrap());
    }

    #[test]
    fn test_from_naive_round_trips_edges() {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        assert_eq!(ScheduleTime::from_naive(midnight).to_string(), "12:00 AM");
        let noon = NaiveTime::from_hms_opt(12, 7, 0).unwrap();
        assert_eq!(ScheduleTime::from_naive(noon).to_string(), "12:07 PM");
        let evening = NaiveTime::from_hms_opt(21, 30, 0).unwrap();
        assert_eq!(ScheduleTime::from_naive(evening).to_string(), "9:30 PM");
    }

    #[test]
    fn test_effective_status() {
        let now = NaiveTime::from_hms_opt(14, 0, 0).unwrap();
        assert_eq!(effective_status(PostStatus::Pending, &t("9:00 AM"), now), PostStatus::Completed);
        assert_eq!(effective_status(PostStatus::Pending, &t("3:00 PM"), now), PostStatus::Pending);
        assert_eq!(effective_status(PostStatus::Completed, &t("3:00 PM"), now), PostStatus::Completed);
    }

    #[test]
    fn test_bulk_post_validation() {
        let post = PostCandidate {
            content: "hi".into(),
            time: t("9:00 AM"),
        };
        assert!(BulkPost::new(1, vec![], None).is_err());
        assert!(BulkPost::new(1, vec![post.clone()], Some(0)).is_err());
        assert!(BulkPost::new(1, vec![post.clone()], Some(61)).is_err());
        let bulk = BulkPost::new(1, vec![post], Some(5)).unwrap();
        assert_eq!(bulk.texts(), vec!["hi"]);
        assert_eq!(bulk.scheduled_times(), vec!["9:00 AM"]);
    }
}
