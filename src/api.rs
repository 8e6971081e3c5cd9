//! Client for the remote account/category/post service.
//!
//! Every endpoint answers with `{"success": true, "data": ...}` or
//! `{"success": false, "error": "..."}`. Failures surface as
//! [`DroverError::Api`] or [`DroverError::Http`]; nothing is retried.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::account_import::ImportCandidate;
use crate::error::{DroverError, Result};
use crate::schedule::BulkPost;
use crate::settings::Settings;

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn into_result(self) -> Result<T> {
        if !self.success {
            return Err(DroverError::Api(
                self.error.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| DroverError::Api("response is missing data".to_string()))
    }
}

/// Decode an enveloped response body.
pub fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => envelope.into_result(),
        Err(_) if !status.is_success() => {
            Err(DroverError::Api(format!("HTTP {status}: {}", body.trim())))
        }
        Err(e) => Err(DroverError::Json(e)),
    }
}

/// Like [`decode_body`] for endpoints whose `data` is empty or irrelevant.
pub fn decode_ack(status: StatusCode, body: &str) -> Result<()> {
    match serde_json::from_str::<Envelope<serde_json::Value>>(body) {
        Ok(envelope) if envelope.success => Ok(()),
        Ok(envelope) => Err(DroverError::Api(
            envelope.error.unwrap_or_else(|| "request failed".to_string()),
        )),
        Err(_) if status.is_success() => Ok(()),
        Err(_) => Err(DroverError::Api(format!("HTTP {status}: {}", body.trim()))),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCategory {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Accounts reference their category either by name or as an embedded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Name(String),
    Object {
        #[serde(default, alias = "_id")]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAccount {
    pub username: String,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
}

impl RemoteAccount {
    /// Category name, resolving id references against the known categories.
    pub fn category_name(&self, categories: &[RemoteCategory]) -> Option<String> {
        match self.category.as_ref()? {
            CategoryRef::Name(name) => categories
                .iter()
                .find(|c| &c.id == name)
                .map(|c| c.name.clone())
                .or_else(|| Some(name.clone())),
            CategoryRef::Object { name: Some(name), .. } => Some(name.clone()),
            CategoryRef::Object { id: Some(id), .. } => categories
                .iter()
                .find(|c| &c.id == id)
                .map(|c| c.name.clone()),
            CategoryRef::Object { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportResult {
    pub username: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteScheduledPost {
    #[serde(default)]
    pub post_text: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RemoteScheduledPost {
    pub fn text(&self) -> &str {
        self.content
            .as_deref()
            .or(self.post_text.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Serialize)]
struct CategoryBody<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct UsernamesBody<'a> {
    usernames: &'a [String],
}

#[derive(Debug, Default, Serialize)]
pub struct AccountPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkImportBody<'a> {
    accounts: &'a [ImportCandidate],
    #[serde(skip_serializing_if = "Option::is_none")]
    category_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkPostBody {
    pub category_id: String,
    pub texts: Vec<String>,
    pub scheduled_times: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_delay_minutes: Option<u32>,
}

impl BulkPostBody {
    /// `immediate` posts go out with no scheduled times.
    pub fn new(bulk: &BulkPost, remote_category_id: &str, immediate: bool) -> Self {
        Self {
            category_id: remote_category_id.to_string(),
            texts: bulk.texts(),
            scheduled_times: if immediate {
                Vec::new()
            } else {
                bulk.scheduled_times()
            },
            random_delay_minutes: bulk.random_delay_minutes,
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| DroverError::Settings(format!("Invalid API URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(DroverError::Settings(format!("Invalid API URL: {base_url}")));
        }
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("drover/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base_url })
    }

    /// Client for the configured service, or `None` when running local-only.
    pub fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        match settings.effective_api_url() {
            Some(url) => Ok(Some(Self::new(
                &url,
                Duration::from_secs(settings.request_timeout_secs),
            )?)),
            None => Ok(None),
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        decode_body(status, &body)
    }

    fn ack(&self, request: RequestBuilder) -> Result<()> {
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        decode_ack(status, &body)
    }

    pub fn get_categories(&self) -> Result<Vec<RemoteCategory>> {
        tracing::info!("GET /categories");
        self.fetch(self.http.get(self.url(&["categories"])))
    }

    pub fn create_category(&self, name: &str, description: &str) -> Result<RemoteCategory> {
        tracing::info!(name, "POST /categories");
        self.fetch(
            self.http
                .post(self.url(&["categories"]))
                .json(&CategoryBody { name, description }),
        )
    }

    pub fn update_category(&self, id: &str, name: &str, description: &str) -> Result<RemoteCategory> {
        tracing::info!(id, name, "PATCH /categories/:id");
        self.fetch(
            self.http
                .patch(self.url(&["categories", id]))
                .json(&CategoryBody { name, description }),
        )
    }

    pub fn delete_category(&self, id: &str) -> Result<()> {
        tracing::info!(id, "DELETE /categories/:id");
        self.ack(self.http.delete(self.url(&["categories", id])))
    }

    pub fn get_accounts(&self) -> Result<Vec<RemoteAccount>> {
        tracing::info!("GET /accounts");
        self.fetch(self.http.get(self.url(&["accounts"])))
    }

    pub fn add_accounts_to_category(&self, category_id: &str, usernames: &[String]) -> Result<()> {
        tracing::info!(category_id, count = usernames.len(), "POST /accounts/category/:id");
        self.ack(
            self.http
                .post(self.url(&["accounts", "category", category_id]))
                .json(&UsernamesBody { usernames }),
        )
    }

    pub fn update_account(&self, username: &str, patch: &AccountPatch) -> Result<()> {
        tracing::info!(username, "PATCH /accounts/:username");
        self.ack(self.http.patch(self.url(&["accounts", username])).json(patch))
    }

    pub fn delete_account(&self, username: &str) -> Result<()> {
        tracing::info!(username, "DELETE /accounts/:username");
        self.ack(self.http.delete(self.url(&["accounts", username])))
    }

    pub fn import_accounts(
        &self,
        accounts: &[ImportCandidate],
        category_id: Option<&str>,
    ) -> Result<Vec<ImportResult>> {
        tracing::info!(count = accounts.len(), "POST /accounts/import/bulk");
        self.fetch(
            self.http
                .post(self.url(&["accounts", "import", "bulk"]))
                .json(&BulkImportBody {
                    accounts,
                    category_id,
                }),
        )
    }

    pub fn create_bulk_post(&self, body: &BulkPostBody) -> Result<()> {
        tracing::info!(count = body.texts.len(), "POST /posts/bulk");
        self.ack(self.http.post(self.url(&["posts", "bulk"])).json(body))
    }

    pub fn get_scheduled_posts(&self) -> Result<Vec<RemoteScheduledPost>> {
        tracing::info!("GET /posts/scheduled");
        self.fetch(self.http.get(self.url(&["posts", "scheduled"])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostCandidate;

    #[test]
    fn test_envelope_success() {
        let body = r#"{"success": true, "data": [{"id": "c1", "name": "Personal", "description": ""}]}"#;
        let cats: Vec<RemoteCategory> = decode_body(StatusCode::OK, body).unwrap();
        assert_eq!(cats[0].id, "c1");
        assert_eq!(cats[0].name, "Personal");
    }

    #[test]
    fn test_envelope_failure_carries_error() {
        let body = r#"{"success": false, "error": "Category not found"}"#;
        let err = decode_body::<RemoteCategory>(StatusCode::NOT_FOUND, body).unwrap_err();
        assert_eq!(err.to_string(), "API error: Category not found");
    }

    #[test]
    fn test_non_json_error_status() {
        let err = decode_body::<Vec<RemoteAccount>>(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").unwrap_err();
        assert!(err.to_string().contains("HTTP 502"));
        assert!(decode_ack(StatusCode::INTERNAL_SERVER_ERROR, "oops").is_err());
    }

    #[test]
    fn test_ack_accepts_empty_data() {
        assert!(decode_ack(StatusCode::OK, r#"{"success": true, "data": {}}"#).is_ok());
        assert!(decode_ack(StatusCode::NO_CONTENT, "").is_ok());
        assert!(decode_ack(StatusCode::OK, r#"{"success": false, "error": "nope"}"#).is_err());
    }

    #[test]
    fn test_account_category_ref_forms() {
        let cats = vec![RemoteCategory {
            id: "c9".into(),
            name: "Business".into(),
            description: String::new(),
        }];
        let body = r#"{"success": true, "data": [
            {"username": "a", "category": "Personal"},
            {"username": "b", "category": {"id": "c9"}},
            {"username": "c", "category": {"_id": "x", "name": "Marketing"}},
            {"username": "d", "category": "c9"},
            {"username": "e"}
        ]}"#;
        let accounts: Vec<RemoteAccount> = decode_body(StatusCode::OK, body).unwrap();
        let names: Vec<Option<String>> = accounts.iter().map(|a| a.category_name(&cats)).collect();
        assert_eq!(
            names,
            vec![
                Some("Personal".to_string()),
                Some("Business".to_string()),
                Some("Marketing".to_string()),
                Some("Business".to_string()),
                None
            ]
        );
    }

    #[test]
    fn test_url_encodes_segments() {
        let client = ApiClient::new("http://localhost:3090/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.url(&["accounts", "a b"]).as_str(),
            "http://localhost:3090/api/accounts/a%20b"
        );
        assert_eq!(client.url(&["categories"]).as_str(), "http://localhost:3090/api/categories");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_bulk_post_body_shape() {
        let bulk = BulkPost::new(
            3,
            vec![PostCandidate {
                content: "Hello".into(),
                time: "9:00 am".parse().unwrap(),
            }],
            Some(5),
        )
        .unwrap();
        let json = serde_json::to_value(BulkPostBody::new(&bulk, "remote-3", false)).unwrap();
        assert_eq!(json["categoryId"], "remote-3");
        assert_eq!(json["texts"][0], "Hello");
        assert_eq!(json["scheduledTimes"][0], "9:00 AM");
        assert_eq!(json["randomDelayMinutes"], 5);

        let immediate = serde_json::to_value(BulkPostBody::new(&bulk, "remote-3", true)).unwrap();
        assert_eq!(immediate["scheduledTimes"].as_array().unwrap().len(), 0);
    }
}
