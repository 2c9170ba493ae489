//! HTTPS client for the remote entity store.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{
    LivenessProbe, RemoteError, RemoteRecord, RemoteResult, RemoteStore, UpsertAck, UpsertRequest,
};
use crate::util::{is_http_url, normalize_text_option, truncate_chars};

/// Longest error body excerpt kept in a `RemoteError` message
const ERROR_BODY_LIMIT: usize = 180;

/// Supplies the bearer credential attached to every remote call
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed token, e.g. from configuration or the environment
#[derive(Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: normalize_text_option(token),
        }
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StaticCredentials")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[derive(Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    client: Client,
    probe_client: Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpRemoteStore {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        request_timeout: Duration,
        probe_timeout: Duration,
    ) -> RemoteResult<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url.into())?,
            client: Client::builder().timeout(request_timeout).build()?,
            probe_client: Client::builder().timeout(probe_timeout).build()?,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RemoteResult<RequestBuilder> {
        let token = self.credentials.bearer_token().ok_or_else(|| {
            RemoteError::Unauthorized("no credential available for remote sync".to_string())
        })?;
        Ok(request
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json"))
    }
}

impl RemoteStore for HttpRemoteStore {
    async fn upsert(&self, request: &UpsertRequest) -> RemoteResult<UpsertAck> {
        let builder = self.client.put(entity_url(&self.base_url, &request.record_key()));
        let response = self.authorize(builder)?.json(request).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<UpsertAck>().await?)
    }

    async fn list_since(&self, user_id: &str, since: Option<i64>) -> RemoteResult<Vec<RemoteRecord>> {
        let mut query = vec![("userId", user_id.to_string())];
        if let Some(since) = since {
            query.push(("since", since.to_string()));
        }

        let builder = self
            .client
            .get(format!("{}/entities", self.base_url))
            .query(&query);
        let response = self.authorize(builder)?.send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<ListResponse>().await?.into_records())
    }
}

impl LivenessProbe for HttpRemoteStore {
    async fn probe(&self) -> RemoteResult<()> {
        let response = self
            .probe_client
            .head(format!("{}/health", self.base_url))
            .send()
            .await?;
        ensure_success(response).await.map(|_| ())
    }
}

/// A bare array, or the same array wrapped in an `entities` envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Records(Vec<RemoteRecord>),
    Envelope { entities: Vec<RemoteRecord> },
}

impl ListResponse {
    fn into_records(self) -> Vec<RemoteRecord> {
        match self {
            Self::Records(records) | Self::Envelope { entities: records } => records,
        }
    }
}

fn entity_url(base_url: &str, key: &str) -> String {
    format!("{base_url}/entities/{}", urlencoding::encode(key))
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn ensure_success(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    let message = parse_api_error(body);
    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(format!(
            "{} ({code})",
            message.unwrap_or_else(|| "credential rejected".to_string())
        )),
        StatusCode::CONFLICT => RemoteError::Conflict(
            message.unwrap_or_else(|| "remote holds a newer revision".to_string()),
        ),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => RemoteError::Unavailable {
            status: code,
            message: message.unwrap_or_else(|| format!("HTTP {code}")),
        },
        _ if status.is_server_error() => RemoteError::Unavailable {
            status: code,
            message: message.unwrap_or_else(|| format!("HTTP {code}")),
        },
        _ => RemoteError::Rejected {
            status: code,
            message: message.unwrap_or_else(|| format!("HTTP {code}")),
        },
    }
}

fn parse_api_error(body: &str) -> Option<String> {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return Some(message.trim().to_string());
        }
    }

    let trimmed = truncate_chars(body, ERROR_BODY_LIMIT);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let url = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("api base url must not be empty".to_string())
    })?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "api base url must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_base_url(" https://api.example.com/v1/ ".to_string()).unwrap(),
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn classify_status_maps_taxonomy() {
        assert!(classify_status(StatusCode::UNAUTHORIZED, "").is_auth());
        assert!(classify_status(StatusCode::FORBIDDEN, "").is_auth());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(classify_status(StatusCode::CONFLICT, "").is_conflict());

        let rejected = classify_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message": "title too long"}"#,
        );
        assert_eq!(
            rejected,
            RemoteError::Rejected {
                status: 422,
                message: "title too long".to_string()
            }
        );
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn upsert_targets_record_key() {
        assert_eq!(
            entity_url("https://api.example.com", "srv 1"),
            "https://api.example.com/entities/srv%201"
        );
    }

    #[test]
    fn list_response_accepts_bare_and_wrapped_arrays() {
        let record = serde_json::json!({
            "serverId": "srv-1",
            "userId": "u1",
            "title": "T",
            "content": {"type": "journal", "notes": "n"},
            "serverVersion": 1,
            "createdAt": 1,
            "updatedAt": 2
        });

        let bare: ListResponse = serde_json::from_value(serde_json::json!([record])).unwrap();
        assert_eq!(bare.into_records().len(), 1);

        let wrapped: ListResponse =
            serde_json::from_value(serde_json::json!({ "entities": [record] })).unwrap();
        let records = wrapped.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].server_id, "srv-1");
    }

    #[test]
    fn parse_api_error_falls_back_to_raw_body() {
        assert_eq!(parse_api_error(""), None);
        assert_eq!(parse_api_error(" boom "), Some("boom".to_string()));
        assert_eq!(
            parse_api_error(r#"{"error": "conflict"}"#),
            Some("conflict".to_string())
        );
    }

    #[test]
    fn static_credentials_debug_redacts_token() {
        let credentials = StaticCredentials::new(Some("secret".to_string()));
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(credentials.bearer_token().as_deref(), Some("secret"));
        assert!(StaticCredentials::new(Some("  ".into()))
            .bearer_token()
            .is_none());
    }

    #[tokio::test]
    async fn missing_credential_is_unauthorized() {
        let remote = HttpRemoteStore::new(
            "https://api.example.com",
            Arc::new(StaticCredentials::default()),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();

        let error = remote.list_since("u1", None).await.unwrap_err();
        assert!(error.is_auth());
    }
}
