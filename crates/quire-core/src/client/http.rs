//! reqwest implementation of the delta client.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    ClientError, ClientResult, CreatedResource, DeltaClient, SyncFragment, SyncState,
};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Delta client speaking JSON over HTTP with a bearer API key.
#[derive(Clone)]
pub struct HttpDeltaClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpDeltaClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpDeltaClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpDeltaClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> ClientResult<Self> {
        Self::with_timeout(endpoint, api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        let api_key = normalize_text_option(Some(api_key.into())).ok_or_else(|| {
            ClientError::InvalidConfiguration("API key must not be empty".to_string())
        })?;

        Ok(Self {
            endpoint,
            api_key,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Normalized server base URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v3/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|error| ClientError::InvalidPayload(format!("{error}: {}", compact_text(&body))))
    }
}

#[derive(Debug, Serialize)]
struct BookPayload<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateNotePayload<'a> {
    book_uuid: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateNotePayload<'a> {
    book_uuid: &'a str,
    content: &'a str,
    public: bool,
}

#[derive(Debug, Deserialize)]
struct UsnResponse {
    usn: i64,
}

impl DeltaClient for HttpDeltaClient {
    async fn get_sync_state(&self) -> ClientResult<SyncState> {
        self.send(self.request(Method::GET, "sync/state")).await
    }

    async fn get_sync_fragment(&self, after_usn: i64) -> ClientResult<SyncFragment> {
        let request = self
            .request(Method::GET, "sync/fragment")
            .query(&[("after_usn", after_usn)]);
        self.send(request).await
    }

    async fn create_book(&self, label: &str) -> ClientResult<CreatedResource> {
        let request = self
            .request(Method::POST, "books")
            .json(&BookPayload { name: label });
        self.send(request).await
    }

    async fn update_book(&self, uuid: &str, label: &str) -> ClientResult<i64> {
        let request = self
            .request(Method::PATCH, &format!("books/{uuid}"))
            .json(&BookPayload { name: label });
        let response: UsnResponse = self.send(request).await?;
        Ok(response.usn)
    }

    async fn delete_book(&self, uuid: &str) -> ClientResult<i64> {
        let request = self.request(Method::DELETE, &format!("books/{uuid}"));
        let response: UsnResponse = self.send(request).await?;
        Ok(response.usn)
    }

    async fn create_note(&self, book_uuid: &str, body: &str) -> ClientResult<CreatedResource> {
        let request = self.request(Method::POST, "notes").json(&CreateNotePayload {
            book_uuid,
            content: body,
        });
        self.send(request).await
    }

    async fn update_note(
        &self,
        uuid: &str,
        book_uuid: &str,
        body: &str,
        public: bool,
    ) -> ClientResult<i64> {
        let request = self
            .request(Method::PATCH, &format!("notes/{uuid}"))
            .json(&UpdateNotePayload {
                book_uuid,
                content: body,
                public,
            });
        let response: UsnResponse = self.send(request).await?;
        Ok(response.usn)
    }

    async fn delete_note(&self, uuid: &str) -> ClientResult<i64> {
        let request = self.request(Method::DELETE, &format!("notes/{uuid}"));
        let response: UsnResponse = self.send(request).await?;
        Ok(response.usn)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> ClientResult<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        ClientError::InvalidConfiguration("endpoint must not be empty".to_string())
    })?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(ClientError::InvalidConfiguration(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}
