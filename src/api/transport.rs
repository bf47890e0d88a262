//! HTTP Transport
//!
//! A single request/response exchange with the platform, with no retry
//! logic. [`ReqwestTransport`] is the production implementation; tests
//! plug in a scripted one.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ActionError, Result};

/// Per-request timeout used by the production transport.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of an outgoing request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// No body
    Empty,
    /// Serialized as `application/json`
    Json(Value),
    /// Sent as `multipart/form-data`
    Multipart(MultipartBody),
}

/// Text fields plus one file part.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    /// Text fields, in send order
    pub fields: Vec<(String, String)>,
    pub file: FilePart,
}

/// File part of a multipart body. `Debug` shows the length, not the bytes.
#[derive(Clone)]
pub struct FilePart {
    /// Form field name
    pub field: String,
    /// File name reported to the server
    pub file_name: String,
    /// MIME type of the part
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A request against the platform API. `path` is absolute from the host.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute path, starting with `/`
    pub path: String,
    /// Query parameters, in send order
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Json(body),
        }
    }

    pub fn post_multipart(path: impl Into<String>, body: MultipartBody) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Multipart(body),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Short `METHOD path` label for log lines.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Status and body of a platform response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
    /// Parsed `Retry-After` header, when given in seconds
    pub retry_after: Option<Duration>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            ActionError::InvalidResponse(format!("HTTP {} body is not the expected JSON: {}", self.status, e))
        })
    }
}

/// One HTTP exchange. Network-level failures are `ActionError::Network`;
/// any HTTP status, including errors, is an `Ok` response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest, token: &SecretString) -> Result<ApiResponse>;
}

/// `reqwest`-backed transport bound to a base URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("edge-action/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ActionError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn multipart_form(body: &MultipartBody) -> Result<Form> {
        let mut form = Form::new();
        for (key, value) in &body.fields {
            form = form.text(key.clone(), value.clone());
        }

        let part = Part::bytes(body.file.bytes.clone())
            .file_name(body.file.file_name.clone())
            .mime_str(&body.file.content_type)
            .map_err(|e| ActionError::config(format!("invalid content type: {}", e)))?;

        Ok(form.part(body.file.field.clone(), part))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest, token: &SecretString) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!("HTTP {} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .bearer_auth(token.expose_secret())
            .header(ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(body) => builder.multipart(Self::multipart_form(body)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ActionError::Network(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response
            .text()
            .await
            .map_err(|e| ActionError::Network(e.without_url().to_string()))?;

        Ok(ApiResponse {
            status,
            body,
            retry_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builders() {
        let req = ApiRequest::get("/v1/packages/")
            .with_query("name", "sensor")
            .with_query("tag", "v1");
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.query.len(), 2);
        assert_eq!(req.label(), "GET /v1/packages/");

        let req = ApiRequest::post_json("/v1/deployments/", json!({"node_id": "n"}));
        assert!(matches!(req.body, RequestBody::Json(_)));
    }

    #[test]
    fn test_response_json() {
        let resp = ApiResponse::new(201, r#"{"id": 7}"#);
        assert!(resp.is_success());
        let value: Value = resp.json().unwrap();
        assert_eq!(value["id"], 7);

        let resp = ApiResponse::new(200, "<html>");
        let err = resp.json::<Value>().unwrap_err();
        assert!(matches!(err, ActionError::InvalidResponse(_)));
    }

    #[test]
    fn test_file_part_debug_hides_bytes() {
        let part = FilePart {
            field: "package_file".into(),
            file_name: "p.tar.gz".into(),
            content_type: "application/gzip".into(),
            bytes: vec![1, 2, 3],
        };
        let rendered = format!("{:?}", part);
        assert!(rendered.contains("len: 3"));
    }

    #[test]
    fn test_transport_trims_base_url() {
        let transport = ReqwestTransport::new("https://example.test/", REQUEST_TIMEOUT).unwrap();
        assert_eq!(transport.base_url, "https://example.test");
    }
}
