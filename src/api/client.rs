//! Platform API Client
//!
//! Wraps a [`Transport`] with bearer authentication, bounded retries and
//! failure classification, and exposes the three endpoints the action
//! uses.

use std::sync::Arc;

use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use super::models::{package_id_value, DeploymentRecord, PackageListing, PackageRecord, PackageRef};
use super::retry::{RetryPolicy, RetryState};
use super::transport::{ApiRequest, ApiResponse, FilePart, MultipartBody, ReqwestTransport, Transport, REQUEST_TIMEOUT};
use crate::error::{ActionError, Result};

/// Versioned prefix of the open API.
pub const API_BASE_PATH: &str = "/public/sun/open-api/v1";

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 512;

/// What to do with the outcome of one attempt.
enum Verdict {
    Done(ApiResponse),
    Fatal(ActionError),
    Retry(ActionError, Option<std::time::Duration>),
}

/// A package stored by the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadedPackage {
    pub record: PackageRecord,
    /// The platform updated an existing `(name, tag)` instead of creating one
    pub was_updated: bool,
}

/// Authenticated, retrying client for the platform API.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    token: SecretString,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("token", &"[REDACTED]")
            .field("policy", &self.policy)
            .finish()
    }
}

impl ApiClient {
    /// Creates a client talking to `base_url` over HTTPS.
    pub fn new(base_url: &str, token: SecretString) -> Result<Self> {
        let transport = ReqwestTransport::new(base_url, REQUEST_TIMEOUT)?;
        Ok(Self::with_transport(Arc::new(transport), token))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, token: SecretString) -> Self {
        Self {
            transport,
            token,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `request`, retrying transient failures.
    ///
    /// Returns the response for any 2xx/3xx status. 401/403 fail at once
    /// with `Auth`; other 4xx except 429 fail at once with `Api`; network
    /// errors, 5xx and 429 are retried up to the policy's attempt bound,
    /// after which the last error is returned.
    pub async fn call(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut state = RetryState::new();

        loop {
            state.attempt += 1;

            let verdict = match self.transport.send(request, &self.token).await {
                Ok(response) => self.classify(response),
                Err(error) if error.is_retryable() => Verdict::Retry(error, None),
                Err(error) => Verdict::Fatal(error),
            };

            match verdict {
                Verdict::Done(response) => {
                    debug!(
                        "{} -> {} (attempt {})",
                        request.label(),
                        response.status,
                        state.attempt
                    );
                    return Ok(response);
                }
                Verdict::Fatal(error) => return Err(error),
                Verdict::Retry(error, hint) => {
                    if state.exhausted(&self.policy) {
                        warn!(
                            "{} failed after {} attempts: {}",
                            request.label(),
                            state.attempt,
                            error
                        );
                        state.last_error = Some(error);
                        break;
                    }

                    let delay = self.policy.next_delay(state.attempt, hint);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        request.label(),
                        state.attempt,
                        self.policy.max_attempts,
                        error,
                        delay
                    );
                    state.last_error = Some(error);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(state.into_error())
    }

    fn classify(&self, response: ApiResponse) -> Verdict {
        match response.status {
            200..=399 => Verdict::Done(response),
            401 | 403 => Verdict::Fatal(ActionError::Auth {
                status: response.status,
                body: self.error_body(&response.body),
            }),
            429 | 500..=599 => {
                let hint = response.retry_after;
                Verdict::Retry(
                    ActionError::Api {
                        status: response.status,
                        body: self.error_body(&response.body),
                    },
                    hint,
                )
            }
            status => Verdict::Fatal(ActionError::Api {
                status,
                body: self.error_body(&response.body),
            }),
        }
    }

    /// Truncates a response body for error messages and strips the token
    /// should the server echo it back.
    fn error_body(&self, body: &str) -> String {
        let token = self.token.expose_secret();
        let cleaned = if token.is_empty() {
            body.trim().to_string()
        } else {
            body.trim().replace(token, "***")
        };

        if cleaned.chars().count() <= MAX_ERROR_BODY {
            cleaned
        } else {
            let cut: String = cleaned.chars().take(MAX_ERROR_BODY).collect();
            format!("{}...", cut)
        }
    }

    /// `POST /packages/` with the archive and its metadata, upserting on
    /// `(name, tag)`.
    pub async fn upload_package(
        &self,
        reference: &PackageRef,
        archive: Vec<u8>,
    ) -> Result<UploadedPackage> {
        let body = MultipartBody {
            fields: vec![
                ("name".to_string(), reference.name.clone()),
                ("tag".to_string(), reference.tag.clone()),
                ("upsert".to_string(), "true".to_string()),
            ],
            file: FilePart {
                field: "package_file".to_string(),
                file_name: reference.archive_name(),
                content_type: "application/gzip".to_string(),
                bytes: archive,
            },
        };

        let request = ApiRequest::post_multipart(format!("{}/packages/", API_BASE_PATH), body);
        let response = self.call(&request).await?;

        match response.status {
            200 | 201 => {
                let record: PackageRecord = response.json()?;
                let was_updated = response.status == 200;
                info!(
                    "Package {} {} (id {})",
                    reference,
                    if was_updated { "updated" } else { "created" },
                    record.id
                );
                Ok(UploadedPackage {
                    record,
                    was_updated,
                })
            }
            status => Err(ActionError::Api {
                status,
                body: self.error_body(&response.body),
            }),
        }
    }

    /// `GET /packages/?name=&tag=`, dropping records that name another
    /// package.
    pub async fn search_packages(&self, reference: &PackageRef) -> Result<Vec<PackageRecord>> {
        let request = ApiRequest::get(format!("{}/packages/", API_BASE_PATH))
            .with_query("name", reference.name.clone())
            .with_query("tag", reference.tag.clone());

        let response = self.call(&request).await?;
        if !response.is_success() {
            return Err(ActionError::Api {
                status: response.status,
                body: self.error_body(&response.body),
            });
        }

        let listing: PackageListing = response.json()?;
        debug!("Package search for {} reported {:?} results", reference, listing.total());

        Ok(listing
            .into_records()
            .into_iter()
            .filter(|record| record.matches(reference))
            .collect())
    }

    /// `POST /deployments/` for one node.
    pub async fn create_deployment(&self, package_id: &str, node_id: &str) -> Result<DeploymentRecord> {
        let request = ApiRequest::post_json(
            format!("{}/deployments/", API_BASE_PATH),
            json!({
                "package_id": package_id_value(package_id),
                "node_id": node_id,
            }),
        );

        let response = self.call(&request).await?;
        if !response.is_success() {
            return Err(ActionError::Api {
                status: response.status,
                body: self.error_body(&response.body),
            });
        }

        response.json()
    }
}
