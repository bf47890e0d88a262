//! Platform API Module
//!
//! # Structure
//!
//! - [`transport`]: one HTTP exchange (`reqwest` in production)
//! - [`retry`]: attempt bound and backoff schedule
//! - [`client`]: authenticated retrying client and endpoint calls
//! - [`models`]: package and deployment records

pub mod client;
pub mod models;
pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiClient, UploadedPackage, API_BASE_PATH};
pub use models::{DeploymentRecord, PackageRecord, PackageRef};
pub use retry::{RetryPolicy, RetryState};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
