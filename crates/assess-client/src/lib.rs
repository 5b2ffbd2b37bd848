//! HTTP backend for the assessment session controller.
//!
//! Implements [`assess_session::AssessmentBackend`] against the assessment
//! service's REST API.

pub mod error;
pub mod http;
mod wire;

pub use error::ClientError;
pub use http::HttpBackend;
pub use wire::HealthStatus;
