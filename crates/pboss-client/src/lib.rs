//! Client side of the tracking backend's HTTP contract.
//!
//! The backend is an opaque local process; this crate only knows the six
//! endpoints it serves. [`Backend`] is the seam the session client depends on,
//! [`HttpBackend`] talks to the real process and [`MockBackend`] scripts
//! replies for tests.

mod error;
mod http;
mod mock;

use pboss_core::{EndResponse, Persona, Preferences, StartRequest, StartResponse, StatusSnapshot};

pub use error::ApiError;
pub use http::{probe_address, HttpBackend};
pub use mock::{MockBackend, MockReply};

/// Endpoint paths, relative to the backend base URL.
pub mod endpoint {
    pub const PERSONAS: &str = "/api/personas";
    pub const PREFS: &str = "/api/prefs";
    pub const CONSENT: &str = "/api/consent";
    pub const START_DAY: &str = "/api/start_day";
    pub const STATUS: &str = "/api/status";
    pub const END_DAY: &str = "/api/end_day";
}

/// The backend operations consumed by the session client.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// `GET /api/personas`
    async fn list_personas(&self) -> Result<Vec<Persona>, ApiError>;
    /// `GET /api/prefs`
    async fn preferences(&self) -> Result<Preferences, ApiError>;
    /// `POST /api/consent`
    async fn accept_consent(&self) -> Result<(), ApiError>;
    /// `POST /api/start_day`
    async fn start_day(&self, request: &StartRequest) -> Result<StartResponse, ApiError>;
    /// `GET /api/status`
    async fn status(&self) -> Result<StatusSnapshot, ApiError>;
    /// `GET /api/end_day`
    async fn end_day(&self) -> Result<EndResponse, ApiError>;
}
