/// Failure of a single backend call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (refused, reset, timed out).
    #[error("{endpoint}: backend unreachable: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The backend answered with a non-2xx status.
    #[error("{endpoint}: backend returned HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// The backend answered 2xx with a body that does not match the contract.
    #[error("{endpoint}: malformed response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid backend URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ApiError {
    pub fn transport(
        endpoint: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ApiError::Transport {
            endpoint,
            source: source.into(),
        }
    }

    /// Error text supplied by the backend itself, if any.
    ///
    /// The backend reports failures as `{"error": "..."}`; that field is
    /// returned when present, otherwise the raw body when it is non-empty.
    pub fn backend_message(&self) -> Option<String> {
        let ApiError::Status { body, .. } = self else {
            return None;
        };
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        if let Ok(val) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(msg) = val.get("error").and_then(|v| v.as_str()) {
                if !msg.is_empty() {
                    return Some(msg.to_string());
                }
            }
        }
        Some(body.to_string())
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }
}
