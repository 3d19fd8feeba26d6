use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use serde::de::DeserializeOwned;

use pboss_core::{EndResponse, Persona, Preferences, StartRequest, StartResponse, StatusSnapshot};

use crate::{endpoint, ApiError, Backend};

/// One scripted reply for a mock endpoint.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 2xx with this JSON body.
    Json(serde_json::Value),
    /// Non-2xx with this status and raw body.
    Status(u16, String),
    /// Connection refused.
    Unreachable,
    /// 2xx with this JSON body, after a delay.
    Slow(Duration, serde_json::Value),
}

/// Scripted backend for tests. Replies are popped per endpoint on each call;
/// when an endpoint's script is exhausted a benign default is returned.
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<HashMap<&'static str, VecDeque<MockReply>>>,
    calls: Mutex<Vec<&'static str>>,
    started_with: Mutex<Vec<StartRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies for an endpoint (see [`crate::endpoint`]).
    pub fn script(&self, endpoint: &'static str, replies: Vec<MockReply>) {
        self.replies
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .extend(replies);
    }

    /// Every endpoint hit so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == endpoint)
            .count()
    }

    /// Bodies received by `start_day`.
    pub fn start_requests(&self) -> Vec<StartRequest> {
        self.started_with.lock().unwrap().clone()
    }

    async fn reply<T: DeserializeOwned>(&self, endpoint: &'static str) -> Result<T, ApiError> {
        self.calls.lock().unwrap().push(endpoint);
        let scripted = self
            .replies
            .lock()
            .unwrap()
            .get_mut(endpoint)
            .and_then(|q| q.pop_front());
        let reply = scripted.unwrap_or_else(|| MockReply::Json(default_body(endpoint)));
        let body = match reply {
            MockReply::Json(body) => body,
            MockReply::Slow(delay, body) => {
                tokio::time::sleep(delay).await;
                body
            }
            MockReply::Status(status, body) => {
                return Err(ApiError::Status {
                    endpoint,
                    status,
                    body,
                })
            }
            MockReply::Unreachable => {
                return Err(ApiError::transport(
                    endpoint,
                    std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                ))
            }
        };
        serde_json::from_value(body).map_err(|source| ApiError::Decode { endpoint, source })
    }
}

fn default_body(endpoint: &str) -> serde_json::Value {
    match endpoint {
        endpoint::PERSONAS => serde_json::json!([{ "id": "p1", "name": "Coach" }]),
        endpoint::PREFS => serde_json::json!({ "consent_given": true, "last_persona": "" }),
        endpoint::CONSENT => serde_json::json!({ "status": "consent recorded" }),
        endpoint::START_DAY => serde_json::json!({ "status": "started", "initial_message": null }),
        endpoint::STATUS => serde_json::json!({
            "work_time": 0, "distraction_time": 0, "idle_time": 0, "message": ""
        }),
        endpoint::END_DAY => serde_json::json!({
            "work_time": 0, "distraction_time": 0, "idle_time": 0, "persona_report": ""
        }),
        _ => serde_json::Value::Null,
    }
}

#[async_trait::async_trait]
impl Backend for MockBackend {
    async fn list_personas(&self) -> Result<Vec<Persona>, ApiError> {
        self.reply(endpoint::PERSONAS).await
    }

    async fn preferences(&self) -> Result<Preferences, ApiError> {
        self.reply(endpoint::PREFS).await
    }

    async fn accept_consent(&self) -> Result<(), ApiError> {
        self.reply::<serde_json::Value>(endpoint::CONSENT).await?;
        Ok(())
    }

    async fn start_day(&self, request: &StartRequest) -> Result<StartResponse, ApiError> {
        self.started_with.lock().unwrap().push(request.clone());
        self.reply(endpoint::START_DAY).await
    }

    async fn status(&self) -> Result<StatusSnapshot, ApiError> {
        self.reply(endpoint::STATUS).await
    }

    async fn end_day(&self) -> Result<EndResponse, ApiError> {
        self.reply(endpoint::END_DAY).await
    }
}
