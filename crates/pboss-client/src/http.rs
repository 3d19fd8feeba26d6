use std::time::Duration;

use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;

use pboss_core::{EndResponse, Persona, Preferences, StartRequest, StartResponse, StatusSnapshot};

use crate::{endpoint, ApiError, Backend};

/// reqwest-backed [`Backend`] for the local tracking process.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: String,
    http: reqwest::Client,
}

impl HttpBackend {
    /// `timeout` of `None` keeps reqwest's default (no overall deadline).
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let parsed = parse_url(base_url)?;
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let http = builder
            .build()
            .map_err(|e| ApiError::transport("client", e))?;
        Ok(Self {
            base: parsed.as_str().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, ApiError> {
        self.send_json(self.http.get(self.url(path)), path).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &'static str,
    ) -> Result<T, ApiError> {
        let bytes = self.send(request, path).await?;
        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
            endpoint: path,
            source,
        })
    }

    /// Send and return the body of a 2xx response.
    async fn send(&self, request: RequestBuilder, path: &'static str) -> Result<Vec<u8>, ApiError> {
        tracing::debug!(endpoint = path, "backend request");
        let resp = request
            .send()
            .await
            .map_err(|e| ApiError::transport(path, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(endpoint = path, status = status.as_u16(), "backend rejected request");
            return Err(ApiError::Status {
                endpoint: path,
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::transport(path, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn list_personas(&self) -> Result<Vec<Persona>, ApiError> {
        self.get_json(endpoint::PERSONAS).await
    }

    async fn preferences(&self) -> Result<Preferences, ApiError> {
        self.get_json(endpoint::PREFS).await
    }

    async fn accept_consent(&self) -> Result<(), ApiError> {
        let request = self.http.post(self.url(endpoint::CONSENT));
        self.send(request, endpoint::CONSENT).await?;
        Ok(())
    }

    async fn start_day(&self, request: &StartRequest) -> Result<StartResponse, ApiError> {
        let builder = self.http.post(self.url(endpoint::START_DAY)).json(request);
        self.send_json(builder, endpoint::START_DAY).await
    }

    async fn status(&self) -> Result<StatusSnapshot, ApiError> {
        self.get_json(endpoint::STATUS).await
    }

    async fn end_day(&self) -> Result<EndResponse, ApiError> {
        self.get_json(endpoint::END_DAY).await
    }
}

/// `host:port` of the backend, for a TCP reachability probe.
pub fn probe_address(base_url: &str) -> Result<String, ApiError> {
    let url = parse_url(base_url)?;
    let host = url.host_str().ok_or_else(|| ApiError::InvalidUrl {
        url: base_url.to_string(),
        reason: "missing host".into(),
    })?;
    let port = url.port_or_known_default().ok_or_else(|| ApiError::InvalidUrl {
        url: base_url.to_string(),
        reason: "missing port".into(),
    })?;
    Ok(format!("{host}:{port}"))
}

fn parse_url(base_url: &str) -> Result<Url, ApiError> {
    let url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::InvalidUrl {
            url: base_url.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(url)
}
