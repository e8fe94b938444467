//! Authenticated repository client.
//!
//! [`VaultClient`] wraps every outbound call to the repository API with
//! bearer-credential injection and exactly one transparent renewal-and-retry
//! when the vault answers 401. A renewal that yields nothing, or a second
//! 401 after renewal, surfaces as [`ApiError::AuthenticationFailed`] so a
//! revoked grant is never masked as a transient failure. Non-auth errors
//! propagate without retry.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::oauth::AuthFlowEngine;
use crate::query::OrderBy;
use crate::token_store::TokenStore;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential is stored. Terminal: the user must authorize via
    /// /oauth/start before any repository call can succeed.
    #[error("not authorized with the document vault; visit /oauth/start to authorize")]
    Unauthenticated,
    /// Renewal was attempted and the vault still rejected the credential.
    /// Terminal: the user must re-authorize.
    #[error("vault rejected the credential after renewal; re-authorize via /oauth/start")]
    AuthenticationFailed,
    /// Non-auth upstream failure, surfaced as-is and never retried.
    #[error("repository request failed: HTTP {status}: {body}")]
    RequestFailed { status: u16, body: String },
    #[error("repository unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    /// Document body advertised as base64 could not be decoded.
    #[error("document body is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("credential store failure: {0}")]
    Store(#[source] anyhow::Error),
}

pub struct VaultClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    oauth: Arc<AuthFlowEngine>,
}

impl VaultClient {
    pub fn new(
        api: &ApiConfig,
        store: Arc<dyn TokenStore>,
        oauth: Arc<AuthFlowEngine>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            store,
            oauth,
        })
    }

    /// Issue an authenticated request against the repository API.
    ///
    /// Loads the current credential on every call so an out-of-process
    /// renewal is picked up without restart. Returns the response only for
    /// 2xx statuses; every other outcome maps onto an [`ApiError`] variant.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let credential = self
            .store
            .load()
            .await
            .map_err(ApiError::Store)?
            .ok_or(ApiError::Unauthenticated)?;

        let response = self
            .send(method.clone(), path, query, body, &credential.access_token)
            .await?;
        if response.status().as_u16() != 401 {
            return Self::check_status(response).await;
        }

        // Exactly one renewal attempt, then one retry. Anything that still
        // fails authentication afterwards is terminal.
        debug!(path, "vault answered 401, attempting credential renewal");
        let renewed = match self.oauth.refresh().await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                warn!("no refresh token stored, cannot renew");
                return Err(ApiError::AuthenticationFailed);
            }
            Err(e) => {
                warn!(error = %e, "credential renewal failed");
                return Err(ApiError::AuthenticationFailed);
            }
        };

        let retried = self
            .send(method, path, query, body, &renewed.access_token)
            .await?;
        if retried.status().as_u16() == 401 {
            return Err(ApiError::AuthenticationFailed);
        }
        Self::check_status(retried).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        access_token: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(access_token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let body = if body.len() > 500 {
            let cut: String = body.chars().take(500).collect();
            format!("{cut}...")
        } else {
            body
        };
        Err(ApiError::RequestFailed {
            status: status.as_u16(),
            body,
        })
    }

    // ── Typed repository operations ─────────────────────────────────────

    /// `GET /User/cabinets` — the cabinets visible to the authorized user.
    pub async fn user_cabinets(&self) -> Result<Vec<Value>, ApiError> {
        let response = self
            .execute(Method::GET, "/User/cabinets", &[], None)
            .await?;
        Ok(response.json().await?)
    }

    /// `GET /Search[/{cabinetId}]` with the vault's `$`-prefixed paging
    /// parameters. Cross-cabinet when `cabinet_id` is `None`.
    pub async fn search(
        &self,
        q: &str,
        cabinet_id: Option<&str>,
        top: u32,
        order_by: OrderBy,
        select: &str,
    ) -> Result<Value, ApiError> {
        let path = match cabinet_id {
            Some(id) => format!("/Search/{id}"),
            None => "/Search".to_string(),
        };
        let query = [
            ("$top", top.to_string()),
            ("$orderby", format!("{} desc", order_by.as_param())),
            ("$select", select.to_string()),
            ("q", q.to_string()),
        ];
        let response = self.execute(Method::GET, &path, &query, None).await?;
        Ok(response.json().await?)
    }

    /// `GET /Document/{id}/info` — the document's metadata record.
    pub async fn document_info(&self, id: &str) -> Result<Value, ApiError> {
        let response = self
            .execute(Method::GET, &format!("/Document/{id}/info"), &[], None)
            .await?;
        Ok(response.json().await?)
    }

    /// `GET /Document/{id}?base64=true` — the document body, decoded from
    /// the base64 text the vault returns.
    pub async fn download_document(&self, id: &str) -> Result<Vec<u8>, ApiError> {
        let query = [("base64", "true".to_string())];
        let response = self
            .execute(Method::GET, &format!("/Document/{id}"), &query, None)
            .await?;
        let text = response.text().await?;
        // Tolerate line wrapping in the base64 payload.
        let compact: String = text.split_whitespace().collect();
        Ok(STANDARD.decode(compact.as_bytes())?)
    }
}
