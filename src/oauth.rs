//! Delegated-authorization flow engine.
//!
//! Implements the browser-redirect authorization flow against the vault's
//! OAuth server: PKCE challenge generation, the authorize redirect URL, the
//! Basic-authenticated code exchange, and refresh-token renewal. Exchanged
//! credentials are persisted wholesale through the shared [`TokenStore`].
//!
//! One flow may be in flight at a time. The pending session lives in a
//! single slot; what happens when `start_flow` finds the slot occupied is
//! the `oauth.pending_flow` config policy.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{OAuthConfig, PendingFlowPolicy};
use crate::models::Credential;
use crate::token_store::TokenStore;

#[derive(Debug, Error)]
pub enum OAuthError {
    /// `start_flow` under the `reject` pending-flow policy while a flow
    /// is already in flight.
    #[error("an authorization flow is already pending; complete it or restart")]
    FlowPending,
    /// Callback state does not match the pending session (or no session
    /// is pending). CSRF guard.
    #[error("authorization state mismatch")]
    StateMismatch,
    /// Callback arrived without an authorization code.
    #[error("authorization callback is missing the code parameter")]
    MissingCode,
    /// Token endpoint rejected the exchange.
    #[error("token exchange rejected: HTTP {status}: {body}")]
    Exchange { status: u16, body: String },
    /// Token endpoint unreachable or response undecodable.
    #[error("token endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("authorize URL could not be built: {0}")]
    BadAuthorizeUrl(#[from] url::ParseError),
    #[error("credential store failure: {0}")]
    Store(#[source] anyhow::Error),
}

/// PKCE verifier/challenge pair. Created fresh per authorization attempt;
/// the verifier only ever lives in process memory.
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Verifier is the URL-safe unpadded base64 of 32 OS-random bytes
    /// (43 chars); challenge is the same encoding of its SHA-256 digest.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        Self::from_verifier(verifier)
    }

    fn from_verifier(verifier: String) -> Self {
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(digest);
        Self {
            verifier,
            challenge,
        }
    }
}

/// The single in-flight authorization session: issued state token plus the
/// PKCE pair whose challenge was sent to the authorize endpoint.
struct FlowSession {
    state: String,
    pkce: PkcePair,
}

/// Token endpoint response body. `expires_in` is relative seconds and is
/// converted to an absolute `expires_at` before persisting.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

pub struct AuthFlowEngine {
    oauth: OAuthConfig,
    store: Arc<dyn TokenStore>,
    http: reqwest::Client,
    session: Mutex<Option<FlowSession>>,
}

impl AuthFlowEngine {
    pub fn new(oauth: OAuthConfig, store: Arc<dyn TokenStore>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(oauth.exchange_timeout_secs))
            .build()?;
        Ok(Self {
            oauth,
            store,
            http,
            session: Mutex::new(None),
        })
    }

    /// Begin a new authorization flow.
    ///
    /// Generates a fresh state token and PKCE pair, installs them as the
    /// pending session, and returns `(state, redirect_url)`. The redirect
    /// URL points the browser at the vault's authorize endpoint.
    pub fn start_flow(&self) -> Result<(String, String), OAuthError> {
        let mut slot = self.session.lock().unwrap();
        if slot.is_some() && self.oauth.pending_flow == PendingFlowPolicy::Reject {
            return Err(OAuthError::FlowPending);
        }

        let mut state_bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);
        let pkce = PkcePair::generate();

        let redirect_url = url::Url::parse_with_params(
            &self.oauth.authorize_url,
            &[
                ("client_id", self.oauth.client_id.as_str()),
                ("scope", self.oauth.scope.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", state.as_str()),
            ],
        )?
        .to_string();

        if slot.is_some() {
            debug!("replacing pending authorization flow");
        }
        *slot = Some(FlowSession {
            state: state.clone(),
            pkce,
        });

        Ok((state, redirect_url))
    }

    /// Complete the flow from the callback parameters.
    ///
    /// The state is checked first: a mismatch (or absent session) fails
    /// without consuming the pending session, so the legitimate callback
    /// can still land. On a match the session is consumed before the
    /// exchange; replaying the same callback then fails `StateMismatch`.
    pub async fn complete_flow(
        &self,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<Credential, OAuthError> {
        let session = {
            let mut slot = self.session.lock().unwrap();
            match (&*slot, state) {
                (Some(pending), Some(returned)) if pending.state == returned => slot.take(),
                _ => return Err(OAuthError::StateMismatch),
            }
        };
        // Checked above; take() on a matched slot always yields the session.
        let session = session.ok_or(OAuthError::StateMismatch)?;

        let code = match code {
            Some(c) if !c.is_empty() => c,
            _ => return Err(OAuthError::MissingCode),
        };

        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.oauth.redirect_uri.clone()),
        ];
        // Some tenants verify PKCE server-side and require the verifier;
        // others reject the extra parameter. Deployment toggle.
        if self.oauth.send_verifier {
            form.push(("code_verifier", session.pkce.verifier));
        }

        let credential = self.exchange(&form).await?;
        info!("authorization code exchanged, credential saved");
        Ok(credential)
    }

    /// Renew the stored credential with the refresh token.
    ///
    /// `Ok(None)` means no refresh token is stored and the user must
    /// re-authorize. A rejected exchange is an error.
    pub async fn refresh(&self) -> Result<Option<Credential>, OAuthError> {
        let refresh_token = self
            .store
            .load()
            .await
            .map_err(OAuthError::Store)?
            .and_then(|c| c.refresh_token);
        let Some(refresh_token) = refresh_token else {
            return Ok(None);
        };

        let form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token),
        ];
        let credential = self.exchange(&form).await?;
        info!("credential renewed via refresh token");
        Ok(Some(credential))
    }

    /// Basic-authenticated POST to the token endpoint; persists and
    /// returns the resulting credential.
    async fn exchange(&self, form: &[(&str, String)]) -> Result<Credential, OAuthError> {
        let response = self
            .http
            .post(&self.oauth.token_url)
            .basic_auth(
                &self.oauth.client_id,
                self.oauth.client_secret.as_deref(),
            )
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Exchange {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let tokens: TokenResponse = response.json().await?;
        let credential = Credential {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens
                .expires_in
                .map(|secs| Utc::now().timestamp() + secs),
        };
        self.store
            .save(&credential)
            .await
            .map_err(OAuthError::Store)?;
        Ok(credential)
    }
}

/// Error bodies get logged and surfaced; keep them readable.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    if body.len() <= MAX {
        return body.to_string();
    }
    let cut: String = body.chars().take(MAX).collect();
    format!("{cut}...")
}
