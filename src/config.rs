use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::query::OrderBy;

/// Environment variable that overrides `oauth.client_secret` from the file.
pub const CLIENT_SECRET_ENV: &str = "DOCVAULT_CLIENT_SECRET";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub oauth: OAuthConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Deserialize, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    /// May be omitted in the file and supplied via `DOCVAULT_CLIENT_SECRET`.
    #[serde(default)]
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Include the PKCE verifier in the code exchange. Some deployments
    /// reject the parameter, so it is off unless the tenant wants it.
    #[serde(default)]
    pub send_verifier: bool,
    #[serde(default)]
    pub pending_flow: PendingFlowPolicy,
    #[serde(default = "default_exchange_timeout_secs")]
    pub exchange_timeout_secs: u64,
}

// Keeps the client secret out of debug output.
impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("send_verifier", &self.send_verifier)
            .field("pending_flow", &self.pending_flow)
            .field("exchange_timeout_secs", &self.exchange_timeout_secs)
            .finish()
    }
}

/// What `start_flow` does when an authorization flow is already pending.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PendingFlowPolicy {
    /// Discard the pending session and start over. The old callback URL
    /// stops matching.
    #[default]
    Replace,
    /// Refuse to start until the pending flow completes or is replaced.
    Reject,
}

fn default_scope() -> String {
    "read".to_string()
}
fn default_exchange_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
        }
    }
}

fn default_token_path() -> PathBuf {
    PathBuf::from("./data/tokens.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top")]
    pub default_top: u32,
    #[serde(default = "default_order")]
    pub default_order: OrderBy,
    #[serde(default = "default_select")]
    pub default_select: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top: default_top(),
            default_order: default_order(),
            default_select: default_select(),
        }
    }
}

fn default_top() -> u32 {
    50
}
fn default_order() -> OrderBy {
    OrderBy::Relevance
}
fn default_select() -> String {
    "standardAttributes".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Upper bound on returned document text, in characters.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_enable_docx")]
    pub enable_docx: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            enable_docx: default_enable_docx(),
        }
    }
}

fn default_max_chars() -> usize {
    150_000
}
fn default_enable_docx() -> bool {
    true
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // The secret may live in the environment instead of the file.
    if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
        if !secret.is_empty() {
            config.oauth.client_secret = Some(secret);
        }
    }

    // Validate oauth
    if config.oauth.client_id.is_empty() {
        anyhow::bail!("oauth.client_id must not be empty");
    }
    match config.oauth.client_secret.as_deref() {
        Some(s) if !s.is_empty() => {}
        _ => anyhow::bail!("oauth.client_secret must be set (file or {})", CLIENT_SECRET_ENV),
    }
    if config.oauth.redirect_uri.is_empty() {
        anyhow::bail!("oauth.redirect_uri must not be empty");
    }
    if config.oauth.authorize_url.is_empty() || config.oauth.token_url.is_empty() {
        anyhow::bail!("oauth.authorize_url and oauth.token_url must not be empty");
    }
    if config.oauth.exchange_timeout_secs == 0 {
        anyhow::bail!("oauth.exchange_timeout_secs must be >= 1");
    }

    // Validate api
    if config.api.base_url.is_empty() {
        anyhow::bail!("api.base_url must not be empty");
    }
    config.api.base_url = config.api.base_url.trim_end_matches('/').to_string();
    if config.api.request_timeout_secs == 0 {
        anyhow::bail!("api.request_timeout_secs must be >= 1");
    }

    // Validate search
    if config.search.default_top < 1 {
        anyhow::bail!("search.default_top must be >= 1");
    }

    // Validate fetch
    if config.fetch.max_chars < 1 {
        anyhow::bail!("fetch.max_chars must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const MINIMAL: &str = r#"
[oauth]
client_id = "cid"
client_secret = "shh"
redirect_uri = "https://connector.example.com/oauth/callback"
authorize_url = "https://vault.example.com/authorize"
token_url = "https://api.vault.example.com/v1/token"

[api]
base_url = "https://api.vault.example.com/v1/"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let file = write_config(MINIMAL);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.oauth.scope, "read");
        assert!(!config.oauth.send_verifier);
        assert_eq!(config.oauth.pending_flow, PendingFlowPolicy::Replace);
        assert_eq!(config.oauth.exchange_timeout_secs, 30);
        // Trailing slash trimmed so joins stay predictable.
        assert_eq!(config.api.base_url, "https://api.vault.example.com/v1");
        assert_eq!(config.search.default_top, 50);
        assert_eq!(config.search.default_order, OrderBy::Relevance);
        assert_eq!(config.search.default_select, "standardAttributes");
        assert_eq!(config.fetch.max_chars, 150_000);
        assert!(config.fetch.enable_docx);
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        assert_eq!(config.storage.token_path, PathBuf::from("./data/tokens.json"));
    }

    #[test]
    fn missing_secret_is_rejected() {
        let file = write_config(&MINIMAL.replace("client_secret = \"shh\"\n", ""));
        // Only meaningful when the env override is not set, as in CI.
        if std::env::var(CLIENT_SECRET_ENV).is_err() {
            let err = load_config(file.path()).unwrap_err();
            assert!(err.to_string().contains("client_secret"));
        }
    }

    #[test]
    fn zero_top_is_rejected() {
        let body = format!("{MINIMAL}\n[search]\ndefault_top = 0\n");
        let file = write_config(&body);
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("default_top"));
    }

    #[test]
    fn pending_flow_policy_parses() {
        let body = format!("{MINIMAL}\n");
        let body = body.replace("[api]", "pending_flow = \"reject\"\n\n[api]");
        let file = write_config(&body);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.oauth.pending_flow, PendingFlowPolicy::Reject);
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let file = write_config(MINIMAL);
        let config = load_config(file.path()).unwrap();
        let rendered = format!("{:?}", config.oauth);
        assert!(!rendered.contains("shh"));
        assert!(rendered.contains("REDACTED"));
    }
}
