//! Core data models used throughout docvault.
//!
//! These types represent the stored credential and the search/fetch results
//! that flow between the repository client, the tool layer, and the server.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth credential persisted between sessions.
///
/// `expires_at` is absolute epoch seconds, computed from the token
/// response's `expires_in` at save time. Unknown fields in the persisted
/// file are ignored on load.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Credential {
    /// True when the expiry is known and has passed. Renewal stays lazy
    /// (401-triggered); this exists for status display.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= Utc::now().timestamp(),
            None => false,
        }
    }
}

// Token values never appear in debug output or logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// One normalized search result.
///
/// The snippet serializes as `text`, the field name the tool contract uses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    #[serde(rename = "text")]
    pub snippet: String,
    pub url: String,
}

/// Search tool response. Collaborator failures surface in `error` next to
/// an empty result list instead of failing the call.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fetch tool response: full extracted text plus provenance metadata.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub id: String,
    pub title: String,
    pub text: String,
    pub url: String,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FetchMetadata {
    pub mime: String,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cabinet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    /// Present when any stage of the fetch degraded (info lookup failed,
    /// download failed, or extraction fell back to empty text).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential {
            access_token: "at-123456".to_string(),
            refresh_token: Some("rt-abcdef".to_string()),
            expires_at: Some(1_700_000_000),
        };
        let rendered = format!("{:?}", cred);
        assert!(!rendered.contains("at-123456"));
        assert!(!rendered.contains("rt-abcdef"));
        assert!(rendered.contains("REDACTED"));
        assert!(rendered.contains("1700000000"));
    }

    #[test]
    fn test_credential_expiry() {
        let mut cred = Credential {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: None,
        };
        assert!(!cred.is_expired());
        cred.expires_at = Some(0);
        assert!(cred.is_expired());
        cred.expires_at = Some(Utc::now().timestamp() + 3600);
        assert!(!cred.is_expired());
    }

    #[test]
    fn test_credential_roundtrip_ignores_unknown_fields() {
        let raw = r#"{"access_token":"a","refresh_token":"r","expires_at":5,"token_type":"Bearer"}"#;
        let cred: Credential = serde_json::from_str(raw).unwrap();
        assert_eq!(cred.access_token, "a");
        assert_eq!(cred.refresh_token.as_deref(), Some("r"));
        assert_eq!(cred.expires_at, Some(5));
    }

    #[test]
    fn test_search_hit_snippet_serializes_as_text() {
        let hit = SearchHit {
            id: "7".to_string(),
            title: "Doc.pdf".to_string(),
            snippet: "preview".to_string(),
            url: String::new(),
        };
        let value = serde_json::to_value(&hit).unwrap();
        assert_eq!(value["text"], "preview");
        assert!(value.get("snippet").is_none());
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let meta = FetchMetadata {
            mime: "application/pdf".to_string(),
            truncated: false,
            cabinet_id: Some("NG-1".to_string()),
            repository_id: None,
            extension: Some(".pdf".to_string()),
            size: Some(42),
            error: None,
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["cabinetId"], "NG-1");
        assert!(value.get("repositoryId").is_none());
        assert_eq!(value["extension"], ".pdf");
    }
}
