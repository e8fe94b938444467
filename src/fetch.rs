//! Fetch flow: metadata lookup, binary download, text extraction,
//! truncation.
//!
//! `fetch_document` is total: every collaborator failure degrades into an
//! `error` note in the result metadata instead of propagating, so a single
//! unreadable document never aborts the agent's batch. Extraction runs on
//! a blocking task because PDF/DOCX parsing is CPU-bound.

use anyhow::Result;
use serde_json::Value;
use tracing::warn;

use crate::client::VaultClient;
use crate::config::Config;
use crate::extract::{self, DegradeReason, Extracted, Fidelity, MIME_OCTET};
use crate::models::{FetchMetadata, FetchResult};

/// Marker appended when the extracted text is cut to `fetch.max_chars`.
pub const TRUNCATION_MARKER: &str = "\n\n[Truncated]";

pub async fn fetch_document(config: &Config, client: &VaultClient, id: &str) -> FetchResult {
    let (info, info_error) = match client.document_info(id).await {
        Ok(info) => (info, None),
        Err(e) => (Value::Null, Some(e.to_string())),
    };

    let filename = field(&info, "name")
        .or_else(|| field(&info, "filename"))
        .unwrap_or_else(|| format!("document-{id}"));
    let url = field(&info, "url").unwrap_or_default();

    let bytes = match client.download_document(id).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return FetchResult {
                id: id.to_string(),
                title: filename,
                text: String::new(),
                url,
                metadata: FetchMetadata {
                    mime: String::new(),
                    truncated: false,
                    error: Some(e.to_string()),
                    ..info_metadata(&info)
                },
            };
        }
    };

    // PDF/DOCX parsing is CPU-bound; keep it off the async workers.
    let enable_docx = config.fetch.enable_docx;
    let blocking_name = filename.clone();
    let extracted =
        run_extraction(move || extract::extract(&blocking_name, &bytes, enable_docx)).await;

    let (text, truncated) = truncate_text(&extracted.text, config.fetch.max_chars);

    let error = match (info_error, extracted.degrade_reason()) {
        (Some(info_err), Some(reason)) => Some(format!("{info_err}; {reason}")),
        (Some(info_err), None) => Some(info_err),
        (None, Some(reason)) => Some(reason.to_string()),
        (None, None) => None,
    };

    FetchResult {
        id: id.to_string(),
        title: filename,
        text,
        url,
        metadata: FetchMetadata {
            mime: extracted.mime.to_string(),
            truncated,
            error,
            ..info_metadata(&info)
        },
    }
}

/// Run an extraction job on a blocking task. A job that panics (hostile
/// PDFs can take the parser down) comes back as a degraded outcome, not
/// as a clean empty document.
async fn run_extraction<F>(job: F) -> Extracted
where
    F: FnOnce() -> Extracted + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(extracted) => extracted,
        Err(e) => {
            warn!(error = %e, "extraction task failed");
            Extracted {
                text: String::new(),
                mime: MIME_OCTET,
                fidelity: Fidelity::Degraded(DegradeReason::ExtractorCrashed),
            }
        }
    }
}

/// Cut `text` to `max_chars` characters and append the truncation marker.
/// Character-based, so multi-byte text is never split mid-scalar.
pub fn truncate_text(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str(TRUNCATION_MARKER);
    (cut, true)
}

fn info_metadata(info: &Value) -> FetchMetadata {
    FetchMetadata {
        cabinet_id: field(info, "cabinetId"),
        repository_id: field(info, "repositoryId"),
        extension: field(info, "extension"),
        size: info.get("size").and_then(Value::as_i64),
        ..Default::default()
    }
}

fn field(record: &Value, key: &str) -> Option<String> {
    match record.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// CLI entry point — fetches the document and prints text plus metadata.
pub async fn run_fetch(config: &Config, client: &VaultClient, id: &str) -> Result<()> {
    let result = fetch_document(config, client, id).await;

    println!("--- Document ---");
    println!("id:        {}", result.id);
    println!("title:     {}", result.title);
    if !result.url.is_empty() {
        println!("url:       {}", result.url);
    }
    println!("mime:      {}", result.metadata.mime);
    println!("truncated: {}", result.metadata.truncated);
    if let Some(ref size) = result.metadata.size {
        println!("size:      {}", size);
    }
    if let Some(ref error) = result.metadata.error {
        println!("error:     {}", error);
    }
    println!();
    println!("{}", result.text);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncation_boundary() {
        let text = "a".repeat(10);
        let (unchanged, flag) = truncate_text(&text, 10);
        assert_eq!(unchanged, text);
        assert!(!flag);

        let (cut, flag) = truncate_text(&text, 9);
        assert_eq!(cut, format!("{}{}", "a".repeat(9), TRUNCATION_MARKER));
        assert!(flag);
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        let text = "é".repeat(6);
        let (cut, flag) = truncate_text(&text, 4);
        assert!(flag);
        assert_eq!(cut, format!("{}{}", "é".repeat(4), TRUNCATION_MARKER));
    }

    #[test]
    fn test_empty_text_untouched() {
        let (text, flag) = truncate_text("", 5);
        assert_eq!(text, "");
        assert!(!flag);
    }

    #[tokio::test]
    async fn test_crashed_extraction_is_degraded_not_empty() {
        let out = run_extraction(|| panic!("parser went down")).await;
        assert_eq!(out.text, "");
        assert_eq!(out.mime, MIME_OCTET);
        assert_eq!(out.degrade_reason(), Some(DegradeReason::ExtractorCrashed));
    }

    #[tokio::test]
    async fn test_healthy_extraction_passes_through() {
        let out = run_extraction(|| extract::extract("a.txt", b"fine", true)).await;
        assert_eq!(out.text, "fine");
        assert_eq!(out.degrade_reason(), None);
    }

    #[test]
    fn test_info_metadata_fields() {
        let info = serde_json::json!({
            "cabinetId": "NG-1",
            "repositoryId": "repo-9",
            "extension": "pdf",
            "size": 1234,
        });
        let meta = info_metadata(&info);
        assert_eq!(meta.cabinet_id.as_deref(), Some("NG-1"));
        assert_eq!(meta.repository_id.as_deref(), Some("repo-9"));
        assert_eq!(meta.extension.as_deref(), Some("pdf"));
        assert_eq!(meta.size, Some(1234));
    }

    #[test]
    fn test_info_metadata_tolerates_null() {
        let meta = info_metadata(&Value::Null);
        assert_eq!(meta.cabinet_id, None);
        assert_eq!(meta.size, None);
    }
}
