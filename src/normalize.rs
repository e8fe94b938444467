//! Repository response normalization.
//!
//! The vault's search endpoint answers with whatever shape the tenant's
//! version produces: a bare array of records, or an object wrapping the
//! array under `results` or `items`, with half a dozen spellings for the
//! id and title fields. These functions are total: they never fail, they
//! only degrade to positional placeholders when fields are missing.

use serde_json::Value;

use crate::models::SearchHit;

static NO_ITEMS: [Value; 0] = [];

/// The record sequence inside a search response, whichever shape arrived.
pub fn result_items(response: &Value) -> &[Value] {
    if let Some(items) = response.as_array() {
        return items;
    }
    for key in ["results", "items"] {
        if let Some(items) = response.get(key).and_then(Value::as_array) {
            return items;
        }
    }
    &NO_ITEMS
}

/// Map one raw record to a [`SearchHit`].
///
/// `index` is the record's position in the response; it backs the id and
/// title fallbacks, so every hit has a non-empty id even against malformed
/// upstream data.
pub fn normalize(record: &Value, index: usize) -> SearchHit {
    let id = first_string(record, &["id", "documentId", "docId", "_id"])
        .unwrap_or_else(|| index.to_string());

    let name = first_string(record, &["name", "title", "filename"])
        .unwrap_or_else(|| format!("Document {}", index + 1));
    let title = match first_string(record, &["extension", "fileExtension"]) {
        Some(ext) if !ext.is_empty() && !has_extension(&name, &ext) => {
            format!("{name}.{ext}")
        }
        _ => name,
    };

    let snippet = first_string(record, &["description", "summary"])
        .unwrap_or_else(|| "No preview available".to_string());
    let url = first_string(record, &["url", "href"]).unwrap_or_default();

    SearchHit {
        id,
        title,
        snippet,
        url,
    }
}

/// First present field among `keys`, stringified. Numeric ids arrive as
/// JSON numbers from some tenants and are accepted.
fn first_string(record: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match record.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn has_extension(name: &str, ext: &str) -> bool {
    name.to_lowercase()
        .ends_with(&format!(".{}", ext.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_array_response() {
        let response = json!([{"id": "a"}, {"id": "b"}]);
        assert_eq!(result_items(&response).len(), 2);
    }

    #[test]
    fn test_wrapped_responses() {
        let results = json!({"results": [{"id": "a"}]});
        let items = json!({"items": [{"id": "a"}, {"id": "b"}]});
        assert_eq!(result_items(&results).len(), 1);
        assert_eq!(result_items(&items).len(), 2);
    }

    #[test]
    fn test_unrecognized_shape_is_empty() {
        assert!(result_items(&json!({"documents": []})).is_empty());
        assert!(result_items(&json!("nope")).is_empty());
        assert!(result_items(&json!(null)).is_empty());
    }

    #[test]
    fn test_full_record() {
        let hit = normalize(
            &json!({
                "id": "4711",
                "name": "Engagement Letter",
                "extension": "pdf",
                "description": "Signed engagement letter",
                "url": "https://vault.example.com/doc/4711"
            }),
            0,
        );
        assert_eq!(hit.id, "4711");
        assert_eq!(hit.title, "Engagement Letter.pdf");
        assert_eq!(hit.snippet, "Signed engagement letter");
        assert_eq!(hit.url, "https://vault.example.com/doc/4711");
    }

    #[test]
    fn test_id_fallback_chain() {
        assert_eq!(normalize(&json!({"documentId": "d-1"}), 0).id, "d-1");
        assert_eq!(normalize(&json!({"docId": "d-2"}), 0).id, "d-2");
        assert_eq!(normalize(&json!({"_id": "d-3"}), 0).id, "d-3");
    }

    #[test]
    fn test_id_never_empty() {
        let hit = normalize(&json!({}), 7);
        assert_eq!(hit.id, "7");
        let hit = normalize(&json!({"id": ""}), 3);
        assert_eq!(hit.id, "3");
    }

    #[test]
    fn test_numeric_id_is_stringified() {
        let hit = normalize(&json!({"id": 42}), 0);
        assert_eq!(hit.id, "42");
    }

    #[test]
    fn test_title_placeholder_is_one_based() {
        let hit = normalize(&json!({}), 0);
        assert_eq!(hit.title, "Document 1");
        assert_eq!(hit.snippet, "No preview available");
        assert_eq!(hit.url, "");
    }

    #[test]
    fn test_extension_not_doubled() {
        let hit = normalize(&json!({"name": "brief.PDF", "extension": "pdf"}), 0);
        assert_eq!(hit.title, "brief.PDF");
        let hit = normalize(&json!({"name": "brief", "extension": "pdf"}), 0);
        assert_eq!(hit.title, "brief.pdf");
    }

    #[test]
    fn test_title_fallback_chain() {
        assert_eq!(normalize(&json!({"title": "T"}), 0).title, "T");
        assert_eq!(normalize(&json!({"filename": "f.docx"}), 0).title, "f.docx");
    }

    #[test]
    fn test_summary_fallback() {
        let hit = normalize(&json!({"summary": "short form"}), 0);
        assert_eq!(hit.snippet, "short form");
    }
}
