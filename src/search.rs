//! Search flow: mini-language parse, config defaults, default-cabinet
//! resolution, repository call, normalization.
//!
//! Collaborator failures never abort the call: they come back as the
//! `error` field on an empty [`SearchResponse`], so one upstream outage
//! does not break the surrounding agent session. The only hard error is a
//! malformed mini-language value, which is a caller mistake.

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::client::VaultClient;
use crate::config::Config;
use crate::models::{SearchHit, SearchResponse};
use crate::normalize;
use crate::query::{self, QueryError};

pub async fn search_documents(
    config: &Config,
    client: &VaultClient,
    raw: &str,
) -> Result<SearchResponse, QueryError> {
    let parsed = query::parse(raw)?;
    let top = parsed.top.unwrap_or(config.search.default_top);
    let order_by = parsed.order_by.unwrap_or(config.search.default_order);
    let select = parsed
        .select
        .unwrap_or_else(|| config.search.default_select.clone());

    let cabinet_id = match parsed.cabinet_id {
        Some(id) => Some(id),
        None => default_cabinet(client).await,
    };

    let response = match client
        .search(
            &parsed.free_text,
            cabinet_id.as_deref(),
            top,
            order_by,
            &select,
        )
        .await
    {
        Ok(response) => response,
        Err(e) => {
            return Ok(SearchResponse {
                results: Vec::new(),
                error: Some(e.to_string()),
            })
        }
    };

    let results: Vec<SearchHit> = normalize::result_items(&response)
        .iter()
        .enumerate()
        .map(|(i, record)| normalize::normalize(record, i))
        .collect();

    Ok(SearchResponse {
        results,
        error: None,
    })
}

/// First cabinet of the authorized user, used when the query carries no
/// `cabinetId:` override. Any failure degrades to a cross-cabinet search.
async fn default_cabinet(client: &VaultClient) -> Option<String> {
    match client.user_cabinets().await {
        Ok(cabinets) => cabinets.first().and_then(cabinet_id),
        Err(e) => {
            debug!(error = %e, "cabinet lookup failed, searching cross-cabinet");
            None
        }
    }
}

pub(crate) fn cabinet_id(record: &Value) -> Option<String> {
    for key in ["id", "cabinetId"] {
        if let Some(id) = record.get(key).and_then(Value::as_str) {
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

/// CLI entry point — runs the search and prints results to stdout.
pub async fn run_search(config: &Config, client: &VaultClient, raw: &str) -> Result<()> {
    let response = search_documents(config, client, raw).await?;

    if let Some(error) = response.error {
        anyhow::bail!("search failed: {error}");
    }
    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in response.results.iter().enumerate() {
        println!("{}. {}", i + 1, hit.title);
        println!("    excerpt: \"{}\"", hit.snippet.replace('\n', " "));
        if !hit.url.is_empty() {
            println!("    url: {}", hit.url);
        }
        println!("    id: {}", hit.id);
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cabinet_id_spellings() {
        assert_eq!(cabinet_id(&json!({"id": "NG-1"})).as_deref(), Some("NG-1"));
        assert_eq!(
            cabinet_id(&json!({"cabinetId": "NG-2"})).as_deref(),
            Some("NG-2")
        );
        assert_eq!(cabinet_id(&json!({"name": "General"})), None);
        assert_eq!(cabinet_id(&json!({"id": ""})), None);
    }
}
