//! Cabinet listing.

use anyhow::Result;
use serde_json::Value;

use crate::client::{ApiError, VaultClient};
use crate::search::cabinet_id;

/// `GET /User/cabinets`, as raw records. Auth errors propagate so the CLI
/// can tell the user to authorize.
pub async fn list_cabinets(client: &VaultClient) -> Result<Vec<Value>, ApiError> {
    client.user_cabinets().await
}

/// CLI entry point — prints the user's cabinets as a table.
pub async fn run_cabinets(client: &VaultClient) -> Result<()> {
    let cabinets = list_cabinets(client).await?;
    if cabinets.is_empty() {
        println!("No cabinets visible to this user.");
        return Ok(());
    }

    println!("{:<24} NAME", "ID");
    for cabinet in &cabinets {
        let id = cabinet_id(cabinet).unwrap_or_else(|| "-".to_string());
        let name = cabinet
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("(unnamed)");
        println!("{:<24} {}", id, name);
    }

    Ok(())
}
