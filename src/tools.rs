//! Tool trait and registry for the agent-facing surface.
//!
//! The connector exposes exactly two tools, `search` and `fetch`, served
//! through both the REST dispatch (`POST /tools/{name}`) and the MCP
//! bridge. Both go through the same [`Tool`] trait so the two transports
//! cannot drift apart.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::client::VaultClient;
use crate::config::Config;
use crate::fetch::fetch_document;
use crate::search::search_documents;

/// An agent-callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name; also the route path (`POST /tools/{name}`).
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters: an object with `properties`
    /// and optionally `required`.
    fn parameters_schema(&self) -> Value;

    /// Execute with validated parameters.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Bridge handed to tools at execution time.
pub struct ToolContext {
    pub config: Arc<Config>,
    pub client: Arc<VaultClient>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, client: Arc<VaultClient>) -> Self {
        Self { config, client }
    }
}

/// Serializable tool descriptor for the `/tools/list` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

// ── Built-in tools ──────────────────────────────────────────────────────

/// Vault search. Single string argument carrying the mini-language.
pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the document vault. Inline params: cabinetId:<id> top:<n> \
         orderby:<relevance|lastMod> select:<fields>; remaining words are the query."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search text, optionally with key:value overrides"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or("");
        let response = search_documents(&ctx.config, &ctx.client, query)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(serde_json::to_value(&response)?)
    }
}

/// Full-text fetch of a single document by vault id.
pub struct FetchTool;

#[async_trait]
impl Tool for FetchTool {
    fn name(&self) -> &str {
        "fetch"
    }

    fn description(&self) -> &str {
        "Retrieve full extracted text for a document by id; returns id, title, text, url, metadata."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Document id" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let id = params["id"].as_str().unwrap_or("");
        if id.trim().is_empty() {
            bail!("id must not be empty");
        }
        let result = fetch_document(&ctx.config, &ctx.client, id).await;
        Ok(serde_json::to_value(&result)?)
    }
}

// ── Registry ────────────────────────────────────────────────────────────

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry pre-loaded with the built-in `search` and `fetch` tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchTool));
        registry.register(Box::new(FetchTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Parameter validation ────────────────────────────────────────────────

/// Validate params against a tool's JSON Schema: required fields present,
/// declared types match, defaults injected for absent optional fields.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        _ => bail!("parameters must be a JSON object"),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        if !params_obj.contains_key(*field) {
            bail!("missing required parameter: {}", field);
        }
    }

    let mut result = params_obj.clone();
    for (prop_name, prop_schema) in &properties {
        match params_obj.get(prop_name) {
            Some(value) => {
                if let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) {
                    let type_ok = match expected {
                        "string" => value.is_string(),
                        "integer" => value.is_i64() || value.is_u64(),
                        "number" => value.is_number(),
                        "boolean" => value.is_boolean(),
                        "array" => value.is_array(),
                        "object" => value.is_object(),
                        _ => true,
                    };
                    if !type_ok {
                        bail!(
                            "parameter '{}' must be of type '{}', got {}",
                            prop_name,
                            expected,
                            json_type_name(value)
                        );
                    }
                }
            }
            None => {
                if let Some(default) = prop_schema.get("default") {
                    result.insert(prop_name.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_registry() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 2);
        assert!(registry.find("search").is_some());
        assert!(registry.find("fetch").is_some());
        assert!(registry.find("sources").is_none());
    }

    #[test]
    fn test_validate_missing_required() {
        let schema = SearchTool.parameters_schema();
        let err = validate_params(&schema, &json!({})).unwrap_err();
        assert!(err.to_string().contains("missing required parameter"));
    }

    #[test]
    fn test_validate_type_mismatch() {
        let schema = SearchTool.parameters_schema();
        let err = validate_params(&schema, &json!({"query": 5})).unwrap_err();
        assert!(err.to_string().contains("must be of type 'string'"));
    }

    #[test]
    fn test_validate_rejects_non_object() {
        let schema = SearchTool.parameters_schema();
        assert!(validate_params(&schema, &json!("query")).is_err());
    }

    #[test]
    fn test_validate_passes_through() {
        let schema = FetchTool.parameters_schema();
        let out = validate_params(&schema, &json!({"id": "4711"})).unwrap();
        assert_eq!(out["id"], "4711");
    }

    #[test]
    fn test_validate_injects_defaults() {
        let schema = json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "default": 10 }
            }
        });
        let out = validate_params(&schema, &json!({})).unwrap();
        assert_eq!(out["limit"], 10);
    }
}
