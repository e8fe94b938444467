//! Public HTTP server.
//!
//! One axum app carries the whole outward surface: the landing page, the
//! OAuth start/callback endpoints, the REST tool dispatch, the health
//! probe, and the MCP Streamable HTTP endpoint nested under `/mcp`.
//! Keeping OAuth and MCP on one origin means a single public URL is all a
//! tenant has to register.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Landing page with the authorize link |
//! | `GET`  | `/oauth/start` | Begin the authorization flow (redirect) |
//! | `GET`  | `/oauth/callback` | Complete the flow |
//! | `GET`  | `/tools/list` | List tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `GET`  | `/healthz` | Health check (returns version) |
//! | `*`    | `/mcp` | MCP Streamable HTTP endpoint |
//!
//! # Error Contract
//!
//! Tool-route errors are JSON:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "missing required parameter: query" } }
//! ```
//!
//! OAuth callback integrity failures answer 400 plain text, matching what
//! a browser shows the user mid-flow.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::client::VaultClient;
use crate::config::Config;
use crate::mcp::McpBridge;
use crate::oauth::{AuthFlowEngine, OAuthError};
use crate::token_store::{FileTokenStore, TokenStore};
use crate::tools::{validate_params, ToolContext, ToolInfo, ToolRegistry};

/// Shared application state for all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    client: Arc<VaultClient>,
    oauth: Arc<AuthFlowEngine>,
    tools: Arc<ToolRegistry>,
}

/// Starts the public HTTP server. Binds `[server].bind` and runs until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let config = Arc::new(config.clone());
    let store: Arc<dyn TokenStore> =
        Arc::new(FileTokenStore::new(config.storage.token_path.clone()));
    let oauth = Arc::new(AuthFlowEngine::new(config.oauth.clone(), store.clone())?);
    let client = Arc::new(VaultClient::new(&config.api, store, oauth.clone())?);
    let tools = Arc::new(ToolRegistry::with_builtins());

    let state = AppState {
        config: config.clone(),
        client: client.clone(),
        oauth,
        tools: tools.clone(),
    };

    let bridge = McpBridge::new(config.clone(), client, tools);
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handle_root))
        .route("/healthz", get(handle_healthz))
        .route("/oauth/start", get(handle_oauth_start))
        .route("/oauth/callback", get(handle_oauth_callback))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(state);

    let bind_addr = config.server.bind.clone();
    info!(bind = %bind_addr, "docvault server listening");
    println!("docvault listening on http://{}", bind_addr);
    println!("  authorize:  /oauth/start");
    println!("  MCP:        /mcp");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error".to_string(),
        message: message.into(),
    }
}

/// Map tool execution failures onto HTTP statuses without a custom error
/// type in the `Tool` trait.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let msg = err.to_string();
    if msg.contains("not found") {
        not_found(format!("{}: {}", tool_name, msg))
    } else if msg.contains("must not be empty")
        || msg.contains("invalid")
        || msg.contains("missing required parameter")
    {
        bad_request(format!("{}: {}", tool_name, msg))
    } else {
        tool_error(format!("{}: {}", tool_name, msg))
    }
}

// ============ GET / ============

async fn handle_root() -> Html<&'static str> {
    Html(
        "<h3>Document Vault Connector</h3>\
         <p><a href=\"/oauth/start\">Authorize with the document vault</a></p>\
         <p>Agent connector endpoint: <code>/mcp</code></p>",
    )
}

// ============ GET /healthz ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ OAuth endpoints ============

async fn handle_oauth_start(State(state): State<AppState>) -> Response {
    match state.oauth.start_flow() {
        Ok((_, redirect_url)) => Redirect::temporary(&redirect_url).into_response(),
        Err(OAuthError::FlowPending) => (
            StatusCode::CONFLICT,
            "An authorization flow is already pending",
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "could not start authorization flow");
            tool_error(e.to_string()).into_response()
        }
    }
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

async fn handle_oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let result = state
        .oauth
        .complete_flow(params.code.as_deref(), params.state.as_deref())
        .await;

    match result {
        Ok(credential) => {
            let refresh_note = if credential.refresh_token.is_some() {
                "A refresh token was issued; renewal is automatic."
            } else {
                "No refresh token was issued; you may need to re-authorize later."
            };
            Html(format!(
                "<h3>Authorized</h3>\
                 <p>Tokens saved. You can now connect an agent to <code>/mcp</code>.</p>\
                 <p>{refresh_note}</p>"
            ))
            .into_response()
        }
        Err(OAuthError::StateMismatch) => {
            (StatusCode::BAD_REQUEST, "State mismatch").into_response()
        }
        Err(OAuthError::MissingCode) => {
            (StatusCode::BAD_REQUEST, "Missing code").into_response()
        }
        Err(e) => {
            error!(error = %e, "token exchange failed");
            (
                StatusCode::BAD_GATEWAY,
                format!("Token exchange failed: {e}"),
            )
                .into_response()
        }
    }
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools: Vec<ToolInfo> = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            parameters: t.parameters_schema(),
        })
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let validated = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;

    let ctx = ToolContext::new(state.config.clone(), state.client.clone());
    let result = tool
        .execute(validated, &ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
