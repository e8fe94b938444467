//! # Document Vault Connector
//!
//! A remote MCP connector for a cloud document-management repository.
//!
//! The connector bridges agent clients to the vault's REST API: users
//! authorize once through a browser OAuth flow, tokens are stored
//! server-side, and agents then call two tools — `search` and `fetch` —
//! over MCP Streamable HTTP or plain REST. Documents come back as
//! extracted plain text regardless of their stored format (PDF, DOCX,
//! text, or anything else).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐  OAuth   ┌───────────────┐  bearer   ┌────────────┐
//! │ Browser │─────────▶│   connector    │──────────▶│ vault REST │
//! └─────────┘          │  axum + rmcp  │           │    API     │
//! ┌─────────┐  /mcp    │  token store  │           └────────────┘
//! │  Agent  │─────────▶│  extract      │
//! └─────────┘          └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dvx serve                       # start the connector
//! # browse to /oauth/start and authorize
//! dvx search "merger agreement top:10"
//! dvx fetch 4844-9411-1293
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`token_store`] | Credential persistence |
//! | [`oauth`] | Authorization flow engine (PKCE) |
//! | [`client`] | Authenticated repository client |
//! | [`query`] | Search query mini-language |
//! | [`normalize`] | Raw search records → result shape |
//! | [`extract`] | Format sniffing and text extraction |
//! | [`search`] | Search flow |
//! | [`fetch`] | Fetch flow |
//! | [`cabinets`] | Cabinet listing |
//! | [`tools`] | Tool trait and registry |
//! | [`mcp`] | MCP protocol bridge |
//! | [`server`] | Public HTTP server |

pub mod cabinets;
pub mod client;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod mcp;
pub mod models;
pub mod normalize;
pub mod oauth;
pub mod query;
pub mod search;
pub mod server;
pub mod token_store;
pub mod tools;
