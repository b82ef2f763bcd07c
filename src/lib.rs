//! # keywork
//!
//! Request routing and server-side rendering for worker-style runtimes.
//!
//! An application registers handlers against URL patterns on a [`Router`]. Each
//! request becomes a [`FetchEvent`] (request, environment bindings, URL match and a
//! deferred-task queue) that flows through the matching handlers in registration
//! order. Handlers return a response, a plain value (sent as JSON or text), or an
//! [`Element`] tree that is streamed as HTML with the data the client needs to
//! hydrate the page.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use keywork::{Config, Env, Error, FetchEvent, Json, Result, Router, serve};
//! use serde_json::json;
//!
//! async fn todo(event: FetchEvent) -> Result<Json<serde_json::Value>> {
//!     let id = event.param("id").unwrap_or_default();
//!     if id == "99" {
//!         return Err(Error::not_found(format!("Todo {id} not found")));
//!     }
//!     Ok(Json(json!({ "id": id, "title": format!("Todo {id}"), "completed": false })))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::default();
//!     config.setup_tracing();
//!
//!     let router = Router::from_config(&config)?.get("/todo/:id", todo);
//!     serve(&config, router, Env::default()).await
//! }
//! ```
//!
//! # Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`Router`] | Ordered routes, `next()` chaining, mounting |
//! | [`FetchEvent`] | Per-request context and deferred tasks |
//! | [`pattern`] | URL pattern matching ([`UrlPattern`]) |
//! | [`ResponseLike`] | Handler results and [`cast_to_response`] |
//! | [`ssr`] | Element rendering, streaming and hydration |
//! | [`middleware`] | CORS, sessions and service bindings |
//! | [`KeyworkService`] | tower adapter and the [`serve`] entry point |
//! | [`Config`] | TOML configuration and tracing setup |
//! | [`Error`] | Error kinds and their HTTP mapping |
//!
//! # Configuration
//!
//! ```rust
//! use keywork::Config;
//!
//! let config: Config = r#"
//!     [http]
//!     bind_port = 8787
//!     max_payload_size_bytes = "64KiB"
//!     include_debug_headers = true
//!
//!     [http.cors]
//!     allowed_origins = ["https://app.example.com"]
//! "#.parse().unwrap();
//! assert!(config.http.cors.is_some());
//! ```
//!
//! Errors convert to JSON responses:
//!
//! ```json
//! {
//!   "error_code": "RESOURCE_ERROR",
//!   "message": "Todo 99 not found"
//! }
//! ```

mod adapter;
mod config;
mod env;
mod error;
mod event;
mod response;
mod router;
mod utils;

pub mod middleware;
pub mod pattern;
pub mod ssr;

pub use adapter::*;
pub use config::*;
pub use env::*;
pub use error::*;
pub use event::*;
pub use pattern::{ComponentMatch, MatchResult, PatternInit, UrlPattern};
pub use response::*;
pub use router::*;
pub use ssr::{Element, RenderOptions, StaticProps};
pub use utils::*;

pub type Result<T> = std::result::Result<T, Error>;
