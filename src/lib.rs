//! Async HTTP/1.1 server with method and path route dispatch.
//!
//! ```no_run
//! use aou::{HandlerResult, HttpRequest, HttpResponse, Server, ServerConfig};
//!
//! async fn hello(req: HttpRequest) -> HandlerResult {
//!     let name = req.param("name").unwrap_or("world");
//!     Ok(HttpResponse::text(format!("hello {}", name)))
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut server = Server::new(ServerConfig::new().json(true));
//! server.get("/hello/:name", hello)?;
//! let instance = server.listen("127.0.0.1", 8080).await?;
//! tokio::signal::ctrl_c().await?;
//! instance.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod compression;
pub mod config;
mod connection;
pub mod error;
pub mod handlers;
pub mod http;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ParseError, RouteError, ServerError};
pub use http::{Body, Context, HttpHeaders, HttpMethod, HttpRequest, HttpResponse};
pub use router::{Handler, HandlerResult, Router};
pub use server::{Instance, Server};
