//! HTTP server: route registration, listening and shutdown.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::ServerConfig;
use crate::connection::{self, ConnectionContext};
use crate::error::{RouteError, ServerError};
use crate::http::HttpMethod;
use crate::router::{Handler, Router};

/// How long to back off after a failed accept (e.g. out of file descriptors).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Route table plus options. Call [`Server::listen`] to start serving.
#[derive(Debug, Clone, Default)]
pub struct Server {
    config: ServerConfig,
    router: Router,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Server {
            config,
            router: Router::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn route<H: Handler>(
        &mut self,
        method: HttpMethod,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouteError> {
        self.router.add(method, pattern, handler)
    }

    pub fn get<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError> {
        self.route(HttpMethod::Get, pattern, handler)
    }

    pub fn post<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError> {
        self.route(HttpMethod::Post, pattern, handler)
    }

    pub fn put<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError> {
        self.route(HttpMethod::Put, pattern, handler)
    }

    pub fn delete<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError> {
        self.route(HttpMethod::Delete, pattern, handler)
    }

    pub fn patch<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError> {
        self.route(HttpMethod::Patch, pattern, handler)
    }

    /// Bind `host:port` and start accepting connections.
    ///
    /// The running instance serves a snapshot of the current routes; routes
    /// added afterwards only apply to later `listen` calls. Port 0 picks a
    /// free port, see [`Instance::port`].
    pub async fn listen(&self, host: &str, port: u16) -> Result<Instance, ServerError> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: format!("{}:{}", host, port),
                source,
            })?;
        let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let router = Arc::new(self.router.clone());
        let config = Arc::new(self.config.clone());

        let accept_task = tokio::spawn(run_accept_loop(listener, router, config, shutdown_rx));

        log::info!(
            "Server listening on {} ({} route(s))",
            addr,
            self.router.len()
        );

        Ok(Instance {
            addr,
            shutdown_tx,
            accept_task: Some(accept_task),
        })
    }
}

/// A running server. Dropping it stops accepting connections.
#[derive(Debug)]
pub struct Instance {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl Instance {
    /// Get the address the server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the port number the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown_tx.borrow()
            && self
                .accept_task
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }

    /// Stop accepting, close idle connections and wait for in-flight ones
    /// for up to the configured grace period.
    pub async fn shutdown(mut self) {
        self.shutdown_tx.send_replace(true);

        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                log::error!("Accept loop ended abnormally: {}", e);
            }
        }
        log::info!("Server on {} stopped", self.addr);
    }

    /// Wait until the accept loop ends.
    pub async fn wait(&mut self) {
        if let Some(task) = self.accept_task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// The main accept loop - runs as its own task.
async fn run_accept_loop(
    listener: TcpListener,
    router: Arc<Router>,
    config: Arc<ServerConfig>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                log::debug!("Server shutdown requested");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
                    log::debug!("[conn {}] accepted from {}", id, peer);
                    if let Err(e) = stream.set_nodelay(true) {
                        log::debug!("[conn {}] could not set TCP_NODELAY: {}", id, e);
                    }
                    let ctx = ConnectionContext {
                        router: Arc::clone(&router),
                        config: Arc::clone(&config),
                        shutdown: shutdown.clone(),
                    };
                    connections.spawn(async move {
                        if let Err(e) = connection::serve(stream, peer, id, ctx).await {
                            log::error!("[conn {}] error handling connection: {:#}", id, e);
                        }
                    });
                }
                Err(e) => {
                    log::error!("Accept error: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = finished {
                    log::error!("Connection task failed: {}", e);
                }
            }
        }
    }

    drop(listener);

    let in_flight = connections.len();
    if in_flight > 0 {
        log::debug!("Waiting for {} connection(s) to finish", in_flight);
        let drained = tokio::time::timeout(config.shutdown_grace_period, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            log::warn!(
                "Aborting {} connection(s) still open after {:?}",
                connections.len(),
                config.shutdown_grace_period
            );
            connections.abort_all();
        }
    }
    log::debug!("Server accept loop terminated");
}
