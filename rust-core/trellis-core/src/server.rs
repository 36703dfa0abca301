//! # HTTP Server
//!
//! HTTP transport built on Hyper and Tokio.
//! Mounts controllers, turns hyper requests into [`Request`]s, dispatches them
//! through the [`Router`] and writes the resulting envelopes back.
//!
//! ## Key Features
//!
//! - Longest segment-prefix controller mounting
//! - Graceful shutdown on Ctrl-C: open connections are told to finish, and
//!   whatever is left after the drain timeout is aborted
//! - Connection keep-alive support
//! - Request body size limit

use crate::controller::Controller;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Method, RegistrationReport, Router};
use crate::sanitizer::sanitize_path;
use http_body_util::Full;
pub use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// Router plus the mounted controllers, shared by every connection
struct App {
    router: Router,
    controllers: Vec<Arc<dyn Controller>>,
}

impl App {
    /// Controller whose base path is the longest segment-prefix of `path`
    ///
    /// Ties go to the controller mounted first.
    fn select(&self, path: &str) -> Option<&Arc<dyn Controller>> {
        let path = sanitize_path(path);
        let mut best: Option<(&Arc<dyn Controller>, usize)> = None;

        for controller in &self.controllers {
            let base = sanitize_path(controller.base_path());
            if !is_segment_prefix(&base, &path) {
                continue;
            }
            let depth = base.split('/').filter(|s| !s.is_empty()).count();
            if best.map_or(true, |(_, d)| depth > d) {
                best = Some((controller, depth));
            }
        }

        best.map(|(controller, _)| controller)
    }
}

fn is_segment_prefix(base: &str, path: &str) -> bool {
    base == "/"
        || path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// HTTP server hosting mounted controllers
pub struct Server {
    config: ServerConfig,
    app: App,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Create a new Server instance
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a server from an explicit configuration
    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            app: App {
                router: Router::new(),
                controllers: Vec::new(),
            },
        }
    }

    /// Bind the server to an address
    #[must_use]
    pub const fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.address = addr;
        self
    }

    /// Set max request body size
    pub fn set_max_body_size(&mut self, bytes: usize) {
        self.config.max_body_size = bytes;
    }

    /// Enable or disable HTTP keep-alive
    pub fn set_keep_alive(&mut self, enabled: bool) {
        self.config.keep_alive = enabled;
    }

    /// Set the graceful shutdown drain timeout
    pub fn set_shutdown_timeout(&mut self, timeout: Duration) {
        self.config.shutdown_timeout = timeout;
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Route table
    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.app.router
    }

    /// Register a controller's routes and mount it under its base path
    pub fn mount<C: Controller + 'static>(&mut self, controller: C) -> RegistrationReport {
        let report = self.app.router.register(&controller);
        info!(
            controller = %controller.name(),
            base_path = %sanitize_path(controller.base_path()),
            "Controller mounted"
        );
        self.app.controllers.push(Arc::new(controller));
        report
    }

    /// Start the server with graceful shutdown
    ///
    /// # Errors
    ///
    /// `Error::BindError` when the address cannot be bound, `Error::Io` when
    /// accepting fails.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.address;
        let bind_error = |source| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        #[cfg(not(windows))]
        {
            socket.set_reuseport(true).map_err(bind_error)?;
        }
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(1024).map_err(bind_error)?;

        self.serve_on(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// # Errors
    ///
    /// `Error::Io` when accepting a connection fails.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local = listener.local_addr()?;
        info!("Server listening on http://{}", local);

        let Self { config, app } = self;
        let app = Arc::new(app);
        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();
        let max_body_size = config.max_body_size;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);
                    let app = app.clone();

                    let conn = http1::Builder::new()
                        .keep_alive(config.keep_alive)
                        .serve_connection(io, service_fn(move |req| {
                            let app = app.clone();
                            async move {
                                let method = req.method().clone();
                                let path = req.uri().path().to_string();
                                let version = format!("{:?}", req.version());

                                let response = handle_request(req, &app, max_body_size).await;
                                info!(
                                    remote = %remote_addr,
                                    method = %method,
                                    path = %path,
                                    version = %version,
                                    status = response.status().as_u16(),
                                    "request"
                                );
                                Ok::<_, hyper::Error>(response)
                            }
                        }));
                    let conn = graceful.watch(conn);

                    connections.spawn(async move {
                        if let Err(err) = conn.await {
                            error!("Error serving connection: {:?}", err);
                        }
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        drop(listener);
        let drain = async {
            graceful.shutdown().await;
            while connections.join_next().await.is_some() {}
        };
        if tokio::time::timeout(config.shutdown_timeout, drain).await.is_err() {
            info!(
                open = connections.len(),
                "Shutdown timeout reached, aborting open connections"
            );
            connections.shutdown().await;
        }
        Ok(())
    }

    /// Execute a test request directly without network stack
    ///
    /// The body size limit is a transport concern and is not applied here.
    pub async fn test_request(
        &self,
        method: Method,
        path: &str,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Response {
        let req = Request::new(method, path, headers, body);
        process_request(req, &self.app).await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Core request processing logic (network agnostic)
async fn process_request(mut req: Request, app: &App) -> Response {
    let request_id = req
        .header("x-request-id")
        .map_or_else(generate_request_id, String::from);

    let response = match app.select(&req.path) {
        Some(controller) => {
            let base = controller.base_path().to_string();
            req.strip_mount(&base);
            debug!(controller = %controller.name(), path = %req.path, "Controller selected");
            app.router.dispatch(controller.as_ref(), req).await
        }
        None => Response::not_found(format!("no controller mounted for {}", req.path)),
    };

    response.with_header("x-request-id", &request_id)
}

async fn handle_request(
    req: hyper::Request<hyper::body::Incoming>,
    app: &App,
    max_body_size: usize,
) -> hyper::Response<Full<Bytes>> {
    let request = match Request::from_hyper_with_limit(req, max_body_size).await {
        Ok(r) => r,
        Err(e @ Error::PayloadTooLarge { .. }) => {
            debug!(error = %e, "Request body rejected");
            return plain(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
        }
        Err(e @ Error::UnsupportedMethod(_)) => {
            return into_hyper(Response::not_implemented(e.to_string()));
        }
        Err(e) => return into_hyper(Response::bad_request(e.to_string())),
    };

    into_hyper(process_request(request, app).await)
}

/// Convert an envelope to a hyper response
fn into_hyper(response: Response) -> hyper::Response<Full<Bytes>> {
    let body = match response.payload().to_bytes() {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Failed to encode response payload");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    let status =
        StatusCode::from_u16(response.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = hyper::Response::builder().status(status);
    for (k, v) in response.headers() {
        builder = builder.header(k.as_str(), v.as_str());
    }

    builder.body(Full::new(body)).unwrap_or_else(|e| {
        error!(error = %e, "Invalid response header");
        plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    })
}

fn plain(status: StatusCode, body: &'static str) -> hyper::Response<Full<Bytes>> {
    let mut response = hyper::Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}
