//! HTTP JSON-RPC server: configuration, method registration and the accept loop.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use wirerpc_json_rpc_server::{
    JsonRpcDispatcher, MethodHandler, MethodRegistry, RpcError, SharedRegistry,
};

use crate::{Result, RpcHttpHandler};

/// Pause before accepting again after a listener-level failure such as
/// running out of file descriptors
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Configuration for the HTTP JSON-RPC server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host or address to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Expose error stack traces to clients
    pub include_stack: bool,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 6356,
            include_stack: true,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Builder for the HTTP JSON-RPC server. Settings left untouched keep
/// their defaults.
#[derive(Default)]
pub struct HttpRpcServerBuilder {
    config: ServerConfig,
    registry: MethodRegistry,
}

impl HttpRpcServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the host to bind to
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the port to bind to
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Expose or hide error stack traces in responses
    pub fn include_stack(mut self, include: bool) -> Self {
        self.config.include_stack = include;
        self
    }

    /// Set maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Register a handler for a method
    pub fn handler<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: MethodHandler + 'static,
    {
        self.registry.register(name, handler);
        self
    }

    /// Register an async closure for a method
    pub fn method<F, Fut, T, E>(mut self, name: impl Into<String>, handler_fn: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: Into<RpcError> + Send + 'static,
    {
        self.registry.register_fn(name, handler_fn);
        self
    }

    /// Register a synchronous closure for a method
    pub fn method_sync<F, T, E>(mut self, name: impl Into<String>, handler_fn: F) -> Self
    where
        F: Fn(Vec<Value>) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<RpcError>,
    {
        self.registry.register_sync(name, handler_fn);
        self
    }

    /// Build the HTTP JSON-RPC server
    pub fn build(self) -> HttpRpcServer {
        let (shutdown, _) = watch::channel(false);
        HttpRpcServer {
            config: Arc::new(self.config),
            dispatcher: JsonRpcDispatcher::from(self.registry),
            shutdown: Arc::new(shutdown),
        }
    }
}

/// HTTP JSON-RPC server
///
/// Clones share the same registry and shutdown signal.
#[derive(Clone)]
pub struct HttpRpcServer {
    config: Arc<ServerConfig>,
    dispatcher: JsonRpcDispatcher,
    shutdown: Arc<watch::Sender<bool>>,
}

impl HttpRpcServer {
    /// Create a new builder with default configuration
    pub fn builder() -> HttpRpcServerBuilder {
        HttpRpcServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SharedRegistry {
        self.dispatcher.registry()
    }

    /// Register a handler; visible to requests arriving after this call.
    pub fn register<H>(&self, name: impl Into<String>, handler: H)
    where
        H: MethodHandler + 'static,
    {
        self.registry().write().register(name, handler);
    }

    /// Register an async closure
    pub fn register_fn<F, Fut, T, E>(&self, name: impl Into<String>, handler_fn: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: Into<RpcError> + Send + 'static,
    {
        self.registry().write().register_fn(name, handler_fn);
    }

    /// Register a synchronous closure
    pub fn register_sync<F, T, E>(&self, name: impl Into<String>, handler_fn: F)
    where
        F: Fn(Vec<Value>) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<RpcError>,
    {
        self.registry().write().register_sync(name, handler_fn);
    }

    /// Bind to the configured host and port and serve until [`close`](Self::close).
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until [`close`](Self::close).
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("JSON-RPC server listening on {}", listener.local_addr()?);

        let closed = wait_closed(self.shutdown.subscribe());
        tokio::pin!(closed);

        let handler = RpcHttpHandler::new(Arc::clone(&self.config), self.dispatcher.clone());

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = &mut closed => {
                    info!("JSON-RPC server stopped accepting connections");
                    return Ok(());
                }
            };
            let (stream, peer_addr) = match accepted {
                Ok(connection) => connection,
                Err(err) => {
                    match accept_backoff(&err) {
                        Some(delay) => {
                            warn!("Failed to accept connection: {}", err);
                            tokio::time::sleep(delay).await;
                        }
                        None => debug!("Connection dropped before accept: {}", err),
                    }
                    continue;
                }
            };
            debug!("New connection from {}", peer_addr);

            let handler = handler.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler.handle_request(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    if err.is_incomplete_message() {
                        debug!("Client disconnected: {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }

    /// Stop accepting connections. Idempotent; requests already being
    /// served run to completion.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Errors tied to a single connection are skipped right away; anything else
/// is retried after [`ACCEPT_ERROR_BACKOFF`].
fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted => None,
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}

async fn wait_closed(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 6356);
        assert!(config.include_stack);
        assert_eq!(config.max_body_size, 1024 * 1024);
    }

    #[test]
    fn test_builder_overrides_defaults() {
        let server = HttpRpcServer::builder()
            .host("127.0.0.1")
            .include_stack(false)
            .max_body_size(2048)
            .build();

        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 6356);
        assert!(!server.config().include_stack);
        assert_eq!(server.config().max_body_size, 2048);
    }

    #[test]
    fn test_builder_registers_methods() {
        let server = HttpRpcServer::builder()
            .method_sync("one", |_args| Ok::<_, RpcError>(1))
            .method("two", |_args| async { Ok::<_, RpcError>(2) })
            .build();
        server.register_sync("three", |_args| Ok::<_, RpcError>(3));

        assert_eq!(server.registry().read().method_names(), vec!["one", "three", "two"]);
    }

    #[test]
    fn test_accept_errors_do_not_stop_serving() {
        let aborted = io::Error::from(io::ErrorKind::ConnectionAborted);
        assert_eq!(accept_backoff(&aborted), None);

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(accept_backoff(&reset), None);

        // EMFILE
        let exhausted = io::Error::from_raw_os_error(24);
        assert_eq!(accept_backoff(&exhausted), Some(ACCEPT_ERROR_BACKOFF));
    }

    #[tokio::test]
    async fn test_close_stops_serving() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = HttpRpcServer::builder().build();

        let serving = server.clone();
        let task = tokio::spawn(async move { serving.serve(listener).await });

        server.close();
        assert!(server.is_closed());
        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_closed_before_serving_returns_immediately() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = HttpRpcServer::builder().build();
        server.close();
        server.close();

        let outcome = tokio::time::timeout(Duration::from_secs(5), server.serve(listener)).await;
        assert!(outcome.unwrap().is_ok());
    }
}
