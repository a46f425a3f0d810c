//! # HTTP JSON-RPC Server
//!
//! This crate provides the HTTP transport for the wirerpc request pipeline.
//! Each request body is buffered (up to a configured limit), handed to the
//! pipeline, and the outcome is written back as a JSON-RPC envelope.
//!
//! ## Features
//! - hyper 1.x HTTP/1.1 server on tokio, one task per connection
//! - Fire-and-forget notifications answered with an empty body
//! - Configurable stack trace exposure in error objects
//! - Method registration before or during serving

pub mod handler;
pub mod prelude;
pub mod server;

#[cfg(test)]
mod tests;

// Re-export main types
pub use handler::RpcHttpHandler;
pub use server::{HttpRpcServer, HttpRpcServerBuilder, ServerConfig};

// Re-export foundational types
pub use wirerpc_json_rpc_server::{
    JsonRpcDispatcher, MethodHandler, MethodRegistry, RpcError, SharedRegistry,
};

/// Result type for HTTP JSON-RPC server operations
pub type Result<T> = std::result::Result<T, HttpRpcError>;

/// HTTP JSON-RPC server errors
#[derive(Debug, thiserror::Error)]
pub enum HttpRpcError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Failed to read request body: {0}")]
    BodyRead(String),
}
