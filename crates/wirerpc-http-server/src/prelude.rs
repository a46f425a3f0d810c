//! # HTTP JSON-RPC Server Prelude
//!
//! ```rust
//! use wirerpc_http_server::prelude::*;
//! ```

// Core server types
pub use crate::handler::RpcHttpHandler;
pub use crate::server::{HttpRpcServer, HttpRpcServerBuilder, ServerConfig};

// Re-export foundational types
pub use wirerpc_json_rpc_server::prelude::*;

// Error types
pub use crate::{HttpRpcError, Result};
