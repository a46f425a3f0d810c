//! # JSON-RPC Server Prelude
//!
//! Convenient re-exports of the most commonly used types.
//!
//! ```rust
//! use wirerpc_json_rpc_server::prelude::*;
//! ```

pub use crate::dispatch::{JsonRpcDispatcher, parse_json_rpc_message};
pub use crate::error::{DispatchError, JsonRpcError, JsonRpcErrorCode, RpcError};
pub use crate::params::{arg, optional_arg};
pub use crate::registry::{MethodHandler, MethodRegistry, SharedRegistry};
pub use crate::request::{JsonRpcEnvelope, RequestParams};
pub use crate::response::{JsonRpcMessage, JsonRpcResponse};
pub use crate::types::RequestId;

// Standard error codes
pub use crate::error_codes::*;
