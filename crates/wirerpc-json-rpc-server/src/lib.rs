//! # JSON-RPC 2.0 Request Pipeline
//!
//! A transport-agnostic JSON-RPC 2.0 server core. It turns one raw request
//! body into exactly one outcome: a result envelope, nothing (for
//! notifications), or a structured error.
//!
//! ## Features
//! - Envelope validation with the standard error codes
//! - Explicit `Call` / `Notification` classification
//! - Method registry accepting sync and async closures
//! - Allow-listed error serialization with optional stack exposure

pub mod dispatch;
pub mod error;
pub mod params;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use dispatch::{JsonRpcDispatcher, parse_json_rpc_message};
pub use error::{DispatchError, JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, RpcError};
pub use registry::{FunctionHandler, MethodHandler, MethodRegistry, SharedRegistry};
pub use request::{JsonRpcEnvelope, JsonRpcNotification, JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Code used for handler errors that carry no code of their own
    pub const SERVER_ERROR_DEFAULT: i64 = -32000;
}
