use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::error_codes;
use crate::types::{JsonRpcVersion, RequestId};

/// JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError(i64), // -32099 to -32000
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => error_codes::PARSE_ERROR,
            JsonRpcErrorCode::InvalidRequest => error_codes::INVALID_REQUEST,
            JsonRpcErrorCode::MethodNotFound => error_codes::METHOD_NOT_FOUND,
            JsonRpcErrorCode::InvalidParams => error_codes::INVALID_PARAMS,
            JsonRpcErrorCode::InternalError => error_codes::INTERNAL_ERROR,
            JsonRpcErrorCode::ServerError(code) => *code,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::ServerError(_) => "Server error",
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// A structured RPC failure raised anywhere in the pipeline or by a handler.
///
/// `stack` holds the rendered cause chain of the underlying error, if any.
/// It is only written to the wire when the server is configured to expose it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
    pub stack: Option<String>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            stack: None,
        }
    }

    fn from_code(code: JsonRpcErrorCode) -> Self {
        Self::new(code.code(), code.message())
    }

    pub fn parse_error() -> Self {
        Self::from_code(JsonRpcErrorCode::ParseError)
    }

    pub fn invalid_request() -> Self {
        Self::from_code(JsonRpcErrorCode::InvalidRequest)
    }

    pub fn method_not_found() -> Self {
        Self::from_code(JsonRpcErrorCode::MethodNotFound)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message)
    }

    pub fn internal_error(message: Option<String>) -> Self {
        match message {
            Some(message) => Self::new(error_codes::INTERNAL_ERROR, message),
            None => Self::from_code(JsonRpcErrorCode::InternalError),
        }
    }

    /// Application error with the default server error code (-32000).
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::SERVER_ERROR_DEFAULT, message)
    }

    /// Wrap an arbitrary error that carries no RPC code of its own.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut stack = format!("Error: {}", err);
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str(&format!("\nCaused by: {}", cause));
            source = cause.source();
        }
        Self::server_error(err.to_string()).with_stack(stack)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Build the wire error object. Only `code`, `message`, `data` and,
    /// when `include_stack` is set, `stack` are ever serialized.
    pub fn to_error_object(&self, include_stack: bool) -> JsonRpcErrorObject {
        JsonRpcErrorObject {
            code: self.code,
            message: self.message.clone(),
            data: self.data.clone(),
            stack: if include_stack {
                self.stack.clone()
            } else {
                None
            },
        }
    }
}

impl From<anyhow::Error> for RpcError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<RpcError>() {
            Ok(rpc_error) => rpc_error,
            Err(err) => Self::server_error(err.to_string()).with_stack(format!("{:?}", err)),
        }
    }
}

/// JSON-RPC Error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// JSON-RPC Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub error: JsonRpcErrorObject,
    pub id: Option<RequestId>,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            error,
            id,
        }
    }
}

/// A pipeline rejection: the error plus whatever request id was known when
/// the failing stage ran.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct DispatchError {
    pub id: Option<RequestId>,
    #[source]
    pub error: RpcError,
}

impl DispatchError {
    pub fn new(id: Option<RequestId>, error: RpcError) -> Self {
        Self { id, error }
    }

    pub fn into_response(self, include_stack: bool) -> JsonRpcError {
        JsonRpcError::new(self.id, self.error.to_error_object(include_stack))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Error)]
    #[error("disk on fire")]
    struct Inner;

    #[derive(Debug, Error)]
    #[error("could not save")]
    struct Outer(#[source] Inner);

    #[test]
    fn test_error_codes() {
        assert_eq!(JsonRpcErrorCode::ParseError.code(), -32700);
        assert_eq!(JsonRpcErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(JsonRpcErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(RpcError::server_error("boom").code, -32000);
    }

    #[test]
    fn test_parse_error_wire_shape() {
        let response = DispatchError::new(None, RpcError::parse_error()).into_response(true);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"jsonrpc": "2.0", "error": {"code": -32700, "message": "Parse error"}, "id": null})
        );
    }

    #[test]
    fn test_from_error_renders_cause_chain() {
        let err = RpcError::from_error(&Outer(Inner));
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "could not save");
        let stack = err.stack.unwrap();
        assert!(stack.contains("could not save"));
        assert!(stack.contains("Caused by: disk on fire"));
    }

    #[test]
    fn test_stack_suppressed_when_disabled() {
        let err = RpcError::server_error("boom").with_stack("trace");
        assert_eq!(err.to_error_object(true).stack.as_deref(), Some("trace"));

        let json = serde_json::to_value(err.to_error_object(false)).unwrap();
        assert!(json.get("stack").is_none());
    }

    #[test]
    fn test_anyhow_keeps_explicit_code() {
        let err: anyhow::Error = RpcError::new(-32042, "quota exceeded").into();
        let rpc: RpcError = err.into();
        assert_eq!(rpc.code, -32042);
        assert_eq!(rpc.message, "quota exceeded");
    }

    #[test]
    fn test_anyhow_defaults_to_server_error() {
        let rpc: RpcError = anyhow::anyhow!("plain failure").into();
        assert_eq!(rpc.code, -32000);
        assert_eq!(rpc.message, "plain failure");
        assert!(rpc.stack.is_some());
    }
}
