use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JsonRpcError;
use crate::types::{JsonRpcVersion, RequestId};

/// A successful JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub result: Value,
    pub id: RequestId,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            result,
            id,
        }
    }
}

/// Either a successful response or an error response, as seen on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Error response with error field
    Error(JsonRpcError),
    /// Successful response with result field
    Response(JsonRpcResponse),
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcError> for JsonRpcMessage {
    fn from(error: JsonRpcError) -> Self {
        Self::Error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_wire_shape() {
        let response = JsonRpcResponse::success(RequestId::from(1i64), json!(5));
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"jsonrpc":"2.0","result":5,"id":1}"#
        );
    }

    #[test]
    fn test_message_distinguishes_error() {
        let error: JsonRpcMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "error": {"code": -32601, "message": "Method not found"},
            "id": 3
        }))
        .unwrap();
        assert!(matches!(error, JsonRpcMessage::Error(ref e) if e.id == Some(RequestId::from(3i64))));

        let success: JsonRpcMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "result": null, "id": 4})).unwrap();
        assert!(matches!(success, JsonRpcMessage::Response(_)));
    }

    #[test]
    fn test_message_serializes_like_inner_envelope() {
        let message = JsonRpcMessage::from(JsonRpcResponse::success(RequestId::from(2i64), json!("ok")));
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"jsonrpc":"2.0","result":"ok","id":2}"#
        );
    }
}
