//! The request pipeline: parse, validate, classify, resolve, invoke, shape.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{DispatchError, RpcError};
use crate::registry::{MethodHandler, MethodRegistry, SharedRegistry};
use crate::request::{JsonRpcEnvelope, JsonRpcNotification, JsonRpcRequest, RequestParams};
use crate::response::JsonRpcResponse;
use crate::types::{JsonRpcVersion, RequestId};

/// Parse a raw body into a classified envelope.
///
/// Fails with -32700 if the body is not JSON and with -32600 if it is not a
/// structurally valid request. `id` is not validated: a non-numeric or absent
/// id makes the envelope a notification.
pub fn parse_json_rpc_message(body: &[u8]) -> Result<JsonRpcEnvelope, DispatchError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| DispatchError::new(None, RpcError::parse_error()))?;

    let Value::Object(mut object) = value else {
        return Err(DispatchError::new(None, RpcError::invalid_request()));
    };

    let id = object.get("id").and_then(RequestId::from_value);
    let invalid = || DispatchError::new(id.clone(), RpcError::invalid_request());

    if object.get("jsonrpc").and_then(Value::as_str) != Some(JsonRpcVersion::V2_0.as_str()) {
        return Err(invalid());
    }
    let method = match object.remove("method") {
        Some(Value::String(method)) => method,
        _ => return Err(invalid()),
    };
    let params = object
        .remove("params")
        .and_then(RequestParams::from_value)
        .ok_or_else(invalid)?;

    Ok(match id {
        Some(id) => JsonRpcEnvelope::Call(JsonRpcRequest::new(id, method, params)),
        None => JsonRpcEnvelope::Notification(JsonRpcNotification::new(method, params)),
    })
}

/// Dispatches validated envelopes to the handlers of a method registry.
#[derive(Clone, Default)]
pub struct JsonRpcDispatcher {
    registry: SharedRegistry,
}

impl JsonRpcDispatcher {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    fn resolve(&self, method: &str) -> Option<Arc<dyn MethodHandler>> {
        self.registry.read().resolve(method)
    }

    /// Run the whole pipeline over one raw body.
    ///
    /// Returns `Ok(None)` for notifications, which never produce a response.
    pub async fn process(&self, body: &[u8]) -> Result<Option<JsonRpcResponse>, DispatchError> {
        match parse_json_rpc_message(body)? {
            JsonRpcEnvelope::Call(request) => self.handle_request(request).await.map(Some),
            JsonRpcEnvelope::Notification(notification) => {
                self.handle_notification(notification).await;
                Ok(None)
            }
        }
    }

    /// Invoke the handler for a call. Handler errors are returned unchanged,
    /// tagged with the call's id.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
    ) -> Result<JsonRpcResponse, DispatchError> {
        let JsonRpcRequest {
            method, params, id, ..
        } = request;

        let handler = self.resolve(&method).ok_or_else(|| {
            debug!("Method not found: {}", method);
            DispatchError::new(Some(id.clone()), RpcError::method_not_found())
        })?;

        debug!("Invoking method={} id={}", method, id);
        match invoke(&method, handler.as_ref(), params.into_positional()).await {
            Ok(result) => Ok(JsonRpcResponse::success(id, result)),
            Err(error) => {
                debug!("Method {} failed: {}", method, error);
                Err(DispatchError::new(Some(id), error))
            }
        }
    }

    /// Invoke the handler for a notification. Unknown methods and handler
    /// failures are logged and discarded.
    pub async fn handle_notification(&self, notification: JsonRpcNotification) {
        let JsonRpcNotification { method, params, .. } = notification;

        let Some(handler) = self.resolve(&method) else {
            debug!("Ignoring notification for unknown method: {}", method);
            return;
        };

        if let Err(error) = invoke(&method, handler.as_ref(), params.into_positional()).await {
            warn!("Notification handler {} failed: {}", method, error);
        }
    }
}

/// Run a handler, turning a panic into a -32000 error carrying the panic
/// message.
async fn invoke(
    method: &str,
    handler: &dyn MethodHandler,
    args: Vec<Value>,
) -> Result<Value, RpcError> {
    match AssertUnwindSafe(handler.call(args)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Handler for method {} panicked: {}", method, message);
            Err(RpcError::server_error(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Handler panicked".to_string()
    }
}

impl From<MethodRegistry> for JsonRpcDispatcher {
    fn from(registry: MethodRegistry) -> Self {
        Self::new(registry.into_shared())
    }
}
