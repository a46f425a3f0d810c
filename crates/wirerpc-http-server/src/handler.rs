//! HTTP request handler bridging one request to the JSON-RPC pipeline

use std::pin::pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error, warn};

use wirerpc_json_rpc_server::{
    DispatchError, JsonRpcDispatcher, JsonRpcEnvelope, JsonRpcMessage, RpcError, error_codes,
    parse_json_rpc_message,
};

use crate::{HttpRpcError, Result, ServerConfig};

/// Written when a response envelope itself cannot be serialized
const INTERNAL_ERROR_BODY: &str =
    r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal error"},"id":null}"#;

/// HTTP handler for JSON-RPC requests
#[derive(Clone)]
pub struct RpcHttpHandler {
    pub(crate) config: Arc<ServerConfig>,
    pub(crate) dispatcher: JsonRpcDispatcher,
}

impl RpcHttpHandler {
    pub fn new(config: Arc<ServerConfig>, dispatcher: JsonRpcDispatcher) -> Self {
        Self { config, dispatcher }
    }

    /// Handle one HTTP request carrying a JSON-RPC envelope.
    ///
    /// Every JSON-RPC outcome, success or error, is written with `200 OK`.
    /// Notifications are answered with `204 No Content` and no body once the
    /// handler has been scheduled; the handler's outcome is never observed.
    pub async fn handle_request<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        debug!("Handling {} {}", req.method(), req.uri().path());

        let body = match read_body(req.into_body(), self.config.max_body_size).await {
            Ok(body) => body,
            Err(HttpRpcError::BodyTooLarge { limit }) => {
                warn!("Request body too large (limit {} bytes)", limit);
                let error = RpcError::new(error_codes::INVALID_REQUEST, "Request body too large");
                return self.error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    DispatchError::new(None, error),
                );
            }
            Err(err) => {
                error!("{}", err);
                return self.error_response(
                    StatusCode::OK,
                    DispatchError::new(None, RpcError::parse_error()),
                );
            }
        };

        let envelope = match parse_json_rpc_message(&body) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!("Rejected request body: {}", err);
                return self.error_response(StatusCode::OK, err);
            }
        };

        match envelope {
            JsonRpcEnvelope::Call(request) => {
                debug!("Processing JSON-RPC call: method={}", request.method);
                let outcome = self.dispatcher.handle_request(request).await;
                let message: JsonRpcMessage = match outcome {
                    Ok(response) => response.into(),
                    Err(err) => err.into_response(self.config.include_stack).into(),
                };
                json_response(StatusCode::OK, &message)
            }
            JsonRpcEnvelope::Notification(notification) => {
                debug!(
                    "Processing JSON-RPC notification: method={}",
                    notification.method
                );
                let dispatcher = self.dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher.handle_notification(notification).await;
                });
                empty_response(StatusCode::NO_CONTENT)
            }
        }
    }

    fn error_response(&self, status: StatusCode, err: DispatchError) -> Response<Full<Bytes>> {
        let message = JsonRpcMessage::from(err.into_response(self.config.include_stack));
        json_response(status, &message)
    }
}

/// Accumulate body frames until end of input, refusing to buffer more than
/// `limit` bytes.
pub(crate) async fn read_body<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let mut body = pin!(body);
    let mut buffer = BytesMut::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| HttpRpcError::BodyRead(e.to_string()))?;
        if let Ok(chunk) = frame.into_data() {
            if buffer.len() + chunk.len() > limit {
                return Err(HttpRpcError::BodyTooLarge { limit });
            }
            buffer.extend_from_slice(&chunk);
        }
    }

    Ok(buffer.freeze())
}

pub(crate) fn encode<T: Serialize>(payload: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(payload)?))
}

fn json_response(status: StatusCode, message: &JsonRpcMessage) -> Response<Full<Bytes>> {
    let (status, body) = match encode(message) {
        Ok(body) => (status, body),
        Err(err) => {
            error!("Failed to serialize JSON-RPC response: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(INTERNAL_ERROR_BODY.as_bytes()),
            )
        }
    };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
