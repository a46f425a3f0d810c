//! Method registry: maps method names to callable handlers.
//!
//! Handlers receive their arguments positionally. Synchronous and
//! asynchronous closures are both adapted into [`MethodHandler`], so the
//! pipeline awaits every invocation the same way.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::error::RpcError;

/// Registry shared between a server instance and its request pipeline.
pub type SharedRegistry = Arc<RwLock<MethodRegistry>>;

/// Future returned by boxed function handlers
pub type HandlerFuture = BoxFuture<'static, Result<Value, RpcError>>;

/// Trait for handling a single JSON-RPC method
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Invoke the method with positional arguments
    async fn call(&self, args: Vec<Value>) -> Result<Value, RpcError>;
}

/// A closure-backed handler
pub struct FunctionHandler {
    handler_fn: Box<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>,
}

impl FunctionHandler {
    /// Wrap an async closure
    pub fn new<F, Fut, T, E>(handler_fn: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: Into<RpcError> + Send + 'static,
    {
        Self {
            handler_fn: Box::new(move |args| {
                let pending = handler_fn(args);
                async move {
                    let value = pending.await.map_err(Into::into)?;
                    to_result_value(&value)
                }
                .boxed()
            }),
        }
    }

    /// Wrap a synchronous closure; it completes without suspending.
    pub fn from_sync<F, T, E>(handler_fn: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<RpcError>,
    {
        Self {
            handler_fn: Box::new(move |args| {
                let outcome = handler_fn(args)
                    .map_err(Into::into)
                    .and_then(|value| to_result_value(&value));
                future::ready(outcome).boxed()
            }),
        }
    }
}

#[async_trait]
impl MethodHandler for FunctionHandler {
    async fn call(&self, args: Vec<Value>) -> Result<Value, RpcError> {
        (self.handler_fn)(args).await
    }
}

fn to_result_value<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| {
        RpcError::internal_error(Some(format!("Failed to serialize result: {}", e)))
    })
}

/// Method name to handler mapping. Re-registering a name replaces the
/// previous handler.
#[derive(Default)]
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H)
    where
        H: MethodHandler + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    /// Register an async closure
    pub fn register_fn<F, Fut, T, E>(&mut self, name: impl Into<String>, handler_fn: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: Into<RpcError> + Send + 'static,
    {
        self.register(name, FunctionHandler::new(handler_fn));
    }

    /// Register a synchronous closure
    pub fn register_sync<F, T, E>(&mut self, name: impl Into<String>, handler_fn: F)
    where
        F: Fn(Vec<Value>) -> Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<RpcError>,
    {
        self.register(name, FunctionHandler::from_sync(handler_fn));
    }

    /// Look up the handler for a method
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn MethodHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered method names, sorted
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.method_names())
            .finish()
    }
}
