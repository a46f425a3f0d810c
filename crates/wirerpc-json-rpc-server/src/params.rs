//! Typed access to positional handler arguments.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RpcError;

/// Deserialize the argument at `index`, failing with an invalid-params error.
pub fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> Result<T, RpcError> {
    let value = args
        .get(index)
        .ok_or_else(|| RpcError::invalid_params(format!("Missing argument at position {}", index)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| RpcError::invalid_params(format!("Argument {}: {}", index, e)))
}

/// Like [`arg`], but a missing or `null` argument yields `None`.
pub fn optional_arg<T: DeserializeOwned>(
    args: &[Value],
    index: usize,
) -> Result<Option<T>, RpcError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => arg(args, index).map(Some),
    }
}
