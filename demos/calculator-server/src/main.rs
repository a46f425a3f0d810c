//! # Calculator JSON-RPC Server
//!
//! Embeds the HTTP JSON-RPC server and registers a handful of arithmetic
//! methods, one async method and one notification sink.
//!
//! ```text
//! curl -X POST http://127.0.0.1:6356 \
//!   -d '{"jsonrpc":"2.0","method":"add","params":[2,3],"id":1}'
//! ```

use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wirerpc_http_server::HttpRpcServer;
use wirerpc_json_rpc_server::RpcError;
use wirerpc_json_rpc_server::params::{arg, optional_arg};

#[derive(Debug, Parser)]
#[command(name = "calculator-server", about = "JSON-RPC 2.0 calculator over HTTP")]
struct Args {
    /// Host to bind to
    #[arg(long, env = "WIRERPC_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind to
    #[arg(long, env = "WIRERPC_PORT", default_value_t = 6356)]
    port: u16,

    /// Hide error stack traces from clients
    #[arg(long)]
    no_stack: bool,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = 1024 * 1024)]
    max_body_size: usize,
}

#[derive(Debug, Deserialize)]
struct DelayedEcho {
    value: Value,
    #[serde(default)]
    delay_ms: u64,
}

/// Integer arguments sum to an integer; any float (or i64 overflow) sums as f64.
fn sum(args: Vec<Value>) -> Result<Value, RpcError> {
    let integer_total = args
        .iter()
        .try_fold(0i64, |total, v| v.as_i64().and_then(|n| total.checked_add(n)));
    if let Some(total) = integer_total {
        return Ok(total.into());
    }

    let total = args
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| RpcError::invalid_params("All arguments must be numbers"))
        })
        .sum::<Result<f64, RpcError>>()?;
    Ok(total.into())
}

fn subtract(args: Vec<Value>) -> Result<f64, RpcError> {
    let a: f64 = arg(&args, 0)?;
    let b: f64 = arg(&args, 1)?;
    Ok(a - b)
}

fn divide(args: Vec<Value>) -> anyhow::Result<f64> {
    let a: f64 = arg(&args, 0)?;
    let b: f64 = arg(&args, 1)?;
    if b == 0.0 {
        bail!("Division by zero");
    }
    Ok(a / b)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let server = HttpRpcServer::builder()
        .host(args.host)
        .port(args.port)
        .include_stack(!args.no_stack)
        .max_body_size(args.max_body_size)
        .method_sync("add", sum)
        .method_sync("subtract", subtract)
        .method_sync("divide", divide)
        .method("echo_later", |args: Vec<Value>| async move {
            let request: DelayedEcho = arg(&args, 0)?;
            tokio::time::sleep(Duration::from_millis(request.delay_ms)).await;
            Ok::<_, RpcError>(request.value)
        })
        .method_sync("log", |args: Vec<Value>| {
            let message: Option<String> = optional_arg(&args, 0)?;
            info!("Client log: {}", message.unwrap_or_default());
            Ok::<_, RpcError>(())
        })
        .build();

    let stopper = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            stopper.close();
        }
    });

    server
        .run()
        .await
        .context("JSON-RPC server terminated with an error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sum_keeps_integers() {
        assert_eq!(sum(vec![json!(2), json!(3)]).unwrap(), json!(5));
        assert_eq!(sum(vec![]).unwrap(), json!(0));
    }

    #[test]
    fn test_sum_falls_back_to_float() {
        assert_eq!(sum(vec![json!(2), json!(0.5)]).unwrap(), json!(2.5));
        assert_eq!(
            sum(vec![json!(i64::MAX), json!(1)]).unwrap(),
            json!(i64::MAX as f64 + 1.0)
        );
    }

    #[test]
    fn test_sum_rejects_non_numbers() {
        assert_eq!(sum(vec![json!("2")]).unwrap_err().code, -32602);
    }
}
