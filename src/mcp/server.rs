//! MCP server implementation for Colloquy
//!
//! Implements the Model Context Protocol over stdio using JSON-RPC 2.0

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::tools::{ToolArguments, ToolRegistry};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC request
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// JSON-RPC response
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }
}

/// Run the MCP server over stdio
pub async fn run_mcp_server(registry: Arc<ToolRegistry>) -> Result<()> {
    info!(tools = registry.len(), "Colloquy MCP server started");
    serve(&registry, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Serve newline-delimited JSON-RPC until the reader is exhausted.
pub async fn serve<R, W>(registry: &ToolRegistry, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = handle_line(registry, &line).await {
            let mut out = serde_json::to_string(&response)?;
            out.push('\n');
            writer.write_all(out.as_bytes()).await?;
            writer.flush().await?;
        }
    }

    Ok(())
}

/// Notifications (no id) produce no response.
async fn handle_line(registry: &ToolRegistry, line: &str) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            warn!("Unparseable JSON-RPC line: {}", e);
            return Some(JsonRpcResponse::error(Value::Null, -32700, format!("Parse error: {}", e)));
        }
    };
    debug!(method = %request.method, "MCP request");

    let id = request.id.clone()?;
    Some(match handle_request(registry, &request).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err((code, message)) => JsonRpcResponse::error(id, code, message),
    })
}

async fn handle_request(registry: &ToolRegistry, request: &JsonRpcRequest) -> Result<Value, (i32, String)> {
    match request.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": "colloquy",
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Colloquy exposes its question-answering tools: transaction lookup, weather and a calculator."
        })),

        "tools/list" => {
            let tools: Vec<Value> = registry
                .list()
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name(),
                        "description": t.description(),
                        "inputSchema": t.parameters()
                    })
                })
                .collect();
            Ok(json!({ "tools": tools }))
        }

        "tools/call" => {
            let name = request
                .params
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or((-32602, "Missing tool name".to_string()))?;
            let arguments: ToolArguments = request
                .params
                .get("arguments")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default();

            let (text, is_error) = match registry.execute(name, &arguments).await {
                Ok(value) => (value.to_string(), false),
                Err(e) => (e.to_string(), true),
            };

            Ok(json!({
                "content": [{ "type": "text", "text": text }],
                "isError": is_error
            }))
        }

        "ping" => Ok(json!({})),

        _ => Err((-32601, format!("Unknown method: {}", request.method))),
    }
}
