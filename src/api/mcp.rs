// Line-delimited JSON-RPC 2.0 server speaking the MCP tool protocol.
//
// One request per line on the reader, one response per line on the writer.
// Notifications (no id) get no response. Logs go to stderr, so stdout
// carries nothing but protocol frames.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use super::{ToolCall, ToolOutput, ToolService, DEFAULT_MAX_POSTS, MAX_POSTS_LIMIT};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const PARSE_ERROR: i64 = -32700;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// Handle one decoded request. `None` means no response is due.
pub async fn handle_request(service: &ToolService, request: Value) -> Option<Value> {
    let req: RpcRequest = match serde_json::from_value(request) {
        Ok(req) => req,
        Err(e) => return Some(rpc_err(Value::Null, PARSE_ERROR, &format!("invalid request: {e}"))),
    };
    let id = req.id.clone();

    match req.method.as_str() {
        "initialize" => id.map(|msg_id| {
            rpc_ok(
                msg_id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": {
                        "name": "toxwatch",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
        }),
        "ping" => id.map(|msg_id| rpc_ok(msg_id, json!({}))),
        "notifications/initialized" | "initialized" => None,
        "tools/list" => id.map(|msg_id| rpc_ok(msg_id, tools_list_result())),
        "tools/call" => {
            let msg_id = id?;
            match serde_json::from_value::<ToolCall>(req.params) {
                Ok(call) => {
                    let result = match service.call(call).await {
                        Ok(output) => tool_ok(&output),
                        Err(e) => tool_error_result(e.to_string()),
                    };
                    Some(rpc_ok(msg_id, result))
                }
                Err(e) => Some(rpc_err(msg_id, INVALID_PARAMS, &format!("invalid params: {e}"))),
            }
        }
        _ => id.map(|msg_id| {
            rpc_err(msg_id, METHOD_NOT_FOUND, &format!("method not found: {}", req.method))
        }),
    }
}

/// Serve requests from `reader` until EOF.
pub async fn serve<R, W>(service: &ToolService, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(line, "Incoming RPC line");

        let response = match serde_json::from_str::<Value>(line) {
            Ok(request) => handle_request(service, request).await,
            Err(e) => {
                warn!(error = %e, "Failed to parse RPC request");
                Some(rpc_err(Value::Null, PARSE_ERROR, &format!("parse error: {e}")))
            }
        };

        if let Some(resp) = response {
            let payload = serde_json::to_vec(&resp)?;
            writer.write_all(&payload).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    Ok(())
}

/// Serve on stdin/stdout.
pub async fn run_stdio(service: ToolService) -> Result<()> {
    serve(&service, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

fn tools_list_result() -> Value {
    json!({
        "tools": [
            {
                "name": "classify_text",
                "description": "Classify a piece of text as TOXIC or NON_TOXIC with a score in [0, 1].",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "text": { "type": "string" }
                    },
                    "required": ["text"]
                }
            },
            {
                "name": "analyze_user",
                "description": "Classify a Reddit user's recent comments and submissions and summarize their toxicity.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "username": { "type": "string" },
                        "max_posts": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": MAX_POSTS_LIMIT,
                            "default": DEFAULT_MAX_POSTS
                        }
                    },
                    "required": ["username"]
                }
            },
            {
                "name": "validate",
                "description": "Check a bearer token and return the server owner's identifier.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "token": { "type": "string" }
                    },
                    "required": ["token"]
                }
            }
        ]
    })
}

fn rpc_ok(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn rpc_err(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}

fn tool_ok(output: &ToolOutput) -> Value {
    let payload = serde_json::to_value(output).unwrap_or(Value::Null);
    let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": payload,
        "isError": false
    })
}

fn tool_error_result(message: String) -> Value {
    json!({
        "content": [{ "type": "text", "text": message }],
        "isError": true
    })
}
