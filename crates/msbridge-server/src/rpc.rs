//! Line-delimited JSON-RPC 2.0 loop over stdio.
//!
//! One request per stdin line, one response per stdout line. Handles
//! `initialize`, `tools/list`, and `tools/call`; notifications (requests
//! without an id) are acknowledged with silence, as JSON-RPC requires.
//! Nothing but response frames may ever reach stdout.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use msbridge_tools::ToolRegistry;

/// MCP protocol revision this server speaks.
const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

/// Reads requests from stdin until EOF, writing responses to stdout.
pub async fn serve(registry: Arc<ToolRegistry>) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(request) => handle(&registry, request).await,
            Err(e) => Some(error_response(
                Value::Null,
                PARSE_ERROR,
                format!("parse error: {e}"),
            )),
        };

        if let Some(response) = response {
            let mut frame = encode_frame(&response);
            frame.push('\n');
            stdout.write_all(frame.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    debug!("stdin closed, shutting down");
    Ok(())
}

/// Serializes one response frame. A serialization failure answers the
/// request with an internal error instead of killing the stdio loop for
/// every request after it.
fn encode_frame(response: &Value) -> String {
    match serde_json::to_string(response) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "response serialization failed");
            let id = response.get("id").cloned().unwrap_or(Value::Null);
            internal_error_frame(id)
        }
    }
}

/// A `-32603` response built without going back through serde.
fn internal_error_frame(id: Value) -> String {
    let id = match serde_json::to_string(&id) {
        Ok(id) => id,
        Err(_) => "null".to_string(),
    };
    format!(
        r#"{{"jsonrpc":"2.0","id":{id},"error":{{"code":{INTERNAL_ERROR},"message":"internal error: response serialization failed"}}}}"#
    )
}

/// Dispatches one request. Returns `None` for notifications.
async fn handle(registry: &ToolRegistry, request: Value) -> Option<Value> {
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_string);

    let id = match request.get("id") {
        Some(id) if !id.is_null() => id.clone(),
        _ => {
            debug!(method = method.as_deref().unwrap_or("?"), "ignoring notification");
            return None;
        }
    };

    let Some(method) = method else {
        return Some(error_response(id, INVALID_REQUEST, "missing method".into()));
    };

    match method.as_str() {
        "initialize" => Some(result_response(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": "msbridge",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": { "tools": {} },
            }),
        )),

        "tools/list" => Some(result_response(id, json!({ "tools": registry.list() }))),

        "tools/call" => {
            let params = request.get("params").cloned().unwrap_or(Value::Null);
            let Some(name) = params.get("name").and_then(Value::as_str) else {
                return Some(error_response(
                    id,
                    INVALID_PARAMS,
                    "params.name is required".into(),
                ));
            };
            let Some(tool) = registry.get(name) else {
                return Some(error_response(
                    id,
                    INVALID_PARAMS,
                    format!("unknown tool: {name}"),
                ));
            };

            let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
            match tool.call(arguments).await {
                Ok(value) => Some(result_response(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": pretty(&value) }],
                        "isError": false,
                    }),
                )),
                Err(error) => {
                    warn!(tool = name, kind = %error.kind(), "tool call failed");
                    let payload =
                        serde_json::to_value(&error).unwrap_or_else(|_| json!(error.to_string()));
                    Some(result_response(
                        id,
                        json!({
                            "content": [{ "type": "text", "text": pretty(&payload) }],
                            "isError": true,
                        }),
                    ))
                }
            }
        }

        other => Some(error_response(
            id,
            METHOD_NOT_FOUND,
            format!("unknown method: {other}"),
        )),
    }
}

fn result_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error_response(id: Value, code: i64, message: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
