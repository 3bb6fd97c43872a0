//! JSON-RPC 2.0 session handling for the MCP endpoint
//!
//! [`SessionHandler`] turns one parsed request object into a [`SessionReply`].
//! It owns the tool layer and with it the debug engine, so it lives on the
//! session worker and is never shared.

use rmcp::model::{
    Implementation, JsonObject, ProtocolVersion, ServerCapabilities, ServerInfo, ToolsCapability,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::{codes, Result};
use crate::tools::{DebuggerTools, ToolRegistry};

const SERVER_INSTRUCTIONS: &str = "Debugger for a running emulator. Call get_rom_info to learn the \
console and its CPU types, then inspect state with get_cpu_state, get_memory_range and \
get_disassembly. Control execution with set_breakpoints, step, pause and resume.";

/// Incoming request; every field is optional so shape errors can be reported precisely
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Accepted with any value; never checked
    #[serde(default)]
    pub jsonrpc: Option<Value>,
    /// Any JSON type; absent or `null` marks a notification
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<Value>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Unrecoverable fault; the request id may not be known at this point
    pub fn internal_error() -> Self {
        Self::error(Value::from(0), codes::INTERNAL_ERROR, "Internal error")
    }
}

/// Outcome of handling one request
#[derive(Debug, Clone, PartialEq)]
pub enum SessionReply {
    /// HTTP 200 with a JSON-RPC response
    Respond(JsonRpcResponse),
    /// HTTP 202, no body
    Accepted,
    /// HTTP 500 with an internal error response
    Failed(JsonRpcResponse),
}

pub struct SessionHandler {
    registry: ToolRegistry,
    tools: DebuggerTools,
    server_name: String,
    server_version: String,
}

impl SessionHandler {
    pub fn new(config: &ServerConfig, tools: DebuggerTools) -> Self {
        Self {
            registry: ToolRegistry::builtin(),
            tools,
            server_name: config.name.clone(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn handle(&mut self, message: Value) -> SessionReply {
        let parsed = if message.is_object() {
            serde_json::from_value::<JsonRpcRequest>(message).map_err(|e| e.to_string())
        } else {
            Err(format!("expected an object, got {}", message))
        };
        let request = match parsed {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejecting malformed request: {}", e);
                return SessionReply::Respond(JsonRpcResponse::error(
                    Value::from(0),
                    codes::INVALID_REQUEST,
                    "Invalid request",
                ));
            }
        };

        let Some(id) = request.id else {
            debug!("Accepted notification {:?}", request.method);
            return SessionReply::Accepted;
        };

        let Some(method) = request.method.as_ref().and_then(Value::as_str) else {
            return SessionReply::Respond(JsonRpcResponse::error(
                id,
                codes::INVALID_REQUEST,
                "Invalid request",
            ));
        };

        debug!("Handling '{}' (id {})", method, id);
        match self.dispatch(method, request.params) {
            Ok(Some(result)) => SessionReply::Respond(JsonRpcResponse::success(id, result)),
            Ok(None) => SessionReply::Respond(JsonRpcResponse::error(
                id,
                codes::METHOD_NOT_FOUND,
                format!("Unknown method: {}", method),
            )),
            Err(e) => {
                warn!("Failed to handle '{}': {}", method, e);
                SessionReply::Failed(JsonRpcResponse::internal_error())
            }
        }
    }

    /// `Ok(None)` for an unknown method
    fn dispatch(&mut self, method: &str, params: Option<Value>) -> Result<Option<Value>> {
        let result = match method {
            "initialize" => serde_json::to_value(self.server_info())?,
            "ping" => json!({}),
            "tools/list" => {
                let tools: Vec<_> = self.registry.tools().collect();
                json!({ "tools": tools })
            }
            "tools/call" => {
                let mut params = match params {
                    Some(Value::Object(params)) => params,
                    _ => JsonObject::new(),
                };
                let name = params.get("name").and_then(Value::as_str).map(str::to_owned);
                let arguments = match params.remove("arguments") {
                    Some(Value::Object(arguments)) => Some(arguments),
                    _ => None,
                };
                let result = self.tools.call(&self.registry, name.as_deref(), arguments);
                serde_json::to_value(result)?
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }

    fn server_info(&self) -> ServerInfo {
        let mut server_info = Implementation::from_build_env();
        server_info.name = self.server_name.clone();
        server_info.version = self.server_version.clone();

        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                ..Default::default()
            },
            server_info,
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::engine::{ConsoleType, SimulatedEngine};

    fn handler() -> SessionHandler {
        let tools = DebuggerTools::new(
            Box::new(SimulatedEngine::new(ConsoleType::Snes)),
            LimitsConfig::default(),
            "2.0",
        );
        SessionHandler::new(&ServerConfig::default(), tools)
    }

    fn respond(handler: &mut SessionHandler, message: Value) -> JsonRpcResponse {
        match handler.handle(message) {
            SessionReply::Respond(response) => response,
            other => panic!("expected a response, got {:?}", other),
        }
    }

    #[test]
    fn test_initialize() {
        let mut handler = handler();
        let response = respond(
            &mut handler,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
        );
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
        assert_eq!(result["serverInfo"]["name"], "emu-debug-mcp");
        assert_eq!(result["serverInfo"]["version"], env!("CARGO_PKG_VERSION"));
        assert!(result["instructions"].is_string());
    }

    #[test]
    fn test_id_echo_preserves_type() {
        let mut handler = handler();
        for id in [json!(7), json!("abc"), json!(2.5), json!({ "k": [1] })] {
            let response = respond(&mut handler, json!({ "id": id.clone(), "method": "ping" }));
            assert_eq!(response.id, id);
            assert_eq!(response.result, Some(json!({})));
        }
    }

    #[test]
    fn test_notifications_are_accepted() {
        let mut handler = handler();
        assert_eq!(
            handler.handle(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })),
            SessionReply::Accepted
        );
        assert_eq!(
            handler.handle(json!({ "id": null, "method": "no/such/method" })),
            SessionReply::Accepted
        );
    }

    #[test]
    fn test_unknown_method() {
        let mut handler = handler();
        let response = respond(&mut handler, json!({ "id": 3, "method": "resources/list" }));
        let error = response.error.unwrap();
        assert_eq!(error.code, codes::METHOD_NOT_FOUND);
        assert_eq!(error.message, "Unknown method: resources/list");
        assert!(response.result.is_none());
    }

    #[test]
    fn test_missing_method() {
        let mut handler = handler();
        let response = respond(&mut handler, json!({ "id": "x", "method": 12 }));
        assert_eq!(response.id, json!("x"));
        assert_eq!(response.error.unwrap().code, codes::INVALID_REQUEST);
    }

    #[test]
    fn test_tools_list() {
        let mut handler = handler();
        let response = respond(&mut handler, json!({ "id": 1, "method": "tools/list" }));
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 13);
        for tool in &tools {
            assert!(!tool["name"].as_str().unwrap().is_empty());
            assert!(!tool["description"].as_str().unwrap().is_empty());
            assert!(tool["inputSchema"].is_object());
        }
    }

    #[test]
    fn test_tools_call_envelope() {
        let mut handler = handler();
        let response = respond(
            &mut handler,
            json!({ "id": 9, "method": "tools/call", "params": { "name": "debugger_status" } }),
        );
        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["type"], "text");
        assert_eq!(result["isError"], false);
        let status: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(status["debugger_running"], true);

        let response = respond(
            &mut handler,
            json!({ "id": 10, "method": "tools/call", "params": { "name": "nope" } }),
        );
        assert_eq!(response.result.unwrap()["isError"], true);
        assert!(response.error.is_none());
    }

    #[test]
    fn test_jsonrpc_member_is_not_checked() {
        let mut handler = handler();
        assert_eq!(
            handler.handle(json!({ "jsonrpc": 2, "method": "notifications/initialized" })),
            SessionReply::Accepted
        );

        let response = respond(&mut handler, json!({ "jsonrpc": 2, "id": 5, "method": "ping" }));
        assert_eq!(response.id, json!(5));
        assert_eq!(response.result, Some(json!({})));
        assert!(response.error.is_none());

        let response = respond(&mut handler, json!({ "jsonrpc": ["1.0"], "id": "q", "method": "tools/list" }));
        assert_eq!(response.id, json!("q"));
        assert!(response.result.is_some());
    }

    #[test]
    fn test_non_object_message() {
        let mut handler = handler();
        let response = respond(&mut handler, json!([1, 2, 3]));
        assert_eq!(response.id, json!(0));
        assert_eq!(response.error.unwrap().code, codes::INVALID_REQUEST);
    }
}
