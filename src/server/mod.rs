//! MCP server: JSON-RPC method dispatch shared by the transports

mod http;
mod stdio;

pub use http::{router as http_router, serve_http};
pub use stdio::serve_stdio;

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::clients::{ClientFactory, ClientManager, HttpClientFactory};
use crate::config::Config;
use crate::error::rpc_codes;
use crate::handler::HandlerFactory;
use crate::protocol::{
    Info, InitializeResult, JsonRpcResponse, PROTOCOL_VERSION, RequestId, ServerCapabilities,
    ToolsCallParams, ToolsCapability, ToolsListResult, negotiate_version, parse_request,
};
use crate::routers::Routers;
use crate::schema::SchemaRegistry;
use crate::Result;

const INSTRUCTIONS: &str = "Tools for the DatoCMS Content Management API. Each tool takes \
{action, args}; args always include apiToken and optionally environment. Responses are JSON \
envelopes {success, data, message, error, meta}.";

/// A tools-only MCP server over the DatoCMS resource routers
pub struct McpServer {
    routers: Routers,
    schemas: Arc<SchemaRegistry>,
    clients: Arc<ClientManager>,
}

impl McpServer {
    /// Build the server with clients created by `factory`
    #[must_use]
    pub fn new(factory: Arc<dyn ClientFactory>, max_cached: usize, always_trace: bool) -> Self {
        let clients = Arc::new(ClientManager::new(factory, max_cached));
        let schemas = Arc::new(SchemaRegistry::new());
        let handlers = HandlerFactory::new(Arc::clone(&clients), Arc::clone(&schemas), always_trace);
        let routers = Routers::build(&handlers);
        info!(
            tools = routers.iter().count(),
            schemas = schemas.len(),
            "Routers ready"
        );
        Self {
            routers,
            schemas,
            clients,
        }
    }

    /// Build the server against the real CMA
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let factory = HttpClientFactory::new(config.cma.clone())?;
        Ok(Self::new(
            Arc::new(factory),
            config.clients.max_cached,
            config.debug.enabled,
        ))
    }

    /// The resource routers
    #[must_use]
    pub fn routers(&self) -> &Routers {
        &self.routers
    }

    /// Registered argument schemas
    #[must_use]
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    /// The client cache
    #[must_use]
    pub fn clients(&self) -> &Arc<ClientManager> {
        &self.clients
    }

    /// Handle one raw JSON-RPC line; `None` when no reply is due
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(line) {
            Ok(message) => self.handle_message(&message).await,
            Err(e) => Some(JsonRpcResponse::error(
                None,
                rpc_codes::PARSE_ERROR,
                format!("Parse error: {e}"),
            )),
        }
    }

    /// Handle one JSON-RPC message; `None` for notifications
    pub async fn handle_message(&self, message: &Value) -> Option<JsonRpcResponse> {
        let request = match parse_request(message) {
            Ok(request) => request,
            Err(response) => return Some(response),
        };
        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification");
            return None;
        };

        debug!(method = %request.method, id = %id, "Request");
        let response = match request.method.as_str() {
            "initialize" => self.initialize(id, request.params.as_ref()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.tools_list(id),
            "tools/call" => self.tools_call(id, request.params.as_ref()).await,
            method if method.starts_with("notifications/") => return None,
            method => JsonRpcResponse::error(
                Some(id),
                rpc_codes::METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            ),
        };
        Some(response)
    }

    fn initialize(&self, id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);
        let version = negotiate_version(requested);
        info!(requested, version, "Client initialized");

        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: Info {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("DatoCMS".to_string()),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        };
        to_response(id, &result)
    }

    fn tools_list(&self, id: RequestId) -> JsonRpcResponse {
        to_response(
            id,
            &ToolsListResult {
                tools: self.routers.tools(),
            },
        )
    }

    async fn tools_call(&self, id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let call = ToolsCallParams::from_params(params);
        let Some(router) = self.routers.get(&call.name) else {
            warn!(tool = %call.name, "Unknown tool");
            return JsonRpcResponse::error(
                Some(id),
                rpc_codes::INVALID_PARAMS,
                format!("Unknown tool: {}", call.name),
            );
        };
        let envelope = router.call(call.arguments).await;
        to_response(id, &envelope.render())
    }
}

fn to_response<T: serde::Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(Some(id), rpc_codes::INTERNAL_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticFactory;
    use pretty_assertions::assert_eq;

    fn server() -> McpServer {
        McpServer::new(
            Arc::new(StaticFactory::listing(vec![json!({"id": "1", "name": "Admin"})])),
            8,
            false,
        )
    }

    #[tokio::test]
    async fn initialize_negotiates_the_version() {
        let response = server()
            .handle_message(&json!({
                "jsonrpc": "2.0", "id": 1, "method": "initialize",
                "params": {"protocolVersion": "2024-11-05"}
            }))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let reply = server()
            .handle_message(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let response = server()
            .handle_message(&json!({"jsonrpc": "2.0", "id": "a", "method": "resources/list"}))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, rpc_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let response = server().handle_line("{not json").await.unwrap();
        assert_eq!(response.error.unwrap().code, rpc_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn tools_list_returns_every_router() {
        let response = server()
            .handle_message(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
            .await
            .unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 7);
    }

    #[tokio::test]
    async fn failed_operations_are_tool_errors_not_rpc_errors() {
        // GIVEN: a call missing its required apiToken
        let response = server()
            .handle_message(&json!({
                "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                "params": {"name": "datocms_roles", "arguments": {"action": "list_roles", "args": {}}}
            }))
            .await
            .unwrap();

        // THEN: the JSON-RPC call succeeds and the result is flagged
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        let envelope: Value = serde_json::from_str(text).unwrap();
        assert_eq!(envelope["success"], false);
        assert_eq!(envelope["meta"]["error_kind"], "validation");
    }

    #[tokio::test]
    async fn tools_call_runs_the_action() {
        let response = server()
            .handle_message(&json!({
                "jsonrpc": "2.0", "id": 4, "method": "tools/call",
                "params": {"name": "datocms_roles", "arguments": {"action": "list_roles", "args": {"apiToken": "t"}}}
            }))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        let envelope: Value =
            serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(envelope["message"], "Found 1 role(s).");
        assert_eq!(envelope["data"][0]["name"], "Admin");
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let response = server()
            .handle_message(&json!({
                "jsonrpc": "2.0", "id": 5, "method": "tools/call",
                "params": {"name": "datocms_nope", "arguments": {}}
            }))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, rpc_codes::INVALID_PARAMS);
    }
}
