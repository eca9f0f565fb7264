//! Tool registry (C4): built-in + MCP-federated tool catalog and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::{ConclaveError, Result};
use conclave_store::FileAttachment;

/// Outcome of a single tool call: the JSON `function_response` payload plus
/// any files the tool produced (written back as attachments on the
/// function_response message).
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub value: serde_json::Value,
    pub attachments: Vec<FileAttachment>,
}

impl ToolOutcome {
    pub fn value(value: serde_json::Value) -> Self {
        Self { value, attachments: Vec::new() }
    }

    pub fn with_attachments(value: serde_json::Value, attachments: Vec<FileAttachment>) -> Self {
        Self { value, attachments }
    }
}

/// Per-call context threaded through to a tool's handler. Mirrors the
/// dispatch signature: `call(name, args, params) -> {value, attachments}`.
#[derive(Debug, Clone, Default)]
pub struct ToolCallParams {
    pub session_id: String,
    pub branch_id: i64,
    pub model_name: String,
    pub confirmation_received: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;

    /// Whether the Turn engine must park this call on `pending_confirmation`
    /// before executing it. Destructive or externally-visible tools return
    /// `true`; read-only and informational tools return `false`.
    fn requires_confirmation(&self) -> bool {
        false
    }

    async fn call(&self, args: serde_json::Value, params: &ToolCallParams) -> Result<ToolOutcome>;
}

/// Reject unknown argument keys up front so individual handlers don't have
/// to. `args` must be a JSON object; non-object args are left untouched
/// (handlers that expect an object will fail their own extraction).
pub fn ensure_known_keys(tool: &str, args: &serde_json::Value, allowed: &[&str]) -> Result<()> {
    let Some(obj) = args.as_object() else {
        return Ok(());
    };
    for key in obj.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(ConclaveError::BadRequest(format!("{tool}: unknown argument '{key}'")));
        }
    }
    Ok(())
}

/// Catalog of callable tools, keyed by their externally-visible name.
///
/// Built-ins are registered once at startup. MCP tools are federated per
/// enabled connection; a name collision with a built-in is resolved by
/// exposing the MCP tool as `"{server}__{tool}"`, with `mcp_routes` mapping
/// the exposed name back to `(server, original_name)` for callers that need
/// to route the call onward to the originating MCP connection.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    builtin_names: std::collections::HashSet<String>,
    mcp_routes: HashMap<String, (String, String)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            builtin_names: std::collections::HashSet::new(),
            mcp_routes: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.builtin_names.insert(name.clone());
        self.tools.insert(name, tool);
    }

    /// Federate a tool discovered on an MCP connection. Returns the name it
    /// was exposed under (identical to `tool_name` unless that collided with
    /// a built-in).
    pub fn register_mcp(&mut self, server: &str, tool_name: &str, tool: Arc<dyn Tool>) -> String {
        let exposed = if self.builtin_names.contains(tool_name) {
            format!("{server}__{tool_name}")
        } else {
            tool_name.to_string()
        };
        self.mcp_routes.insert(exposed.clone(), (server.to_string(), tool_name.to_string()));
        self.tools.insert(exposed.clone(), tool);
        exposed
    }

    /// Drop every tool federated from `server`, e.g. when its MCP connection
    /// is disabled or torn down.
    pub fn unregister_mcp_server(&mut self, server: &str) {
        let dead: Vec<String> = self
            .mcp_routes
            .iter()
            .filter(|(_, (s, _))| s == server)
            .map(|(exposed, _)| exposed.clone())
            .collect();
        for exposed in dead {
            self.mcp_routes.remove(&exposed);
            self.tools.remove(&exposed);
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolDefinition {
                name: name.clone(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    pub fn requires_confirmation(&self, name: &str) -> bool {
        self.tools.get(name).map(|t| t.requires_confirmation()).unwrap_or(false)
    }

    pub fn route_for(&self, exposed_name: &str) -> Option<&(String, String)> {
        self.mcp_routes.get(exposed_name)
    }

    pub async fn call(&self, name: &str, args: serde_json::Value, params: &ToolCallParams) -> Result<ToolOutcome> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ConclaveError::ToolError(format!("unknown tool: {name}")))?;
        tool.call(args, params).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, args: serde_json::Value, _params: &ToolCallParams) -> Result<ToolOutcome> {
            Ok(ToolOutcome::value(args))
        }
    }

    #[tokio::test]
    async fn mcp_tool_colliding_with_builtin_is_namespaced() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let exposed = reg.register_mcp("srv1", "echo", Arc::new(EchoTool));
        assert_eq!(exposed, "srv1__echo");
        assert!(reg.route_for("srv1__echo").is_some());
    }

    #[tokio::test]
    async fn non_colliding_mcp_tool_keeps_its_name() {
        let mut reg = ToolRegistry::new();
        let exposed = reg.register_mcp("srv1", "special_tool", Arc::new(EchoTool));
        assert_eq!(exposed, "special_tool");
    }

    #[test]
    fn ensure_known_keys_rejects_unexpected_argument() {
        let args = serde_json::json!({"path": "a", "bogus": 1});
        let err = ensure_known_keys("read_file", &args, &["path"]).unwrap_err();
        assert_eq!(err.code(), "bad-request");
    }

    #[tokio::test]
    async fn call_dispatches_to_registered_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let out = reg
            .call("echo", serde_json::json!({"x": 1}), &ToolCallParams::default())
            .await
            .unwrap();
        assert_eq!(out.value, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn unregister_mcp_server_drops_its_tools() {
        let mut reg = ToolRegistry::new();
        reg.register_mcp("srv1", "special_tool", Arc::new(EchoTool));
        reg.unregister_mcp_server("srv1");
        assert!(reg.route_for("special_tool").is_none());
        assert!(reg.call("special_tool", serde_json::json!({}), &ToolCallParams::default()).await.is_err());
    }
}
