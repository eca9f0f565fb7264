//! `list_directory` — bounded tree listing under the session sandbox.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::Result;
use conclave_sandbox::SandboxManager;

use crate::registry::{ensure_known_keys, Tool, ToolCallParams, ToolOutcome};

const DEFAULT_MAX_ENTRIES: usize = 500;

pub struct ListDirectoryTool {
    sandbox: Arc<SandboxManager>,
}

impl ListDirectoryTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and subdirectories under a path inside the session sandbox, as a bounded tree."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to list, relative to a sandbox root."},
                "max_entries": {"type": "integer", "description": "Upper bound on entries returned before the tree is marked truncated."}
            },
            "required": ["path"]
        })
    }

    async fn call(&self, args: serde_json::Value, _params: &ToolCallParams) -> Result<ToolOutcome> {
        ensure_known_keys("list_directory", &args, &["path", "max_entries"])?;
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| conclave_core::ConclaveError::BadRequest("list_directory: missing 'path'".into()))?;
        let max_entries = args
            .get("max_entries")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_ENTRIES);

        let tree = self.sandbox.list_directory(path, max_entries)?;
        Ok(ToolOutcome::value(serde_json::to_value(tree)?))
    }
}
