//! `write_file` — write content to a file in the session sandbox.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::{ConclaveError, Result};
use conclave_sandbox::SandboxManager;

use crate::registry::{ensure_known_keys, Tool, ToolCallParams, ToolOutcome};

pub struct WriteFileTool {
    sandbox: Arc<SandboxManager>,
}

impl WriteFileTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates parent directories if they do not exist. \
         Overwrites the file atomically if it already exists."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to write to, relative to a sandbox root."},
                "content": {"type": "string", "description": "Text content to write into the file."}
            },
            "required": ["path", "content"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn call(&self, args: serde_json::Value, _params: &ToolCallParams) -> Result<ToolOutcome> {
        ensure_known_keys("write_file", &args, &["path", "content"])?;
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConclaveError::BadRequest("write_file: missing 'path'".into()))?;
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConclaveError::BadRequest("write_file: missing 'content'".into()))?;

        self.sandbox.write_file(path, content.as_bytes())?;

        Ok(ToolOutcome::value(serde_json::json!({
            "path": path,
            "bytes_written": content.len(),
        })))
    }
}
