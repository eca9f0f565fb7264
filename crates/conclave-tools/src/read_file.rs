//! `read_file` — read a file from the session sandbox, optionally by line range.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::{ConclaveError, Result};
use conclave_sandbox::SandboxManager;

use crate::registry::{ensure_known_keys, Tool, ToolCallParams, ToolOutcome};

/// Characters returned before the response is truncated, to avoid flooding
/// the context window with a single huge file.
const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct ReadFileTool {
    sandbox: Arc<SandboxManager>,
}

impl ReadFileTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Optionally limit to a line range with \
         `offset` (1-based first line) and `limit` (number of lines to return)."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file, relative to a sandbox root."},
                "offset": {"type": "integer", "description": "1-based line number to start reading from (optional)."},
                "limit": {"type": "integer", "description": "Maximum number of lines to return (optional)."}
            },
            "required": ["path"]
        })
    }

    async fn call(&self, args: serde_json::Value, _params: &ToolCallParams) -> Result<ToolOutcome> {
        ensure_known_keys("read_file", &args, &["path", "offset", "limit"])?;
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConclaveError::BadRequest("read_file: missing 'path'".into()))?;

        let bytes = self.sandbox.read_file(path)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();

        let offset = args.get("offset").and_then(|v| v.as_u64()).map(|v| v.saturating_sub(1) as usize);
        let limit = args.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

        let mut text = if offset.is_some() || limit.is_some() {
            let start = offset.unwrap_or(0);
            let lines: Vec<&str> = content.lines().skip(start).collect();
            let lines = if let Some(n) = limit { &lines[..n.min(lines.len())] } else { &lines[..] };
            lines.join("\n")
        } else {
            content
        };

        let truncated = text.len() > MAX_OUTPUT_CHARS;
        if truncated {
            text.truncate(MAX_OUTPUT_CHARS);
            text.push_str(&format!("\n\n[output truncated at {MAX_OUTPUT_CHARS} characters]"));
        }

        Ok(ToolOutcome::value(serde_json::json!({"content": text, "truncated": truncated})))
    }
}
