//! `write_todo` — record the model's running task list.
//!
//! The list itself is not persisted server-side beyond the function_call/
//! function_response pair already written to the message DAG; the tool's
//! job is just to validate shape and echo it back as the model's working
//! plan for this turn.

use async_trait::async_trait;
use conclave_core::{ConclaveError, Result};

use crate::registry::{ensure_known_keys, Tool, ToolCallParams, ToolOutcome};

const VALID_STATUSES: &[&str] = &["pending", "in_progress", "completed"];

pub struct WriteTodoTool;

#[async_trait]
impl Tool for WriteTodoTool {
    fn name(&self) -> &str {
        "write_todo"
    }

    fn description(&self) -> &str {
        "Record the current task list for this turn, so progress stays visible across steps."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "content": {"type": "string"},
                            "status": {"type": "string", "enum": VALID_STATUSES}
                        },
                        "required": ["content", "status"]
                    }
                }
            },
            "required": ["items"]
        })
    }

    async fn call(&self, args: serde_json::Value, _params: &ToolCallParams) -> Result<ToolOutcome> {
        ensure_known_keys("write_todo", &args, &["items"])?;
        let items = args
            .get("items")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ConclaveError::BadRequest("write_todo: missing 'items'".into()))?;

        for item in items {
            let status = item
                .get("status")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ConclaveError::BadRequest("write_todo: item missing 'status'".into()))?;
            if !VALID_STATUSES.contains(&status) {
                return Err(ConclaveError::BadRequest(format!("write_todo: invalid status '{status}'")));
            }
            if item.get("content").and_then(|v| v.as_str()).is_none() {
                return Err(ConclaveError::BadRequest("write_todo: item missing 'content'".into()));
            }
        }

        Ok(ToolOutcome::value(serde_json::json!({"items": items, "count": items.len()})))
    }
}
