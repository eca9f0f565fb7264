//! `subagent` — delegate a self-contained task to a nested model run.
//!
//! The tool itself knows nothing about LLM providers; the Turn engine wires
//! in a `SubagentRunner` that drives a nested generation cycle (its own
//! prompt, its own tool loop, no access to the parent session's branch) and
//! returns the final text.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::{ConclaveError, Result};

use crate::registry::{ensure_known_keys, Tool, ToolCallParams, ToolOutcome};

#[async_trait]
pub trait SubagentRunner: Send + Sync {
    async fn run(&self, task: &str) -> Result<String>;
}

pub struct SubagentTool {
    runner: Arc<dyn SubagentRunner>,
}

impl SubagentTool {
    pub fn new(runner: Arc<dyn SubagentRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for SubagentTool {
    fn name(&self) -> &str {
        "subagent"
    }

    fn description(&self) -> &str {
        "Delegate a self-contained task to a nested model run and return its final answer."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {"type": "string", "description": "Description of the task for the subagent to complete."}
            },
            "required": ["task"]
        })
    }

    async fn call(&self, args: serde_json::Value, _params: &ToolCallParams) -> Result<ToolOutcome> {
        ensure_known_keys("subagent", &args, &["task"])?;
        let task = args
            .get("task")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConclaveError::BadRequest("subagent: missing 'task'".into()))?;

        let answer = self.runner.run(task).await?;
        Ok(ToolOutcome::value(serde_json::json!({"answer": answer})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoRunner;

    #[async_trait]
    impl SubagentRunner for EchoRunner {
        async fn run(&self, task: &str) -> Result<String> {
            Ok(format!("done: {task}"))
        }
    }

    #[tokio::test]
    async fn subagent_returns_runner_output() {
        let tool = SubagentTool::new(Arc::new(EchoRunner));
        let out = tool
            .call(serde_json::json!({"task": "summarize README"}), &ToolCallParams::default())
            .await
            .unwrap();
        assert_eq!(out.value["answer"], "done: summarize README");
    }
}
