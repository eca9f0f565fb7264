//! Shell tools: `run_shell_command`, `poll_shell_command`, `kill_shell_command`.
//!
//! All three delegate to the session's `SandboxManager`, which owns the
//! safety pre-check, output truncation, and `shell_jobs` persistence for
//! anything run in the background.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::{ConclaveError, Result};
use conclave_sandbox::{ExecOptions, JobId, SandboxManager};

use crate::registry::{ensure_known_keys, Tool, ToolCallParams, ToolOutcome};

pub struct RunShellCommandTool {
    sandbox: Arc<SandboxManager>,
}

impl RunShellCommandTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for RunShellCommandTool {
    fn name(&self) -> &str {
        "run_shell_command"
    }

    fn description(&self) -> &str {
        "Run a shell command inside the session sandbox. With `background: true`, \
         returns a job_id immediately; poll it with poll_shell_command."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command line to execute."},
                "timeout_secs": {"type": "integer", "description": "Timeout in seconds for foreground execution (default 30, capped at 300)."},
                "background": {"type": "boolean", "description": "Run detached and return a job_id instead of waiting (default false)."}
            },
            "required": ["command"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn call(&self, args: serde_json::Value, params: &ToolCallParams) -> Result<ToolOutcome> {
        ensure_known_keys("run_shell_command", &args, &["command", "timeout_secs", "background"])?;
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConclaveError::BadRequest("run_shell_command: missing 'command'".into()))?;
        let background = args.get("background").and_then(|v| v.as_bool()).unwrap_or(false);

        if background {
            let job_id = self.sandbox.exec_background(&params.session_id, command).await?;
            return Ok(ToolOutcome::value(serde_json::json!({"job_id": job_id.as_str()})));
        }

        let mut options = ExecOptions::default();
        if let Some(secs) = args.get("timeout_secs").and_then(|v| v.as_u64()) {
            options.timeout_secs = secs;
        }
        let result = self.sandbox.exec(command, options).await?;
        Ok(ToolOutcome::value(serde_json::to_value(result)?))
    }
}

pub struct PollShellCommandTool {
    sandbox: Arc<SandboxManager>,
}

impl PollShellCommandTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for PollShellCommandTool {
    fn name(&self) -> &str {
        "poll_shell_command"
    }

    fn description(&self) -> &str {
        "Check the status of a background shell command started with run_shell_command."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "job_id": {"type": "string", "description": "Job id returned by run_shell_command."}
            },
            "required": ["job_id"]
        })
    }

    async fn call(&self, args: serde_json::Value, _params: &ToolCallParams) -> Result<ToolOutcome> {
        ensure_known_keys("poll_shell_command", &args, &["job_id"])?;
        let job_id = args
            .get("job_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConclaveError::BadRequest("poll_shell_command: missing 'job_id'".into()))?;

        let job = self.sandbox.job_status(&JobId::from(job_id))?;
        Ok(ToolOutcome::value(serde_json::to_value(job)?))
    }
}

pub struct KillShellCommandTool {
    sandbox: Arc<SandboxManager>,
}

impl KillShellCommandTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for KillShellCommandTool {
    fn name(&self) -> &str {
        "kill_shell_command"
    }

    fn description(&self) -> &str {
        "Terminate a running background shell command."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "job_id": {"type": "string", "description": "Job id returned by run_shell_command."}
            },
            "required": ["job_id"]
        })
    }

    async fn call(&self, args: serde_json::Value, _params: &ToolCallParams) -> Result<ToolOutcome> {
        ensure_known_keys("kill_shell_command", &args, &["job_id"])?;
        let job_id = args
            .get("job_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConclaveError::BadRequest("kill_shell_command: missing 'job_id'".into()))?;

        self.sandbox.job_kill(&JobId::from(job_id))?;
        Ok(ToolOutcome::value(serde_json::json!({"job_id": job_id, "status": "killed"})))
    }
}
