//! Tool registry and built-in tools (C4).

pub mod generate_image;
pub mod list_directory;
pub mod read_file;
pub mod registry;
pub mod shell;
pub mod subagent;
pub mod web_fetch;
pub mod write_file;
pub mod write_todo;

pub use generate_image::{GenerateImageTool, ImageGenerator};
pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use registry::{ensure_known_keys, Tool, ToolCallParams, ToolDefinition, ToolOutcome, ToolRegistry};
pub use shell::{KillShellCommandTool, PollShellCommandTool, RunShellCommandTool};
pub use subagent::{SubagentRunner, SubagentTool};
pub use web_fetch::WebFetchTool;
pub use write_file::WriteFileTool;
pub use write_todo::WriteTodoTool;

use std::sync::Arc;

use conclave_blob::BlobStore;
use conclave_sandbox::SandboxManager;

/// Assemble the built-in tool catalog for one session. MCP-federated tools
/// are registered separately by the server surface as connections come up.
pub fn build_builtin_tools(
    sandbox: Arc<SandboxManager>,
    blobs: Arc<BlobStore>,
    subagent_runner: Arc<dyn SubagentRunner>,
    image_generator: Arc<dyn ImageGenerator>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ListDirectoryTool::new(sandbox.clone())));
    registry.register(Arc::new(ReadFileTool::new(sandbox.clone())));
    registry.register(Arc::new(WriteFileTool::new(sandbox.clone())));
    registry.register(Arc::new(WebFetchTool::new()));
    registry.register(Arc::new(RunShellCommandTool::new(sandbox.clone())));
    registry.register(Arc::new(PollShellCommandTool::new(sandbox.clone())));
    registry.register(Arc::new(KillShellCommandTool::new(sandbox)));
    registry.register(Arc::new(WriteTodoTool));
    registry.register(Arc::new(SubagentTool::new(subagent_runner)));
    registry.register(Arc::new(GenerateImageTool::new(image_generator, blobs)));
    registry
}
