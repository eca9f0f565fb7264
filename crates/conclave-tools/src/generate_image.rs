//! `generate_image` — produce an image from a text prompt.
//!
//! Generation itself is delegated to an injected `ImageGenerator` (a
//! provider-specific image model); this tool's job is turning the raw bytes
//! into a content-addressed blob and a `FileAttachment` on the
//! function_response message.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_blob::BlobStore;
use conclave_core::{ConclaveError, Result};
use conclave_store::FileAttachment;

use crate::registry::{ensure_known_keys, Tool, ToolCallParams, ToolOutcome};

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns the raw image bytes and their MIME type.
    async fn generate(&self, prompt: &str) -> Result<(Vec<u8>, String)>;
}

pub struct GenerateImageTool {
    generator: Arc<dyn ImageGenerator>,
    blobs: Arc<BlobStore>,
}

impl GenerateImageTool {
    pub fn new(generator: Arc<dyn ImageGenerator>, blobs: Arc<BlobStore>) -> Self {
        Self { generator, blobs }
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}

#[async_trait]
impl Tool for GenerateImageTool {
    fn name(&self) -> &str {
        "generate_image"
    }

    fn description(&self) -> &str {
        "Generate an image from a text prompt and attach it to the conversation."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string", "description": "Description of the image to generate."}
            },
            "required": ["prompt"]
        })
    }

    async fn call(&self, args: serde_json::Value, _params: &ToolCallParams) -> Result<ToolOutcome> {
        ensure_known_keys("generate_image", &args, &["prompt"])?;
        let prompt = args
            .get("prompt")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConclaveError::BadRequest("generate_image: missing 'prompt'".into()))?;

        let (bytes, mime_type) = self.generator.generate(prompt).await?;
        let hash = self.blobs.put(&bytes)?;
        let attachment = FileAttachment {
            file_name: format!("generated.{}", extension_for(&mime_type)),
            mime_type,
            hash,
        };

        Ok(ToolOutcome::with_attachments(
            serde_json::json!({"generated": true}),
            vec![attachment],
        ))
    }
}
