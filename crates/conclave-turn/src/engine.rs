//! Turn engine (C6): drives one generation cycle per turn across the
//! public operations (start-new-session-and-send, send, confirm, edit,
//! retry, error-retry), per §4.7.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{error, warn};

use conclave_core::config::MAX_TOOL_LOOP_ITERATIONS;
use conclave_core::{ConclaveError, MessageType, Result};
use conclave_llm::{GenerateRequest, LlmProvider, Part, ThinkingLevel};
use conclave_sessions::SessionManager;
use conclave_sse::{EventType, SseEvent, SseHub, Subscriber};
use conclave_store::{FileAttachment, Message, MessageStore};
use conclave_tools::{ImageGenerator, SubagentRunner, ToolCallParams};

use crate::compact;
use crate::prompt::{build_prompt, TurnInfo};
use crate::sandbox_registry::SandboxRegistry;

/// Outcome of a single generation cycle, used by callers (and tests) to
/// decide what happened without re-parsing SSE events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Complete,
    PendingConfirmation,
    Error(String),
}

pub struct TurnEngine {
    sessions: Arc<SessionManager>,
    messages: Arc<MessageStore>,
    sandboxes: Arc<SandboxRegistry>,
    hub: Arc<SseHub>,
    providers: HashMap<&'static str, Arc<dyn LlmProvider>>,
    subagent_runner: Arc<dyn SubagentRunner>,
    image_generator: Arc<dyn ImageGenerator>,
    blobs: Arc<conclave_blob::BlobStore>,
    context_budget_chars: usize,
    summarizer_model: String,
    title_model: String,
}

impl TurnEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionManager>,
        messages: Arc<MessageStore>,
        sandboxes: Arc<SandboxRegistry>,
        hub: Arc<SseHub>,
        providers: HashMap<&'static str, Arc<dyn LlmProvider>>,
        subagent_runner: Arc<dyn SubagentRunner>,
        image_generator: Arc<dyn ImageGenerator>,
        blobs: Arc<conclave_blob::BlobStore>,
        context_budget_chars: usize,
        summarizer_model: String,
        title_model: String,
    ) -> Self {
        Self {
            sessions,
            messages,
            sandboxes,
            hub,
            providers,
            subagent_runner,
            image_generator,
            blobs,
            context_budget_chars,
            summarizer_model,
            title_model,
        }
    }

    fn provider_for_model(&self, model: &str) -> Result<Arc<dyn LlmProvider>> {
        let family = provider_family(model);
        self.providers
            .get(family)
            .cloned()
            .ok_or_else(|| ConclaveError::BadRequest(format!("no provider configured for model '{model}'")))
    }

    /// Create a new session (and its initial branch), then send the first
    /// message on it.
    pub async fn start_new_session_and_send(
        &self,
        system_prompt: &str,
        workspace_id: &str,
        model: &str,
        text: &str,
        attachments: Vec<FileAttachment>,
    ) -> Result<(String, i64, Subscriber)> {
        let (session_id, branch_id) = self.sessions.create_session(system_prompt, workspace_id)?;
        let subscriber = self.send(&session_id, branch_id, model, text, attachments).await?;
        Ok((session_id, branch_id, subscriber))
    }

    /// Send a new user message on an existing branch and run the generation
    /// cycle to completion (or until it parks on a confirmation / errors).
    pub async fn send(
        &self,
        session_id: &str,
        branch_id: i64,
        model: &str,
        text: &str,
        attachments: Vec<FileAttachment>,
    ) -> Result<Subscriber> {
        self.run_cycle(session_id, branch_id, model, Some((text.to_string(), attachments))).await
    }

    /// Resume a branch parked on `pending_confirmation`. `confirmed = false`
    /// records a denial and lets the model see it; `true` executes the tool.
    pub async fn confirm(
        &self,
        session_id: &str,
        branch_id: i64,
        confirmed: bool,
        modified_data: Option<serde_json::Value>,
    ) -> Result<Subscriber> {
        let branch = self.sessions.get_branch(branch_id)?;
        let payload = branch
            .pending_confirmation
            .ok_or_else(|| ConclaveError::BadRequest("branch has no pending confirmation".to_string()))?;
        let call: PendingCall = serde_json::from_str(&payload)
            .map_err(|e| ConclaveError::Corrupt(format!("pending_confirmation payload: {e}")))?;

        let guard = self
            .sessions
            .acquire_branch_lock(branch_id)
            .map_err(|_| ConclaveError::Conflict(format!("branch {branch_id} is already streaming")))?;
        self.sessions.set_pending_confirmation(branch_id, None)?;

        let result = if confirmed {
            let mut args = call.args.clone();
            if let (Some(modified), Some(obj)) = (modified_data, args.as_object_mut()) {
                if let Some(modified_obj) = modified.as_object() {
                    for (k, v) in modified_obj {
                        obj.insert(k.clone(), v.clone());
                    }
                }
            }
            let env_roots = self.sessions.get_session_env(session_id)?;
            // Acquired and released again around `generation_cycle`'s own handle below;
            // the branch lock already rules out a concurrent acquire on this session.
            let sandbox = self.sandboxes.acquire(session_id, &env_roots)?;
            let tools = conclave_tools::build_builtin_tools(
                sandbox.clone(),
                self.blobs.clone(),
                self.subagent_runner.clone(),
                self.image_generator.clone(),
            );
            let result = self.execute_tool_call(branch_id, session_id, &call.name, args, &tools, &call.model, true).await;
            self.sandboxes.release(session_id);
            result
        } else {
            let text = serde_json::json!({"response": {"status": "denied"}, "attachments": Vec::<FileAttachment>::new()}).to_string();
            self.messages
                .append_message(branch_id, MessageType::FunctionResponse, &text, &[], Some(&call.model), 0)
                .map(|id| {
                    self.hub.broadcast(branch_id, SseEvent::new(EventType::FunctionResponse, format!("{id}\n{}\n{text}", call.name)));
                })
                .map_err(ConclaveError::from)
        };

        if let Err(e) = result {
            error!(branch_id, error = %e, "failed to execute confirmed tool call");
            self.messages.append_message(branch_id, MessageType::ModelError, &e.to_string(), &[], None, 0)?;
            self.hub.broadcast(branch_id, SseEvent::new(EventType::Error, e.to_string()));
            drop(guard);
            return Err(e);
        }

        self.continue_cycle(session_id, branch_id, model_or_default(&call.model), guard).await
    }

    /// Fork a new branch at the message preceding `message_id`, replace it
    /// with `new_text`, and run the generation cycle on the new branch.
    pub async fn edit(
        &self,
        session_id: &str,
        branch_id: i64,
        message_id: i64,
        model: &str,
        new_text: &str,
        attachments: Vec<FileAttachment>,
    ) -> Result<(i64, Subscriber)> {
        let edited = self.messages.get_message(message_id)?;
        let new_branch_id = self.sessions.fork_branch(session_id, branch_id, edited.parent_message_id)?;
        let subscriber = self.run_cycle(session_id, new_branch_id, model, Some((new_text.to_string(), attachments))).await?;
        Ok((new_branch_id, subscriber))
    }

    /// Fork a new branch that ends just before the last assistant turn and
    /// regenerate a response to the same user message.
    pub async fn retry(&self, session_id: &str, branch_id: i64, model: &str) -> Result<(i64, Subscriber)> {
        let last_user_id = self.last_curated_user_message_id(branch_id)?;
        let new_branch_id = self.sessions.fork_branch(session_id, branch_id, Some(last_user_id))?;
        let subscriber = self.run_cycle(session_id, new_branch_id, model, None).await?;
        Ok((new_branch_id, subscriber))
    }

    /// Re-run the generation cycle on the same branch after a terminal
    /// error, without forking or appending a new user message.
    pub async fn error_retry(&self, session_id: &str, branch_id: i64, model: &str) -> Result<Subscriber> {
        self.run_cycle(session_id, branch_id, model, None).await
    }

    fn last_curated_user_message_id(&self, branch_id: i64) -> Result<i64> {
        let curated = self.load_curated(branch_id)?;
        curated
            .iter()
            .rev()
            .find(|m| m.message_type == MessageType::User)
            .map(|m| m.id)
            .ok_or_else(|| ConclaveError::BadRequest("branch has no user message to retry".to_string()))
    }

    fn load_curated(&self, branch_id: i64) -> Result<Vec<Message>> {
        let page = self.messages.get_history(branch_id, None, 10_000)?;
        let mut msgs = page.messages;
        msgs.reverse();
        Ok(msgs.into_iter().filter(|m| m.message_type.curated() && m.indexed).collect())
    }

    /// Acquire the branch lock, optionally persist `new_user`, attach an SSE
    /// subscriber, and spawn the generation cycle. Returns the subscriber so
    /// the caller (HTTP surface) can stream events back to the client.
    async fn run_cycle(
        &self,
        session_id: &str,
        branch_id: i64,
        model: &str,
        new_user: Option<(String, Vec<FileAttachment>)>,
    ) -> Result<Subscriber> {
        let guard = self
            .sessions
            .acquire_branch_lock(branch_id)
            .map_err(|_| ConclaveError::Conflict(format!("branch {branch_id} is already streaming")))?;

        let subscriber = self.hub.attach(branch_id);

        if let Some((text, attachments)) = new_user {
            let provider = self.provider_for_model(model)?;
            let curated = self.load_curated(branch_id)?;
            match compact::maybe_compact(&self.messages, provider.as_ref(), &self.summarizer_model, branch_id, &curated, self.context_budget_chars).await {
                Ok(_) => {}
                Err(e) => warn!(branch_id, error = %e, "compaction attempt failed, continuing uncompacted"),
            }

            let message_id = self.messages.append_message(branch_id, MessageType::User, &text, &attachments, None, 0)?;
            self.hub.broadcast(branch_id, SseEvent::new(EventType::Ack, message_id.to_string()));
        }

        let session_id = session_id.to_string();
        let model = model.to_string();
        let engine = self.clone_handles();
        tokio::spawn(async move {
            let terminal = engine.generation_cycle(&session_id, branch_id, &model).await;
            engine.finish_turn(&session_id, branch_id, terminal).await;
            drop(guard);
        });

        Ok(subscriber)
    }

    /// Resume the tool loop after a confirmation was granted/denied, reusing
    /// the already-acquired branch lock.
    async fn continue_cycle(
        &self,
        session_id: &str,
        branch_id: i64,
        model: &str,
        guard: conclave_sessions::BranchLockGuard,
    ) -> Result<Subscriber> {
        let subscriber = self.hub.attach(branch_id);
        let session_id = session_id.to_string();
        let model = model.to_string();
        let engine = self.clone_handles();
        tokio::spawn(async move {
            let terminal = engine.generation_cycle(&session_id, branch_id, &model).await;
            engine.finish_turn(&session_id, branch_id, terminal).await;
            drop(guard);
        });
        Ok(subscriber)
    }

    /// Shallow clone of the handles needed inside a spawned task. `Arc`
    /// fields are cheap to clone; the engine itself is never mutated after
    /// construction.
    fn clone_handles(&self) -> Arc<Self> {
        Arc::new(Self {
            sessions: self.sessions.clone(),
            messages: self.messages.clone(),
            sandboxes: self.sandboxes.clone(),
            hub: self.hub.clone(),
            providers: self.providers.clone(),
            subagent_runner: self.subagent_runner.clone(),
            image_generator: self.image_generator.clone(),
            blobs: self.blobs.clone(),
            context_budget_chars: self.context_budget_chars,
            summarizer_model: self.summarizer_model.clone(),
            title_model: self.title_model.clone(),
        })
    }

    async fn finish_turn(&self, session_id: &str, branch_id: i64, terminal: Terminal) {
        match terminal {
            Terminal::Complete => {
                self.hub.broadcast(branch_id, SseEvent::empty(EventType::Complete));
                self.maybe_infer_session_name(session_id, branch_id).await;
            }
            Terminal::PendingConfirmation => {
                // `P` was already emitted at the point the gate was hit.
            }
            Terminal::Error(message) => {
                self.hub.broadcast(branch_id, SseEvent::new(EventType::Error, message));
            }
        }
        self.sandboxes.release(session_id);
    }

    async fn maybe_infer_session_name(&self, session_id: &str, branch_id: i64) {
        let Ok(session) = self.sessions.get_session(session_id) else { return };
        if !session.name.is_empty() {
            return;
        }
        let Ok(Some(last_text)) = self.last_model_text(branch_id) else { return };
        let Ok(provider) = self.provider_for_model(&self.title_model) else { return };

        let req = GenerateRequest {
            model: self.title_model.clone(),
            system_prompt: "Write a short title (under 6 words, no quotes, no trailing period) \
                summarizing the assistant's reply below."
                .to_string(),
            messages: vec![serde_json::json!({"role": "user", "content": last_text})],
            tools: Vec::new(),
            max_tokens: 32,
            thinking: None,
        };
        let Ok(mut stream) = provider.generate(&req).await else { return };
        let mut title = String::new();
        while let Some(part) = stream.next().await {
            if let Part::Text { text } = part {
                title.push_str(&text);
            }
        }
        let title = title.trim();
        if title.is_empty() {
            return;
        }
        if self.sessions.rename_session(session_id, title).is_ok() {
            self.hub.broadcast(branch_id, SseEvent::new(EventType::SessionName, format!("{session_id}\n{title}")));
        }
    }

    fn last_model_text(&self, branch_id: i64) -> Result<Option<String>> {
        let curated = self.load_curated(branch_id)?;
        Ok(curated.into_iter().rev().find(|m| m.message_type == MessageType::Model).map(|m| m.text))
    }

    /// The core loop: build prompt + curated history, call the provider,
    /// persist and emit each `Part`, execute any resulting tool calls, and
    /// loop until the model stops calling tools, parks on a confirmation, or
    /// errors.
    async fn generation_cycle(&self, session_id: &str, branch_id: i64, model: &str) -> Terminal {
        let session = match self.sessions.get_session(session_id) {
            Ok(s) => s,
            Err(e) => return Terminal::Error(e.to_string()),
        };
        let env_roots = match self.sessions.get_session_env(session_id) {
            Ok(r) => r,
            Err(e) => return Terminal::Error(e.to_string()),
        };
        let sandbox = match self.sandboxes.acquire(session_id, &env_roots) {
            Ok(s) => s,
            Err(e) => return Terminal::Error(e.to_string()),
        };
        let tools = conclave_tools::build_builtin_tools(
            sandbox.clone(),
            self.blobs.clone(),
            self.subagent_runner.clone(),
            self.image_generator.clone(),
        );
        let provider = match self.provider_for_model(model) {
            Ok(p) => p,
            Err(e) => return Terminal::Error(e.to_string()),
        };

        let mut iterations = 0usize;
        loop {
            iterations += 1;
            if iterations > MAX_TOOL_LOOP_ITERATIONS {
                let msg = "tool loop exceeded the maximum number of iterations".to_string();
                let _ = self.messages.append_message(branch_id, MessageType::ModelError, &msg, &[], None, 0);
                return Terminal::Error(msg);
            }

            let curated = match self.load_curated(branch_id) {
                Ok(c) => c,
                Err(e) => return Terminal::Error(e.to_string()),
            };

            let turn_info = TurnInfo {
                session_id: session_id.to_string(),
                generation: 0,
                timestamp: chrono::Utc::now().to_rfc3339(),
            };
            let system_prompt = build_prompt(&session.system_prompt, &env_roots, &turn_info);
            let is_gemini = provider_family(model) == "gemini";
            let messages_payload = build_provider_messages(&curated, is_gemini);
            let tool_defs: Vec<conclave_llm::ToolDefinition> = tools
                .definitions()
                .into_iter()
                .map(|d| conclave_llm::ToolDefinition { name: d.name, description: d.description, input_schema: d.input_schema })
                .collect();

            let req = GenerateRequest {
                model: model.to_string(),
                system_prompt: system_prompt.to_plain_text(),
                messages: messages_payload,
                tools: tool_defs,
                max_tokens: 8192,
                thinking: Some(ThinkingLevel::Medium),
            };

            let mut stream = match provider.generate(&req).await {
                Ok(s) => s,
                Err(e) => {
                    let err: ConclaveError = e.into();
                    let _ = self.messages.append_message(branch_id, MessageType::ModelError, &err.to_string(), &[], None, 0);
                    return Terminal::Error(err.to_string());
                }
            };

            let mut text_message_id: Option<i64> = None;
            let mut thought_message_id: Option<i64> = None;
            let mut made_function_call = false;
            let mut pending: Option<Terminal> = None;

            while let Some(part) = stream.next().await {
                match part {
                    Part::Text { text } => {
                        thought_message_id = None;
                        match text_message_id {
                            Some(id) => {
                                if self.messages.append_text(id, &text).is_err() {
                                    continue;
                                }
                            }
                            None => match self.messages.append_message(branch_id, MessageType::Model, &text, &[], Some(model), 0) {
                                Ok(id) => text_message_id = Some(id),
                                Err(e) => {
                                    pending = Some(Terminal::Error(e.to_string()));
                                    break;
                                }
                            },
                        }
                        if let Some(id) = text_message_id {
                            self.hub.broadcast(branch_id, SseEvent::new(EventType::ModelText, format!("{id}\n{text}")));
                        }
                    }
                    Part::Thought { text } => {
                        text_message_id = None;
                        match thought_message_id {
                            Some(id) => {
                                let _ = self.messages.append_text(id, &text);
                            }
                            None => match self.messages.append_message(branch_id, MessageType::Thought, &text, &[], Some(model), 0) {
                                Ok(id) => thought_message_id = Some(id),
                                Err(e) => {
                                    pending = Some(Terminal::Error(e.to_string()));
                                    break;
                                }
                            },
                        }
                        if let Some(id) = thought_message_id {
                            self.hub.broadcast(branch_id, SseEvent::new(EventType::Thought, format!("{id}\n{text}")));
                        }
                    }
                    Part::FunctionCall { name, args } => {
                        text_message_id = None;
                        thought_message_id = None;
                        made_function_call = true;
                        let call_text = serde_json::json!({"name": name, "args": args}).to_string();
                        let call_id = match self.messages.append_message(branch_id, MessageType::FunctionCall, &call_text, &[], Some(model), 0) {
                            Ok(id) => id,
                            Err(e) => {
                                pending = Some(Terminal::Error(e.to_string()));
                                break;
                            }
                        };
                        self.hub.broadcast(
                            branch_id,
                            SseEvent::new(EventType::FunctionCall, format!("{call_id}\n{name}\n{args}")),
                        );

                        if tools.requires_confirmation(&name) {
                            let diff_preview = write_file_diff_preview(&sandbox, &name, &args);
                            let payload = PendingCall { name: name.clone(), args: args.clone(), model: model.to_string(), diff: diff_preview.clone() };
                            let serialized = serde_json::to_string(&payload).unwrap_or_default();
                            if self.sessions.set_pending_confirmation(branch_id, Some(&serialized)).is_err() {
                                pending = Some(Terminal::Error("failed to persist pending confirmation".to_string()));
                                break;
                            }
                            let event_payload = serde_json::json!({"name": name, "args": args, "diff": diff_preview}).to_string();
                            self.hub.broadcast(branch_id, SseEvent::new(EventType::PendingConfirmation, event_payload));
                            pending = Some(Terminal::PendingConfirmation);
                            break;
                        }

                        if let Err(e) = self
                            .execute_tool_call(branch_id, session_id, &name, args, &tools, model, true)
                            .await
                        {
                            pending = Some(Terminal::Error(e.to_string()));
                            break;
                        }
                    }
                    Part::FunctionResponse { .. } => {
                        // Providers never emit this on a generation path; it
                        // only appears in the messages the engine itself
                        // replays back to the model.
                    }
                    Part::InlineData { attachments } => {
                        let target = match text_message_id {
                            Some(id) => id,
                            None => match self.messages.append_message(branch_id, MessageType::Model, "", &[], Some(model), 0) {
                                Ok(id) => {
                                    text_message_id = Some(id);
                                    id
                                }
                                Err(e) => {
                                    pending = Some(Terminal::Error(e.to_string()));
                                    break;
                                }
                            },
                        };
                        for att in &attachments {
                            let _ = self.messages.append_attachment_ref(target, att);
                        }
                        let payload = serde_json::json!({"messageId": target, "attachments": attachments});
                        self.hub.broadcast(branch_id, SseEvent::new(EventType::InlineData, payload.to_string()));
                    }
                    Part::FinishReason { .. } => {
                        text_message_id = None;
                        thought_message_id = None;
                    }
                    Part::TokenCount { cumulative } => {
                        if let Some(id) = text_message_id.or(thought_message_id) {
                            let _ = self.messages.set_cumul_token_count(id, cumulative);
                            self.hub.broadcast(branch_id, SseEvent::new(EventType::CumulTokenCount, format!("{id}\n{cumulative}")));
                        }
                    }
                    Part::Error { message } => {
                        let _ = self.messages.append_message(branch_id, MessageType::ModelError, &message, &[], Some(model), 0);
                        pending = Some(Terminal::Error(message));
                        break;
                    }
                }
            }

            if let Some(terminal) = pending {
                return terminal;
            }
            if !made_function_call {
                return Terminal::Complete;
            }
            // A tool call executed inline; loop back to invoke the provider
            // again with the function_response appended to curated history.
        }
    }

    async fn execute_tool_call(
        &self,
        branch_id: i64,
        session_id: &str,
        name: &str,
        args: serde_json::Value,
        tools: &conclave_tools::ToolRegistry,
        model: &str,
        confirmation_received: bool,
    ) -> Result<()> {
        let params = ToolCallParams {
            session_id: session_id.to_string(),
            branch_id,
            model_name: model.to_string(),
            confirmation_received,
        };
        let response_value = match tools.call(name, args, &params).await {
            Ok(outcome) => {
                let response_text = serde_json::json!({"response": outcome.value, "attachments": outcome.attachments}).to_string();
                let id = self.messages.append_message(branch_id, MessageType::FunctionResponse, &response_text, &outcome.attachments, Some(model), 0)?;
                self.hub.broadcast(branch_id, SseEvent::new(EventType::FunctionResponse, format!("{id}\n{name}\n{response_text}")));
                return Ok(());
            }
            Err(e) => serde_json::json!({"error": e.to_string()}),
        };
        let text = serde_json::json!({"response": response_value, "attachments": Vec::<FileAttachment>::new()}).to_string();
        let id = self.messages.append_message(branch_id, MessageType::FunctionResponse, &text, &[], Some(model), 0)?;
        self.hub.broadcast(branch_id, SseEvent::new(EventType::FunctionResponse, format!("{id}\n{name}\n{text}")));
        Ok(())
    }
}

fn model_or_default(model: &str) -> &str {
    if model.is_empty() {
        "gemini-2.5-pro"
    } else {
        model
    }
}

pub fn provider_family(model: &str) -> &'static str {
    if model.starts_with("gemini") {
        "gemini"
    } else {
        "openai"
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct PendingCall {
    name: String,
    args: serde_json::Value,
    model: String,
    #[serde(default)]
    diff: Option<String>,
}

/// For a pending `write_file` call, render the unified diff between the
/// sandbox's current file contents and the proposed write, so the
/// confirmation UI can show the change instead of just the raw arguments.
/// A missing or unreadable source file is treated as empty (new file).
fn write_file_diff_preview(sandbox: &conclave_sandbox::SandboxManager, name: &str, args: &serde_json::Value) -> Option<String> {
    if name != "write_file" {
        return None;
    }
    let path = args.get("path")?.as_str()?;
    let new_content = args.get("content")?.as_str()?;
    let old_content = sandbox.read_file(path).map(|bytes| String::from_utf8_lossy(&bytes).into_owned()).unwrap_or_default();
    let rendered = crate::diff::diff(&old_content, new_content, path, 3);
    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

/// Render curated history into the wire shape each provider family expects:
/// Gemini's `{role, parts:[...]}` or OpenAI's `{role, content}` /
/// `{role, tool_calls}` / `{role: "tool", ...}`.
fn build_provider_messages(curated: &[Message], is_gemini: bool) -> Vec<serde_json::Value> {
    curated
        .iter()
        .map(|m| match m.message_type {
            MessageType::User => {
                if is_gemini {
                    serde_json::json!({"role": "user", "parts": [{"text": m.text}]})
                } else {
                    serde_json::json!({"role": "user", "content": m.text})
                }
            }
            MessageType::Model => {
                if is_gemini {
                    serde_json::json!({"role": "model", "parts": [{"text": m.text}]})
                } else {
                    serde_json::json!({"role": "assistant", "content": m.text})
                }
            }
            MessageType::Compression => {
                let note = format!("[Summary of earlier conversation]\n{}", m.text);
                if is_gemini {
                    serde_json::json!({"role": "user", "parts": [{"text": note}]})
                } else {
                    serde_json::json!({"role": "user", "content": note})
                }
            }
            MessageType::FunctionCall => {
                let call: serde_json::Value = serde_json::from_str(&m.text).unwrap_or(serde_json::Value::Null);
                let name = call.get("name").cloned().unwrap_or(serde_json::Value::Null);
                let args = call.get("args").cloned().unwrap_or(serde_json::Value::Null);
                if is_gemini {
                    serde_json::json!({"role": "model", "parts": [{"functionCall": {"name": name, "args": args}}]})
                } else {
                    serde_json::json!({
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{"id": m.id.to_string(), "type": "function", "function": {"name": name, "arguments": args.to_string()}}],
                    })
                }
            }
            MessageType::FunctionResponse => {
                let payload: serde_json::Value = serde_json::from_str(&m.text).unwrap_or(serde_json::Value::Null);
                if is_gemini {
                    serde_json::json!({"role": "function", "parts": [{"functionResponse": {"name": "tool", "response": payload}}]})
                } else {
                    serde_json::json!({"role": "tool", "tool_call_id": m.id.to_string(), "content": payload.to_string()})
                }
            }
            _ => serde_json::json!({"role": "user", "content": m.text}),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_sandbox::SandboxManager;

    fn sandbox() -> (tempfile::TempDir, SandboxManager) {
        let dir = tempfile::tempdir().unwrap();
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conclave_sandbox::db::init_db(&conn).unwrap();
        let mgr = SandboxManager::new(dir.path().to_path_buf(), Vec::new(), conn).unwrap();
        (dir, mgr)
    }

    #[test]
    fn write_file_diff_preview_shows_a_diff_against_existing_content() {
        let (_dir, mgr) = sandbox();
        mgr.write_file("notes.txt", b"line1\nline2\n").unwrap();
        let args = serde_json::json!({"path": "notes.txt", "content": "line1\nchanged\n"});
        let preview = write_file_diff_preview(&mgr, "write_file", &args).expect("diff present");
        assert!(preview.starts_with("--- a/notes.txt\n+++ b/notes.txt\n"));
        assert!(preview.contains("-line2"));
        assert!(preview.contains("+changed"));
    }

    #[test]
    fn write_file_diff_preview_treats_a_new_path_as_empty_old_file() {
        let (_dir, mgr) = sandbox();
        let args = serde_json::json!({"path": "new.txt", "content": "hello\n"});
        let preview = write_file_diff_preview(&mgr, "write_file", &args).expect("diff present");
        assert!(preview.contains("@@ -0,0"));
        assert!(preview.contains("+hello"));
    }

    #[test]
    fn write_file_diff_preview_is_none_for_other_tools() {
        let (_dir, mgr) = sandbox();
        let args = serde_json::json!({"command": "ls"});
        assert!(write_file_diff_preview(&mgr, "run_shell_command", &args).is_none());
    }

    #[test]
    fn write_file_diff_preview_is_none_when_content_is_unchanged() {
        let (_dir, mgr) = sandbox();
        mgr.write_file("same.txt", b"no change\n").unwrap();
        let args = serde_json::json!({"path": "same.txt", "content": "no change\n"});
        assert!(write_file_diff_preview(&mgr, "write_file", &args).is_none());
    }
}
