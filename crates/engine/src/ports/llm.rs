//! `LLMClient` SPI (spec §6, component C1) — the only LLM surface the
//! orchestrator consumes. Concrete provider wire protocols are out of scope
//! (spec §1); this is the abstract port a provider adapter implements.

use async_trait::async_trait;
use storyforge_domain::{AgentMessage, ToolCall};
use tokio::sync::mpsc;

use super::error::LlmError;

/// A callable tool the LLM may invoke (spec §4.3 C4).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Result of a non-streaming `complete` call.
#[derive(Debug, Clone, Default)]
pub struct LlmCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// One fragment of a streamed completion, forwarded over a channel per the
/// actor/channel pattern spec §9 recommends for ownership languages.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A narration/content token.
    Content(String),
    /// A fragment of a tool call being assembled (provider-dependent
    /// chunking; the adapter is responsible for reassembly into a complete
    /// `ToolCall` by the time `stream_complete` resolves).
    ToolCallFragment,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Drive one non-streaming completion over the given conversation.
    async fn complete(
        &self,
        conversation: &[AgentMessage],
        tools: &[ToolDefinition],
    ) -> Result<LlmCompletion, LlmError>;

    /// Drive one streaming completion, forwarding chunks over `sink` as they
    /// arrive and resolving to the fully assembled completion once the
    /// provider signals end-of-turn.
    async fn stream_complete(
        &self,
        conversation: &[AgentMessage],
        tools: &[ToolDefinition],
        sink: mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<LlmCompletion, LlmError>;
}
