//! Unconfigured SPI adapters (ambient stack, not spec scope): concrete
//! provider wire protocols are explicitly out of scope (spec §1), but
//! [`crate::state::AppState::new`] still needs *something* implementing
//! each port to boot. These adapters fail every call with a clear
//! configuration error instead of leaving `main` unable to start at all;
//! wiring a real HTTP-backed adapter in their place is future work (see
//! `DESIGN.md`).

use async_trait::async_trait;
use storyforge_domain::AgentMessage;
use tokio::sync::mpsc;

use crate::ports::error::{AudioError, ImageGenError, LlmError, MusicGenError};
use crate::ports::{ImageClient, LlmClient, LlmCompletion, MusicClient, StreamEvent, ToolDefinition, TtsClient};

#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredLlm;

#[async_trait]
impl LlmClient for UnconfiguredLlm {
    async fn complete(&self, _conversation: &[AgentMessage], _tools: &[ToolDefinition]) -> Result<LlmCompletion, LlmError> {
        Err(LlmError::RequestFailed("no LlmClient adapter configured".to_string()))
    }

    async fn stream_complete(
        &self,
        _conversation: &[AgentMessage],
        _tools: &[ToolDefinition],
        _sink: mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<LlmCompletion, LlmError> {
        Err(LlmError::RequestFailed("no LlmClient adapter configured".to_string()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredTts;

#[async_trait]
impl TtsClient for UnconfiguredTts {
    async fn synthesize_to_base64(&self, _text: &str, _voice: &str) -> Result<String, AudioError> {
        Err(AudioError::SynthesisFailed("no TtsClient adapter configured".to_string()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredImage;

#[async_trait]
impl ImageClient for UnconfiguredImage {
    async fn generate_scene(
        &self,
        _prompt: &str,
        _style: &str,
        _game_id: Option<&str>,
        _location_id: Option<&str>,
    ) -> Result<String, ImageGenError> {
        Err(ImageGenError::Unavailable)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredMusic;

#[async_trait]
impl MusicClient for UnconfiguredMusic {
    fn is_available(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        _mood: &str,
        _context: &str,
        _game_id: Option<&str>,
        _location_id: Option<&str>,
    ) -> Result<String, MusicGenError> {
        Err(MusicGenError::Unavailable)
    }
}
