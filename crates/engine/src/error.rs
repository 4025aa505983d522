//! Aggregate error type (spec §7) composing the per-subsystem errors from
//! the domain parser, the SPI ports, persistence, and the agent loop into a
//! single type the façade and websocket layer can match on.

use thiserror::Error;

use crate::agent::tools::ToolError;
use crate::persistence::PersistenceError;
use crate::ports::{AudioError, ImageGenError, LlmError, MusicGenError};
use storyforge_domain::ParseError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("failed to parse structured response: {0}")]
    Parse(#[from] ParseError),

    #[error("tool execution error: {0}")]
    Tool(#[from] ToolError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("image generation error: {0}")]
    Image(#[from] ImageGenError),

    #[error("music generation error: {0}")]
    Music(#[from] MusicGenError),

    #[error("game not found: {0}")]
    GameNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("a command is already in flight for this session")]
    CommandInFlight,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
