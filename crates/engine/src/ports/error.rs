//! SPI error kinds (spec §7 error taxonomy, the `LlmError`/`AudioGenerationError`/
//! `MediaGenerationError` rows).

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("LLM response was invalid: {0}")]
    InvalidResponse(String),
    #[error("LLM call timed out")]
    Timeout,
}

#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("TTS synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("TTS request timed out")]
    Timeout,
}

#[derive(Debug, Clone, Error)]
pub enum ImageGenError {
    #[error("image generation failed: {0}")]
    GenerationFailed(String),
    #[error("image provider unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, Error)]
pub enum MusicGenError {
    #[error("music generation failed: {0}")]
    GenerationFailed(String),
    #[error("music provider unavailable")]
    Unavailable,
}
