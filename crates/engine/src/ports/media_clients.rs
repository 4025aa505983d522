//! `TTSClient`, `ImageClient`, `MusicClient` SPIs (spec §6, component C1).
//! Concrete provider APIs are out of scope; only these abstract ports are
//! consumed.

use async_trait::async_trait;

use super::error::{AudioError, ImageGenError, MusicGenError};

#[async_trait]
pub trait TtsClient: Send + Sync {
    /// Synthesize `text` to base64-encoded audio using `voice`.
    async fn synthesize_to_base64(&self, text: &str, voice: &str) -> Result<String, AudioError>;
}

#[async_trait]
pub trait ImageClient: Send + Sync {
    /// Generate a scene image for `prompt` in the given art `style`,
    /// returning base64-encoded image bytes.
    async fn generate_scene(
        &self,
        prompt: &str,
        style: &str,
        game_id: Option<&str>,
        location_id: Option<&str>,
    ) -> Result<String, ImageGenError>;
}

#[async_trait]
pub trait MusicClient: Send + Sync {
    fn is_available(&self) -> bool;

    /// Generate ambient music for `mood`, returning base64-encoded audio.
    async fn generate(
        &self,
        mood: &str,
        context: &str,
        game_id: Option<&str>,
        location_id: Option<&str>,
    ) -> Result<String, MusicGenError>;
}
