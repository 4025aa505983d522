//! SPI abstractions (spec §6, component C1): narrow ports to externals so
//! the orchestrator, media planner, and façade are testable against fakes
//! without a live LLM/TTS/image/music provider.

pub mod clock_rng;
pub mod error;
pub mod llm;
pub mod media_clients;

pub use clock_rng::{Clock, Rng, SystemClock, SystemRng};
pub use error::{AudioError, ImageGenError, LlmError, MusicGenError};
pub use llm::{LlmClient, LlmCompletion, StreamEvent, ToolDefinition};
pub use media_clients::{ImageClient, MusicClient, TtsClient};
