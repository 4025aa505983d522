//! Storyforge Protocol — wire-format DTOs shared between the engine and any
//! client. Intentionally free of business logic so the transport layer stays
//! thin and stable, mirroring the teacher's `wrldbldr-shared` split.

pub mod ws;

pub use ws::{ClientMessage, ConversationEntryDto, GameSummaryDto, ServerMessage};
