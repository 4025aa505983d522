//! Storyforge Engine — the AI-driven interactive fiction backend (spec §1).
//!
//! Module map (spec §6 component crosswalk, see `SPEC_FULL.md`):
//! - [`ports`] — SPI traits (C1)
//! - [`stream_parser`] — streaming response parser (C3)
//! - [`agent`] — tool registry + tool-call orchestrator (C4/C5)
//! - [`game_engine`] — façade composing everything (C7)
//! - [`media`] — content-addressed media cache + prompt planner (C8/C9)
//! - [`persistence`] — step-based save/load engine (C10)
//! - [`session`] — websocket session registry (C11)
//! - [`ws`] — websocket transport (C12)
//!
//! The structured-response model/validator (C2) and core-state movement
//! gate (C6) live in `storyforge_domain`, since they are pure value
//! transformations with no dependency on any of the above.

pub mod adapters;
pub mod agent;
pub mod config;
pub mod error;
pub mod game_engine;
pub mod http;
pub mod media;
pub mod persistence;
pub mod ports;
pub mod session;
pub mod state;
pub mod stream_parser;
pub mod ws;

pub use error::EngineError;
pub use game_engine::{GameEngine, TurnOutcome};
