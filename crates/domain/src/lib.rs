//! Storyforge Domain — pure game-state types, the structured-response
//! validator, and the core-state movement gate. No I/O, no clock, no
//! randomness: every type and function here is a plain value transformation,
//! grounded on the teacher's hexagonal-purity rule for its own domain crate
//! ("RNG is now injected via closure").

pub mod core_state;
pub mod game_state;
pub mod ids;
pub mod response;

pub use core_state::{ConversationEntry, ConversationRole, CoreState, ValidationIssue};
pub use game_state::{
    AdventureOutline, AgentMessage, GameMetadata, GameState, Inventory, MediaCacheEntry,
    StepMetadata, ToolCall,
};
pub use ids::{GameId, IdParseError, SessionId, UserId};
pub use response::{
    ActionTaken, Direction, Exit, ExitState, GameScene, MusicMood, ParseError, ParseErrorKind,
    SimpleResponse, StructuredResponse,
};
