//! Wire/disk-format data model (spec §3): the per-step snapshot, step/game
//! metadata, the adventure outline, and the LLM-facing agent transcript.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_state::CoreState;

/// Immutable per-game design document, produced once at game creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdventureOutline {
    pub title: String,
    #[serde(default)]
    pub tagline: Option<String>,
    pub main_quest: String,
    #[serde(default)]
    pub sub_quests: Vec<String>,
    pub key_locations: Vec<String>,
    pub important_items: Vec<String>,
    pub key_characters: Vec<String>,
    pub adventure_arc: String,
    #[serde(default)]
    pub special_mechanics: Option<String>,
}

/// A single message in the LLM-facing transcript (spec §3 `AgentMessage`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum AgentMessage {
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    System {
        content: String,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl AgentMessage {
    /// §4.3 tool-call loop postcondition: an assistant message with both
    /// empty/absent content and no tool calls must never be constructed (or
    /// must be filtered before the next LLM call).
    pub fn is_empty_assistant(&self) -> bool {
        matches!(
            self,
            AgentMessage::Assistant { content, tool_calls }
                if content.as_deref().map(str::is_empty).unwrap_or(true) && tool_calls.is_empty()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Ordered multiset of item identifiers (permits duplicates).
pub type Inventory = Vec<String>;

/// A generated image or music entry, content-addressed by the media cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaCacheEntry {
    pub relative_path: String,
    pub description: String,
    pub generated_at: DateTime<Utc>,
}

/// Full per-step snapshot (spec §3 `GameState`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: String,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub art_style: Option<String>,
    #[serde(default)]
    pub outline: Option<AdventureOutline>,
    #[serde(flatten)]
    pub core: CoreState,
    pub inventory: Inventory,
    pub agent_messages: Vec<AgentMessage>,
    pub media_cache: BTreeMap<String, MediaCacheEntry>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_played: DateTime<Utc>,
    pub total_play_time_secs: u64,
    #[serde(default)]
    pub adventure_title: Option<String>,
}

/// Per-step metadata (spec §3 `StepMetadata`), the commit marker for a step
/// directory — see [`crate::step_layout`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetadata {
    pub game_id: String,
    pub step_number: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_command: Option<String>,
    pub response_length: usize,
    pub tool_call_count: usize,
    pub message_count: usize,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

/// `game.json` (spec §3 `GameMetadata`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMetadata {
    pub game_id: String,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub art_style: Option<String>,
    #[serde(default)]
    pub adventure_title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_saved: DateTime<Utc>,
    pub last_played: DateTime<Utc>,
    pub total_play_time_secs: u64,
    pub current_step: u32,
    pub total_steps: u32,
}

impl GameMetadata {
    pub fn invariant_holds(&self) -> bool {
        self.current_step <= self.total_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_assistant_message_is_detected() {
        let msg = AgentMessage::Assistant {
            content: None,
            tool_calls: vec![],
        };
        assert!(msg.is_empty_assistant());

        let msg_with_content = AgentMessage::Assistant {
            content: Some("hi".into()),
            tool_calls: vec![],
        };
        assert!(!msg_with_content.is_empty_assistant());

        let msg_with_tool = AgentMessage::Assistant {
            content: None,
            tool_calls: vec![ToolCall {
                id: "1".into(),
                name: "add_inventory_item".into(),
                arguments: serde_json::json!({}),
            }],
        };
        assert!(!msg_with_tool.is_empty_assistant());
    }

    #[test]
    fn game_metadata_invariant() {
        let now = Utc::now();
        let meta = GameMetadata {
            game_id: "game-00000001".into(),
            theme: None,
            art_style: None,
            adventure_title: None,
            created_at: now,
            last_saved: now,
            last_played: now,
            total_play_time_secs: 0,
            current_step: 3,
            total_steps: 3,
        };
        assert!(meta.invariant_holds());
    }
}
