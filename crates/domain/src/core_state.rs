//! Pure core engine state (spec §4.4, component C6) and the movement gate
//! (spec §4.1) that is the authoritative barrier against LLM-hallucinated
//! movement through locked/sealed passages.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::response::{ExitState, GameScene, StructuredResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: ConversationRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationEntry {
    pub fn new(role: ConversationRole, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now,
        }
    }
}

/// A non-fatal warning surfaced by [`CoreState::apply_response`] — movement
/// gate rejections, for example. Consumed once via `pop_validation_issues`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue(pub String);

/// Pure value holding the parts of game state that are mutated by a single,
/// well-defined rule per turn. Everything here is owned data — no I/O, no
/// clocks, no randomness — so it can be unit tested and replayed exactly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreState {
    pub current_scene: Option<GameScene>,
    pub visited_locations: HashSet<String>,
    pub conversation_history: Vec<ConversationEntry>,
    /// Mood of the last scene a music cue was generated for (spec §4.4
    /// `shouldGenerateBackgroundMusic`).
    pub last_music_mood: Option<crate::response::MusicMood>,
    #[serde(skip)]
    pending_issues: Vec<ValidationIssue>,
}

const SCENE_ENTRY_VOCABULARY: &[&str] = &[
    "you enter",
    "you arrive",
    "you step into",
    "you find yourself",
    "you walk into",
    "the door opens to reveal",
];

const MOOD_KEYWORDS: &[&str] = &[
    "battle", "ambush", "combat", "fight", "danger", "treasure", "victory", "peaceful",
];

impl CoreState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_user(&mut self, command: impl Into<String>, now: DateTime<Utc>) {
        self.conversation_history.push(ConversationEntry::new(
            ConversationRole::User,
            command,
            now,
        ));
    }

    /// Apply a parsed structured response, enforcing the movement gate for
    /// scene transitions (spec §4.1). Rejected transitions leave
    /// `current_scene` untouched and push a [`ValidationIssue`].
    pub fn apply_response(&mut self, response: &StructuredResponse, now: DateTime<Utc>) {
        match response {
            StructuredResponse::Scene(scene) => self.apply_scene(scene, now),
            StructuredResponse::Simple(simple) => {
                self.conversation_history.push(ConversationEntry::new(
                    ConversationRole::Assistant,
                    &simple.narration_text,
                    now,
                ));
            }
        }
    }

    fn apply_scene(&mut self, scene: &GameScene, now: DateTime<Utc>) {
        let is_transition = self
            .current_scene
            .as_ref()
            .map(|current| current.location_id != scene.location_id)
            .unwrap_or(false);

        if is_transition && !self.movement_allowed(&scene.location_id) {
            self.pending_issues.push(ValidationIssue(format!(
                "rejected transition to {:?}: no open exit from {:?} targets it (exit may be locked, closed, or sealed)",
                scene.location_id,
                self.current_scene.as_ref().map(|s| s.location_id.as_str()).unwrap_or("<none>"),
            )));
            // State unchanged: the turn is still recorded in the transcript so the
            // LLM can see its own (rejected) narration and self-correct.
            self.conversation_history.push(ConversationEntry::new(
                ConversationRole::Assistant,
                &scene.narration_text,
                now,
            ));
            return;
        }

        self.visited_locations.insert(scene.location_id.clone());
        self.current_scene = Some(scene.clone());
        self.conversation_history.push(ConversationEntry::new(
            ConversationRole::Assistant,
            &scene.narration_text,
            now,
        ));
    }

    /// True if the previous scene has no exits recorded, this is the very
    /// first scene, or the previous scene has an `open` exit targeting
    /// `target_location_id`.
    fn movement_allowed(&self, target_location_id: &str) -> bool {
        match &self.current_scene {
            None => true,
            Some(previous) => {
                if previous.exits.is_empty() {
                    return true;
                }
                previous.exits.iter().any(|exit| {
                    exit.state == ExitState::Open && exit.target_location_id == target_location_id
                })
            }
        }
    }

    /// Drain and return validation issues recorded since the last call.
    pub fn pop_validation_issues(&mut self) -> Vec<ValidationIssue> {
        std::mem::take(&mut self.pending_issues)
    }

    /// spec §4.4: true iff the response is a full scene, or the narration
    /// text uses scene-entry vocabulary while a current scene is defined.
    pub fn should_generate_scene_image(&self, response: &StructuredResponse) -> bool {
        match response {
            StructuredResponse::Scene(_) => true,
            StructuredResponse::Simple(simple) => {
                self.current_scene.is_some() && contains_any(&simple.narration_text, SCENE_ENTRY_VOCABULARY)
            }
        }
    }

    /// spec §4.4: true iff the scene's `musicMood` differs from the last
    /// generated mood, or the narration text contains a mood keyword.
    pub fn should_generate_background_music(&self, response: &StructuredResponse) -> bool {
        match response {
            StructuredResponse::Scene(scene) => {
                Some(scene.music_mood) != self.last_music_mood || contains_any(&scene.narration_text, MOOD_KEYWORDS)
            }
            StructuredResponse::Simple(simple) => contains_any(&simple.narration_text, MOOD_KEYWORDS),
        }
    }

    pub fn record_music_generated(&mut self, mood: crate::response::MusicMood) {
        self.last_music_mood = Some(mood);
    }
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    let lower = text.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}
