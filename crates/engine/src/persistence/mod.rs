//! Step-based persistence engine (spec §4.6, component C10): append-only,
//! step-numbered game saves with `metadata.json` as the atomic commit
//! marker, plus one-time migration of the teacher's legacy single-file save
//! format.
//!
//! Grounded on the teacher's `infrastructure::persistence::file_store`
//! (write-temp-then-rename idiom, `games/<id>/game.json` layout),
//! generalized from one flat save file per game to the spec's per-step
//! directory tree.

pub mod layout;

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use storyforge_domain::{GameMetadata, GameState, StepMetadata, StructuredResponse, ToolCall};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("game {0:?} not found")]
    GameNotFound(String),
    #[error("game {game_id:?} has no committed steps")]
    NoCommittedSteps { game_id: String },
    #[error("step {step} of game {game_id:?} not found or not committed")]
    StepNotFound { game_id: String, step: u32 },
}

/// A fully loaded step: `state.json` and `metadata.json`, plus the
/// `response.txt` narration and (if it parsed) the structured response from
/// `response.json` (spec §4.6 `loadStep`).
pub struct LoadedStep {
    pub state: GameState,
    pub metadata: StepMetadata,
    pub response_text: String,
    pub response: Option<StructuredResponse>,
}

pub struct PersistenceEngine {
    base_dir: std::path::PathBuf,
}

impl PersistenceEngine {
    pub fn new(base_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Writes one step's body files, then `metadata.json` last so a reader
    /// never observes a half-written step as committed. Also updates
    /// `game.json` with the new `current_step`/`total_steps`/timestamps.
    #[allow(clippy::too_many_arguments)]
    pub fn save_step(
        &self,
        game_id: &str,
        step_number: u32,
        state: &GameState,
        step_metadata: &StepMetadata,
        response_text: &str,
        response: &StructuredResponse,
    ) -> Result<(), PersistenceError> {
        let dir = layout::step_dir(&self.base_dir, game_id, step_number);
        fs::create_dir_all(&dir)?;

        write_json_atomic(&layout::state_path(&dir), state)?;
        if let Some(command) = &step_metadata.user_command {
            fs::write(layout::command_path(&dir), command)?;
        }
        fs::write(layout::response_text_path(&dir), response_text)?;
        write_json_atomic(&layout::response_json_path(&dir), &response.to_persisted_json())?;
        write_json_atomic(&layout::messages_path(&dir), &state.agent_messages)?;

        let tool_calls = collect_tool_calls(state);
        if !tool_calls.is_empty() {
            write_json_atomic(&layout::tool_calls_path(&dir), &tool_calls)?;
        }
        if step_number == 1 {
            if let Some(outline) = &state.outline {
                write_json_atomic(&layout::outline_path(&dir), outline)?;
            }
        }

        // Commit marker, written last.
        write_json_atomic(&layout::step_metadata_path(&dir), step_metadata)?;

        self.update_game_metadata(game_id, state, step_number)?;
        debug!(game_id, step_number, "step committed");
        Ok(())
    }

    fn update_game_metadata(
        &self,
        game_id: &str,
        state: &GameState,
        step_number: u32,
    ) -> Result<(), PersistenceError> {
        let path = layout::game_metadata_path(&self.base_dir, game_id);
        let mut metadata = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str::<GameMetadata>(&raw)?
        } else {
            GameMetadata {
                game_id: game_id.to_string(),
                theme: state.theme.clone(),
                art_style: state.art_style.clone(),
                adventure_title: state.adventure_title.clone(),
                created_at: state.created_at,
                last_saved: state.last_played,
                last_played: state.last_played,
                total_play_time_secs: state.total_play_time_secs,
                current_step: 0,
                total_steps: 0,
            }
        };

        metadata.adventure_title = state.adventure_title.clone();
        metadata.last_saved = state.last_played;
        metadata.last_played = state.last_played;
        metadata.total_play_time_secs = state.total_play_time_secs;
        metadata.current_step = step_number;
        metadata.total_steps = metadata.total_steps.max(step_number);
        debug_assert!(metadata.invariant_holds());

        write_json_atomic(&path, &metadata)
    }

    /// Loads the most recent *committed* step (the highest-numbered step
    /// directory that has a `metadata.json`).
    pub fn load_latest(&self, game_id: &str) -> Result<LoadedStep, PersistenceError> {
        let latest = self
            .committed_step_numbers(game_id)?
            .into_iter()
            .max()
            .ok_or_else(|| PersistenceError::NoCommittedSteps {
                game_id: game_id.to_string(),
            })?;
        self.load_step(game_id, latest)
    }

    /// `loadStep` (spec §4.6): reads `metadata.json`, `state.json`,
    /// `response.txt`, then the optional `response.json`. A `response.json`
    /// that fails to parse back into a known response shape degrades to
    /// `response: None` with a warning rather than failing the whole load.
    pub fn load_step(&self, game_id: &str, step_number: u32) -> Result<LoadedStep, PersistenceError> {
        let dir = layout::step_dir(&self.base_dir, game_id, step_number);
        let metadata_path = layout::step_metadata_path(&dir);
        if !metadata_path.exists() {
            return Err(PersistenceError::StepNotFound {
                game_id: game_id.to_string(),
                step: step_number,
            });
        }
        let state: GameState = serde_json::from_str(&fs::read_to_string(layout::state_path(&dir))?)?;
        let metadata: StepMetadata = serde_json::from_str(&fs::read_to_string(metadata_path)?)?;
        let response_text = fs::read_to_string(layout::response_text_path(&dir))?;

        let response = match fs::read_to_string(layout::response_json_path(&dir)) {
            Ok(raw) => match serde_json::from_str::<serde_json::Value>(&raw)
                .ok()
                .and_then(|value| StructuredResponse::from_persisted_json(&value))
            {
                Some(response) => Some(response),
                None => {
                    warn!(game_id, step_number, "response.json present but did not parse, dropping it");
                    None
                }
            },
            Err(_) => None,
        };

        Ok(LoadedStep {
            state,
            metadata,
            response_text,
            response,
        })
    }

    /// Every step number whose directory has a commit-marking `metadata.json`.
    fn committed_step_numbers(&self, game_id: &str) -> Result<Vec<u32>, PersistenceError> {
        let dir = layout::game_dir(&self.base_dir, game_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut steps = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(step_number) = layout::parse_step_dir_name(&name) else {
                continue;
            };
            if layout::step_metadata_path(&entry.path()).exists() {
                steps.push(step_number);
            } else {
                warn!(game_id, step_number, "skipping uncommitted (torn) step directory");
            }
        }
        Ok(steps)
    }

    pub fn list_games(&self) -> Result<Vec<GameMetadata>, PersistenceError> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut games = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let metadata_path = entry.path().join("game.json");
            if !metadata_path.exists() {
                continue;
            }
            let raw = fs::read_to_string(&metadata_path)?;
            match serde_json::from_str::<GameMetadata>(&raw) {
                Ok(metadata) => games.push(metadata),
                Err(e) => warn!(error = %e, path = %metadata_path.display(), "skipping game with unreadable metadata"),
            }
        }
        games.sort_by(|a, b| b.last_played.cmp(&a.last_played));
        Ok(games)
    }

    pub fn delete_game(&self, game_id: &str) -> Result<(), PersistenceError> {
        let dir = layout::game_dir(&self.base_dir, game_id);
        if !dir.exists() {
            return Err(PersistenceError::GameNotFound(game_id.to_string()));
        }
        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    /// One-time migration of the teacher's legacy flat `<game_id>.json` save
    /// format into step 1 of the new layout, when no steps have been
    /// committed for `game_id` yet.
    pub fn migrate_legacy_single_file(
        &self,
        game_id: &str,
        legacy_path: &Path,
    ) -> Result<(), PersistenceError> {
        if !self.committed_step_numbers(game_id)?.is_empty() {
            debug!(game_id, "legacy save already migrated, skipping");
            return Ok(());
        }
        let raw = fs::read_to_string(legacy_path)?;
        let state: GameState = serde_json::from_str(&raw)?;
        let response = legacy_response(&state);
        let response_text = response.narration_text().to_string();
        let step_metadata = StepMetadata {
            game_id: game_id.to_string(),
            step_number: 1,
            timestamp: state.last_played,
            user_command: None,
            response_length: response_text.len(),
            tool_call_count: collect_tool_calls(&state).len(),
            message_count: state.agent_messages.len(),
            success: true,
            error: None,
            execution_time_ms: 0,
        };
        self.save_step(game_id, 1, &state, &step_metadata, &response_text, &response)?;
        fs::remove_file(legacy_path)?;
        Ok(())
    }
}

/// Best-effort reconstruction of a response for legacy saves that predate
/// `response.json`: prefers the last persisted scene, falling back to a
/// generic simple response over the last assistant narration line.
fn legacy_response(state: &GameState) -> StructuredResponse {
    if let Some(scene) = &state.core.current_scene {
        return StructuredResponse::Scene(scene.clone());
    }
    let narration = state
        .core
        .conversation_history
        .iter()
        .rev()
        .find(|entry| entry.role == storyforge_domain::ConversationRole::Assistant)
        .map(|entry| entry.content.clone())
        .unwrap_or_default();
    StructuredResponse::Simple(storyforge_domain::SimpleResponse {
        location_id: String::new(),
        action_taken: storyforge_domain::ActionTaken::Other,
        narration_text: narration,
    })
}

fn collect_tool_calls(state: &GameState) -> Vec<ToolCall> {
    state
        .agent_messages
        .iter()
        .filter_map(|message| match message {
            storyforge_domain::AgentMessage::Assistant { tool_calls, .. } => Some(tool_calls),
            _ => None,
        })
        .flatten()
        .cloned()
        .collect()
}

fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use storyforge_domain::{ActionTaken, CoreState, SimpleResponse};

    fn sample_state(game_id: &str) -> GameState {
        GameState {
            game_id: game_id.to_string(),
            theme: Some("gothic horror".into()),
            art_style: Some("ink wash".into()),
            outline: None,
            core: CoreState::new(),
            inventory: vec![],
            agent_messages: vec![],
            media_cache: BTreeMap::new(),
            system_prompt: None,
            created_at: Utc::now(),
            last_played: Utc::now(),
            total_play_time_secs: 0,
            adventure_title: Some("The Sunken Keep".into()),
        }
    }

    fn sample_step_metadata(game_id: &str, step: u32) -> StepMetadata {
        StepMetadata {
            game_id: game_id.to_string(),
            step_number: step,
            timestamp: Utc::now(),
            user_command: if step == 1 { None } else { Some("look".into()) },
            response_length: 42,
            tool_call_count: 0,
            message_count: 2,
            success: true,
            error: None,
            execution_time_ms: 10,
        }
    }

    fn sample_response() -> StructuredResponse {
        StructuredResponse::Simple(SimpleResponse {
            location_id: "hall".into(),
            action_taken: ActionTaken::Examine,
            narration_text: "You inspect the dusty bookshelf.".into(),
        })
    }

    #[test]
    fn save_then_load_latest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PersistenceEngine::new(dir.path());
        let game_id = "game-00000001";
        engine
            .save_step(
                game_id,
                1,
                &sample_state(game_id),
                &sample_step_metadata(game_id, 1),
                "You stand at the gate.",
                &sample_response(),
            )
            .unwrap();
        engine
            .save_step(
                game_id,
                2,
                &sample_state(game_id),
                &sample_step_metadata(game_id, 2),
                "You inspect the dusty bookshelf.",
                &sample_response(),
            )
            .unwrap();

        let loaded = engine.load_latest(game_id).unwrap();
        assert_eq!(loaded.metadata.step_number, 2);
        assert_eq!(loaded.response_text, "You inspect the dusty bookshelf.");
        assert!(loaded.response.is_some());

        let dir_2 = layout::step_dir(dir.path(), game_id, 2);
        assert!(dir_2.join("response.txt").exists());
        assert!(dir_2.join("response.json").exists());
        assert!(dir_2.join("messages.json").exists());
        assert!(dir_2.join("command.txt").exists());
        assert!(!layout::step_dir(dir.path(), game_id, 1).join("command.txt").exists());

        let game_metadata_path = layout::game_metadata_path(dir.path(), game_id);
        let game_metadata: GameMetadata =
            serde_json::from_str(&fs::read_to_string(game_metadata_path).unwrap()).unwrap();
        assert_eq!(game_metadata.current_step, 2);
        assert!(game_metadata.invariant_holds());
    }

    #[test]
    fn outline_is_only_written_on_step_one() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PersistenceEngine::new(dir.path());
        let game_id = "game-00000004";
        let mut state = sample_state(game_id);
        state.outline = Some(storyforge_domain::AdventureOutline {
            title: "The Sunken Keep".into(),
            tagline: Some("Dive deep, rise rich or not at all".into()),
            main_quest: "Recover the drowned crown".into(),
            sub_quests: vec![],
            key_locations: vec![],
            important_items: vec![],
            key_characters: vec![],
            adventure_arc: "three-act descent".into(),
            special_mechanics: None,
        });
        engine
            .save_step(game_id, 1, &state, &sample_step_metadata(game_id, 1), "intro", &sample_response())
            .unwrap();
        engine
            .save_step(game_id, 2, &state, &sample_step_metadata(game_id, 2), "more", &sample_response())
            .unwrap();
        assert!(layout::step_dir(dir.path(), game_id, 1).join("outline.json").exists());
        assert!(!layout::step_dir(dir.path(), game_id, 2).join("outline.json").exists());
    }

    #[test]
    fn unparseable_response_json_degrades_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PersistenceEngine::new(dir.path());
        let game_id = "game-00000005";
        engine
            .save_step(game_id, 1, &sample_state(game_id), &sample_step_metadata(game_id, 1), "intro", &sample_response())
            .unwrap();
        let step_dir = layout::step_dir(dir.path(), game_id, 1);
        fs::write(layout::response_json_path(&step_dir), r#"{"type":"not-a-real-type"}"#).unwrap();

        let loaded = engine.load_step(game_id, 1).unwrap();
        assert!(loaded.response.is_none());
        assert_eq!(loaded.response_text, "intro");
    }

    #[test]
    fn torn_step_without_metadata_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PersistenceEngine::new(dir.path());
        let game_id = "game-00000002";
        engine
            .save_step(game_id, 1, &sample_state(game_id), &sample_step_metadata(game_id, 1), "intro", &sample_response())
            .unwrap();

        // Simulate a crash mid-write: state.json exists, metadata.json does not.
        let torn_dir = layout::step_dir(dir.path(), game_id, 2);
        fs::create_dir_all(&torn_dir).unwrap();
        fs::write(layout::state_path(&torn_dir), "{}").unwrap();

        let loaded = engine.load_latest(game_id).unwrap();
        assert_eq!(loaded.metadata.step_number, 1);
    }

    #[test]
    fn load_latest_with_no_steps_errors() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PersistenceEngine::new(dir.path());
        let err = engine.load_latest("game-missing").unwrap_err();
        assert!(matches!(err, PersistenceError::NoCommittedSteps { .. }));
    }

    #[test]
    fn delete_game_removes_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PersistenceEngine::new(dir.path());
        let game_id = "game-00000003";
        engine
            .save_step(game_id, 1, &sample_state(game_id), &sample_step_metadata(game_id, 1), "intro", &sample_response())
            .unwrap();
        engine.delete_game(game_id).unwrap();
        assert!(engine.load_latest(game_id).is_err());
    }

    #[test]
    fn migrate_legacy_single_file_creates_step_one() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PersistenceEngine::new(dir.path());
        let game_id = "game-legacy01";
        let legacy_path = dir.path().join("legacy.json");
        fs::write(&legacy_path, serde_json::to_string(&sample_state(game_id)).unwrap()).unwrap();

        engine.migrate_legacy_single_file(game_id, &legacy_path).unwrap();
        let loaded = engine.load_latest(game_id).unwrap();
        assert_eq!(loaded.metadata.step_number, 1);
        assert!(!legacy_path.exists());
    }

    #[test]
    fn list_games_sorts_by_last_played_descending() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PersistenceEngine::new(dir.path());
        engine
            .save_step(
                "game-a",
                1,
                &sample_state("game-a"),
                &sample_step_metadata("game-a", 1),
                "intro",
                &sample_response(),
            )
            .unwrap();
        engine
            .save_step(
                "game-b",
                1,
                &sample_state("game-b"),
                &sample_step_metadata("game-b", 1),
                "intro",
                &sample_response(),
            )
            .unwrap();
        let games = engine.list_games().unwrap();
        assert_eq!(games.len(), 2);
    }
}
