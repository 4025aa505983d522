//! Engine façade (spec §4, component C7): the single entry point the
//! websocket layer drives. Composes the structured-response validator and
//! movement gate (domain crate), the tool-call orchestrator (C4/C5), the
//! media coordination layer (C8/C9), and the persistence engine (C10) behind
//! one coherent API, so `crate::ws` never touches any of those directly.
//!
//! Grounded on the teacher's `use_cases::game_engine::GameEngine` façade
//! (one struct holding every port plus the persistence store, exposing
//! `start_game`/`process_command`-shaped methods).

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{info, instrument};

use storyforge_domain::{
    AdventureOutline, AgentMessage, GameId, GameMetadata, GameState, MediaCacheEntry, StepMetadata,
    StructuredResponse, ValidationIssue,
};

use crate::agent::orchestrator;
use crate::error::EngineError;
use crate::media::{self, MediaCache};
use crate::persistence::PersistenceEngine;
use crate::ports::{Clock, ImageClient, LlmClient, MusicClient, Rng, TtsClient};

const OUTLINE_SYSTEM_PROMPT: &str = "You are the game master for a text adventure. Respond with ONLY a \
JSON object (no narration, no markdown fences) with these exact fields: title, tagline, main_quest, \
sub_quests (array), key_locations (array), important_items (array), key_characters (array), \
adventure_arc, special_mechanics. This is the one-time design document for the whole adventure.";

fn turn_system_prompt(outline: &AdventureOutline, art_style: &str) -> String {
    format!(
        "You are the game master for \"{title}\". Main quest: {quest}. Adventure arc: {arc}.\n\
         For every player turn, respond with narration prose followed by a line reading exactly \
         <<<JSON>>> and then one JSON object. If you are describing a new or current location, use \
         responseType \"fullScene\" with locationId, locationName, imageDescription, musicDescription, \
         musicMood, and an exits array (direction/targetLocationId/state). Otherwise use responseType \
         \"simple\" with locationId and actionTaken. Never invent an exit state you have not already \
         established; a player may only move through an exit you previously described as open. Images \
         should be described in the art style \"{art_style}\". You may call add_inventory_item, \
         remove_inventory_item, and list_inventory to track carried items.",
        title = outline.title,
        quest = outline.main_quest,
        arc = outline.adventure_arc,
    )
}

pub struct GameEngine {
    llm: Arc<dyn LlmClient>,
    tts: Arc<dyn TtsClient>,
    image: Arc<dyn ImageClient>,
    music: Arc<dyn MusicClient>,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn Rng>,
    persistence: Arc<PersistenceEngine>,
    media_cache: Arc<Mutex<MediaCache>>,
}

/// Outcome of advancing a game by one turn.
pub struct TurnOutcome {
    pub response: StructuredResponse,
    pub state: GameState,
    pub issues: Vec<ValidationIssue>,
}

impl GameEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tts: Arc<dyn TtsClient>,
        image: Arc<dyn ImageClient>,
        music: Arc<dyn MusicClient>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn Rng>,
        persistence: Arc<PersistenceEngine>,
        media_cache: Arc<Mutex<MediaCache>>,
    ) -> Self {
        Self {
            llm,
            tts,
            image,
            music,
            clock,
            rng,
            persistence,
            media_cache,
        }
    }

    /// Creates a new game: generates (or accepts) the adventure outline,
    /// then drives one orchestrator turn to produce the opening scene.
    #[instrument(skip(self, supplied_outline))]
    pub async fn initialize(
        &self,
        theme: Option<String>,
        art_style: Option<String>,
        supplied_outline: Option<AdventureOutline>,
    ) -> Result<TurnOutcome, EngineError> {
        let game_id = GameId::from_suffix(&self.rng.hex_id_suffix())
            .expect("rng port contract guarantees a valid 8-hex-digit suffix");
        let art_style = art_style.unwrap_or_else(|| "painterly fantasy illustration".to_string());

        let outline = match supplied_outline {
            Some(outline) => outline,
            None => self.generate_outline(theme.as_deref(), &art_style).await?,
        };

        let system_prompt = turn_system_prompt(&outline, &art_style);
        let mut conversation = vec![
            AgentMessage::System {
                content: system_prompt.clone(),
            },
            AgentMessage::User {
                content: "Begin the adventure.".to_string(),
            },
        ];
        let mut inventory = Vec::new();

        let response = orchestrator::run(self.llm.as_ref(), &mut conversation, &mut inventory).await?;

        let mut state = GameState {
            game_id: game_id.to_string(),
            theme,
            art_style: Some(art_style),
            outline: Some(outline.clone()),
            core: storyforge_domain::CoreState::new(),
            inventory,
            agent_messages: conversation,
            media_cache: BTreeMap::new(),
            system_prompt: Some(system_prompt),
            created_at: self.clock.now(),
            last_played: self.clock.now(),
            total_play_time_secs: 0,
            adventure_title: Some(outline.title.clone()),
        };
        state.core.apply_response(&response, self.clock.now());
        let issues = state.core.pop_validation_issues();

        self.persist_step(&game_id, 1, &state, &response, None, 0)?;

        Ok(TurnOutcome {
            response,
            state,
            issues,
        })
    }

    async fn generate_outline(
        &self,
        theme: Option<&str>,
        art_style: &str,
    ) -> Result<AdventureOutline, EngineError> {
        let user_prompt = match theme {
            Some(theme) => format!("Theme: {theme}. Art style: {art_style}."),
            None => format!("Surprise me with a theme. Art style: {art_style}."),
        };
        let conversation = vec![
            AgentMessage::System {
                content: OUTLINE_SYSTEM_PROMPT.to_string(),
            },
            AgentMessage::User { content: user_prompt },
        ];
        let completion = self.llm.complete(&conversation, &[]).await?;
        let raw = completion.content.unwrap_or_default();

        match serde_json::from_str::<AdventureOutline>(raw.trim()) {
            Ok(outline) => Ok(outline),
            Err(_) => {
                let repaired = crate::stream_parser::repair_partial_json(raw.trim());
                serde_json::from_str::<AdventureOutline>(&repaired).map_err(|e| {
                    EngineError::InvalidRequest(format!("adventure outline was not valid JSON even after repair: {e}"))
                })
            }
        }
    }

    /// Advances `game_id` by one turn without streaming.
    #[instrument(skip(self, command))]
    pub async fn process_command(&self, game_id: &GameId, command: &str) -> Result<TurnOutcome, EngineError> {
        let loaded = self.persistence.load_latest(&game_id.to_string())?;
        let mut state = loaded.state;
        let started = std::time::Instant::now();

        state.core.track_user(command, self.clock.now());
        state.agent_messages.push(AgentMessage::User {
            content: command.to_string(),
        });

        let response = orchestrator::run(self.llm.as_ref(), &mut state.agent_messages, &mut state.inventory).await?;
        state.core.apply_response(&response, self.clock.now());
        let issues = state.core.pop_validation_issues();
        state.last_played = self.clock.now();

        let next_step = loaded.metadata.step_number + 1;
        self.persist_step(
            game_id,
            next_step,
            &state,
            &response,
            Some(command),
            started.elapsed().as_millis() as u64,
        )?;

        Ok(TurnOutcome {
            response,
            state,
            issues,
        })
    }

    /// Advances `game_id` by one turn, forwarding narration chunks over
    /// `narration_sink` as the LLM streams them.
    #[instrument(skip(self, command, narration_sink))]
    pub async fn process_command_streaming(
        &self,
        game_id: &GameId,
        command: &str,
        narration_sink: mpsc::UnboundedSender<String>,
    ) -> Result<TurnOutcome, EngineError> {
        let loaded = self.persistence.load_latest(&game_id.to_string())?;
        let mut state = loaded.state;
        let started = std::time::Instant::now();

        state.core.track_user(command, self.clock.now());
        state.agent_messages.push(AgentMessage::User {
            content: command.to_string(),
        });

        let response = orchestrator::run_streaming(
            self.llm.as_ref(),
            &mut state.agent_messages,
            &mut state.inventory,
            narration_sink,
        )
        .await?;
        state.core.apply_response(&response, self.clock.now());
        let issues = state.core.pop_validation_issues();
        state.last_played = self.clock.now();

        let next_step = loaded.metadata.step_number + 1;
        self.persist_step(
            game_id,
            next_step,
            &state,
            &response,
            Some(command),
            started.elapsed().as_millis() as u64,
        )?;

        Ok(TurnOutcome {
            response,
            state,
            issues,
        })
    }

    pub fn get_game_state(&self, game_id: &GameId) -> Result<GameState, EngineError> {
        Ok(self.persistence.load_latest(&game_id.to_string())?.state)
    }

    pub fn list_games(&self) -> Result<Vec<GameMetadata>, EngineError> {
        Ok(self.persistence.list_games()?)
    }

    pub fn delete_game(&self, game_id: &GameId) -> Result<(), EngineError> {
        Ok(self.persistence.delete_game(&game_id.to_string())?)
    }

    pub fn should_generate_scene_image(&self, state: &GameState, response: &StructuredResponse) -> bool {
        state.core.should_generate_scene_image(response)
    }

    pub fn should_generate_background_music(&self, state: &GameState, response: &StructuredResponse) -> bool {
        state.core.should_generate_background_music(response)
    }

    /// Generates (or serves from cache) the scene image for `response`,
    /// returning base64-encoded image bytes.
    pub async fn generate_scene_image(
        &self,
        game_id: &GameId,
        state: &GameState,
        response: &StructuredResponse,
    ) -> Result<String, EngineError> {
        let (description, location_id) = match response {
            StructuredResponse::Scene(scene) => (scene.image_description.clone(), Some(scene.location_id.clone())),
            StructuredResponse::Simple(simple) => (
                media::extract_scene_description(&simple.narration_text),
                Some(simple.location_id.clone()),
            ),
        };
        let art_style = state.art_style.clone().unwrap_or_default();
        let prompt = media::build_image_prompt(&description, &art_style);
        let key = media::cache_key("image", &art_style, &prompt);

        {
            use base64::Engine as _;
            let mut cache = self.media_cache.lock().await;
            if let Some(path) = cache.get(&key) {
                if let Ok(bytes) = std::fs::read(&path) {
                    return Ok(base64::engine::general_purpose::STANDARD.encode(bytes));
                }
            }
        }

        let image_b64 = self
            .image
            .generate_scene(&prompt, &art_style, Some(&game_id.to_string()), location_id.as_deref())
            .await?;

        let mut cache = self.media_cache.lock().await;
        let _ = cache.put(&key, &image_b64);
        Ok(image_b64)
    }

    /// Generates (or serves from cache) background music for `response`.
    pub async fn generate_background_music(
        &self,
        game_id: &GameId,
        state: &mut GameState,
        response: &StructuredResponse,
    ) -> Result<String, EngineError> {
        let (mood, description, location_id) = match response {
            StructuredResponse::Scene(scene) => {
                (scene.music_mood, scene.music_description.clone(), Some(scene.location_id.clone()))
            }
            StructuredResponse::Simple(_) => {
                let (mood, description) = media::fallback_mood_for(response);
                (mood, description, Some(response.location_id().to_string()))
            }
        };
        let prompt = media::build_music_prompt(mood, &description);
        let mood_str = media::mood_label(mood);
        let key = media::cache_key("music", mood_str, &prompt);

        let audio_b64 = {
            use base64::Engine as _;
            let mut cache = self.media_cache.lock().await;
            if let Some(path) = cache.get(&key) {
                std::fs::read(&path)
                    .ok()
                    .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes))
            } else {
                None
            }
        };
        let audio_b64 = match audio_b64 {
            Some(b64) => b64,
            None => {
                let generated = self
                    .music
                    .generate(mood_str, &prompt, Some(&game_id.to_string()), location_id.as_deref())
                    .await?;
                let mut cache = self.media_cache.lock().await;
                let _ = cache.put(&key, &generated);
                generated
            }
        };

        state.core.record_music_generated(mood);
        state.media_cache.insert(
            key,
            MediaCacheEntry {
                relative_path: format!("music/{mood_str}"),
                description,
                generated_at: self.clock.now(),
            },
        );
        Ok(audio_b64)
    }

    /// Synthesizes spoken audio for narration text, not cached (spoken audio
    /// is per-utterance, not content-addressed like images/music).
    pub async fn synthesize_narration(&self, text: &str, voice: &str) -> Result<String, EngineError> {
        Ok(self.tts.synthesize_to_base64(text, voice).await?)
    }

    fn persist_step(
        &self,
        game_id: &GameId,
        step_number: u32,
        state: &GameState,
        response: &StructuredResponse,
        user_command: Option<&str>,
        execution_time_ms: u64,
    ) -> Result<(), EngineError> {
        let step_metadata = StepMetadata {
            game_id: game_id.to_string(),
            step_number,
            timestamp: self.clock.now(),
            user_command: user_command.map(str::to_string),
            response_length: response.narration_text().len(),
            tool_call_count: state
                .agent_messages
                .iter()
                .filter(|m| matches!(m, AgentMessage::Tool { .. }))
                .count(),
            message_count: state.agent_messages.len(),
            success: true,
            error: None,
            execution_time_ms,
        };
        self.persistence.save_step(
            &game_id.to_string(),
            step_number,
            state,
            &step_metadata,
            response.narration_text(),
            response,
        )?;
        info!(game_id = %game_id, step_number, "turn committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex as StdMutex;

    use crate::ports::error::{AudioError, ImageGenError, LlmError, MusicGenError};
    use crate::ports::{LlmCompletion, StreamEvent, ToolDefinition};

    struct FixedClock;
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    struct FixedRng(&'static str);
    impl Rng for FixedRng {
        fn hex_id_suffix(&self) -> String {
            self.0.to_string()
        }
    }

    struct ScriptedLlm {
        responses: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            _conversation: &[AgentMessage],
            _tools: &[ToolDefinition],
        ) -> Result<LlmCompletion, LlmError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(LlmError::InvalidResponse("script exhausted".to_string()));
            }
            Ok(LlmCompletion {
                content: Some(responses.remove(0)),
                tool_calls: vec![],
            })
        }

        async fn stream_complete(
            &self,
            conversation: &[AgentMessage],
            tools: &[ToolDefinition],
            sink: mpsc::UnboundedSender<StreamEvent>,
        ) -> Result<LlmCompletion, LlmError> {
            let completion = self.complete(conversation, tools).await?;
            if let Some(content) = &completion.content {
                let _ = sink.send(StreamEvent::Content(content.clone()));
            }
            Ok(completion)
        }
    }

    struct NoopTts;
    #[async_trait]
    impl TtsClient for NoopTts {
        async fn synthesize_to_base64(&self, _text: &str, _voice: &str) -> Result<String, AudioError> {
            Ok("ZmFrZS1hdWRpbw==".to_string())
        }
    }

    struct NoopImage;
    #[async_trait]
    impl ImageClient for NoopImage {
        async fn generate_scene(
            &self,
            _prompt: &str,
            _style: &str,
            _game_id: Option<&str>,
            _location_id: Option<&str>,
        ) -> Result<String, ImageGenError> {
            Ok("ZmFrZS1pbWFnZQ==".to_string())
        }
    }

    struct NoopMusic;
    #[async_trait]
    impl MusicClient for NoopMusic {
        fn is_available(&self) -> bool {
            true
        }
        async fn generate(
            &self,
            _mood: &str,
            _context: &str,
            _game_id: Option<&str>,
            _location_id: Option<&str>,
        ) -> Result<String, MusicGenError> {
            Ok("ZmFrZS1tdXNpYw==".to_string())
        }
    }

    fn outline_json() -> String {
        serde_json::json!({
            "title": "The Sunken Keep",
            "tagline": null,
            "main_quest": "Recover the drowned crown",
            "sub_quests": [],
            "key_locations": ["entrance"],
            "important_items": ["crown"],
            "key_characters": [],
            "adventure_arc": "descend, recover, escape",
            "special_mechanics": null
        })
        .to_string()
    }

    fn entrance_turn() -> String {
        "You stand before a flooded keep.\n<<<JSON>>>\n{\"responseType\":\"fullScene\",\"locationId\":\"entrance\",\"locationName\":\"Keep Entrance\",\"imageDescription\":\"a flooded stone entrance\",\"musicDescription\":\"dripping water\",\"musicMood\":\"entrance\",\"exits\":[{\"direction\":\"north\",\"targetLocationId\":\"hall\",\"state\":\"open\"}]}".to_string()
    }

    fn hall_turn() -> String {
        "You wade into the hall.\n<<<JSON>>>\n{\"responseType\":\"fullScene\",\"locationId\":\"hall\",\"locationName\":\"Great Hall\",\"imageDescription\":\"a submerged hall\",\"musicDescription\":\"echoing drips\",\"musicMood\":\"exploration\",\"exits\":[]}".to_string()
    }

    fn make_engine(dir: &std::path::Path, scripted_responses: Vec<String>) -> GameEngine {
        GameEngine::new(
            Arc::new(ScriptedLlm {
                responses: StdMutex::new(scripted_responses),
            }),
            Arc::new(NoopTts),
            Arc::new(NoopImage),
            Arc::new(NoopMusic),
            Arc::new(FixedClock),
            Arc::new(FixedRng("0a0a0a0a")),
            Arc::new(PersistenceEngine::new(dir)),
            Arc::new(Mutex::new(MediaCache::new(
                dir.join("media"),
                std::time::Duration::from_secs(60),
                16 * 1024 * 1024,
            ))),
        )
    }

    #[tokio::test]
    async fn initialize_generates_outline_and_opening_scene() {
        let dir = tempfile::tempdir().unwrap();
        let engine = make_engine(dir.path(), vec![outline_json(), entrance_turn()]);

        let outcome = engine.initialize(Some("drowned ruins".to_string()), None, None).await.unwrap();
        assert_eq!(outcome.response.location_id(), "entrance");
        assert_eq!(outcome.state.adventure_title.as_deref(), Some("The Sunken Keep"));
        assert!(outcome.issues.is_empty());
    }

    #[tokio::test]
    async fn process_command_advances_to_next_open_exit() {
        let dir = tempfile::tempdir().unwrap();
        let engine = make_engine(dir.path(), vec![outline_json(), entrance_turn(), hall_turn()]);

        let started = engine.initialize(None, None, None).await.unwrap();
        let game_id = GameId::from_suffix("0a0a0a0a").unwrap();
        assert_eq!(started.response.location_id(), "entrance");

        let outcome = engine.process_command(&game_id, "go north").await.unwrap();
        assert_eq!(outcome.response.location_id(), "hall");
        assert!(outcome.issues.is_empty());
    }

    #[tokio::test]
    async fn generate_scene_image_is_served_from_cache_on_second_call() {
        let dir = tempfile::tempdir().unwrap();
        let engine = make_engine(dir.path(), vec![outline_json(), entrance_turn()]);
        let outcome = engine.initialize(None, None, None).await.unwrap();
        let game_id = GameId::from_suffix("0a0a0a0a").unwrap();

        let first = engine.generate_scene_image(&game_id, &outcome.state, &outcome.response).await.unwrap();
        let second = engine.generate_scene_image(&game_id, &outcome.state, &outcome.response).await.unwrap();
        assert_eq!(first, second);
    }
}

