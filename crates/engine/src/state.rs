//! Shared application state (ambient stack): the one `Arc<AppState>` cloned
//! into every websocket connection handler, composing the engine façade, the
//! session registry, and the loaded configuration.
//!
//! Grounded on the teacher's `infrastructure::state::AppState` (one struct
//! built once in `main`, passed to axum via `State<Arc<AppState>>`).

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::game_engine::GameEngine;
use crate::media::MediaCache;
use crate::persistence::PersistenceEngine;
use crate::ports::{ImageClient, LlmClient, MusicClient, SystemClock, SystemRng, TtsClient};
use crate::session::SessionManager;

pub struct AppState {
    pub config: AppConfig,
    pub engine: GameEngine,
    pub sessions: SessionManager,
    /// Identifies this server process to connecting clients (spec §4.7
    /// `connected.serverInstanceId`), so a client can tell it reconnected to
    /// a different process after a restart.
    pub server_instance_id: String,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        llm: Arc<dyn LlmClient>,
        tts: Arc<dyn TtsClient>,
        image: Arc<dyn ImageClient>,
        music: Arc<dyn MusicClient>,
    ) -> Self {
        let persistence = Arc::new(PersistenceEngine::new(config.data_dir.clone()));
        let media_cache = Arc::new(Mutex::new(MediaCache::new(
            config.media_cache_dir.clone(),
            std::time::Duration::from_secs(config.media_cache_ttl_secs),
            config.media_cache_max_bytes,
        )));
        let engine = GameEngine::new(
            llm,
            tts,
            image,
            music,
            Arc::new(SystemClock),
            Arc::new(SystemRng),
            persistence,
            media_cache,
        );

        Self {
            config,
            engine,
            sessions: SessionManager::new(),
            server_instance_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}
