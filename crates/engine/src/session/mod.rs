//! Websocket session registry (spec §4.7, component C11): one
//! [`SessionHandle`] per connection, owning the single outbound channel a
//! connection's writer task drains — every server-to-client frame for a
//! session funnels through this one sender, so `textChunk*` →
//! `streamComplete` → `imageReady`/`musicReady` ordering (spec §4.7) can
//! never be interleaved by two tasks racing on the same socket.
//!
//! Grounded on the teacher's `ws::session` connection registry
//! (`Arc<RwLock<HashMap<...>>>` plus a per-connection mpsc outbound queue),
//! generalized to also track the single active game per session and guard
//! against overlapping commands.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use storyforge_domain::{GameId, SessionId};
use storyforge_protocol::ServerMessage;

/// Media generated for one turn, indexed by `messageIndex` so a later
/// `getImage`/`getMusic` (spec §4.7) can retrieve it without regenerating.
#[derive(Default, Clone)]
struct TurnMedia {
    image: Option<String>,
    music: Option<String>,
}

/// Per-connection state shared between the websocket reader/writer tasks
/// and the façade that processes commands on this session's behalf.
#[derive(Clone)]
pub struct SessionHandle {
    pub session_id: SessionId,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    active_game: Arc<RwLock<Option<GameId>>>,
    command_in_flight: Arc<AtomicBool>,
    media_by_message_index: Arc<RwLock<HashMap<u32, TurnMedia>>>,
}

impl SessionHandle {
    /// Enqueues `message` on this session's single outbound channel. Never
    /// blocks; errors only if the connection's writer task has already shut
    /// down, which the caller can safely ignore.
    pub fn send(&self, message: ServerMessage) -> Result<(), mpsc::error::SendError<ServerMessage>> {
        self.outbound.send(message)
    }

    pub fn active_game(&self) -> Option<GameId> {
        *self.active_game.read().expect("active_game lock poisoned")
    }

    pub fn set_active_game(&self, game_id: GameId) {
        *self.active_game.write().expect("active_game lock poisoned") = Some(game_id);
    }

    /// Attempts to claim exclusive processing of one command. Returns
    /// `false` if a command is already in flight for this session — per
    /// spec §7 Open Question, a second concurrent command is rejected
    /// outright rather than queued, so a client can't pile up unbounded
    /// in-flight work against one session.
    pub fn try_begin_command(&self) -> bool {
        self.command_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_command(&self) {
        self.command_in_flight.store(false, Ordering::Release);
    }

    /// Records a generated image so a later `getImage` for this
    /// `message_index` can serve it back without regenerating.
    pub fn record_image(&self, message_index: u32, image: String) {
        self.media_by_message_index
            .write()
            .expect("media index lock poisoned")
            .entry(message_index)
            .or_default()
            .image = Some(image);
    }

    /// Records generated music so a later `getMusic` for this
    /// `message_index` can serve it back without regenerating.
    pub fn record_music(&self, message_index: u32, music: String) {
        self.media_by_message_index
            .write()
            .expect("media index lock poisoned")
            .entry(message_index)
            .or_default()
            .music = Some(music);
    }

    pub fn get_image(&self, message_index: u32) -> Option<String> {
        self.media_by_message_index
            .read()
            .expect("media index lock poisoned")
            .get(&message_index)
            .and_then(|m| m.image.clone())
    }

    pub fn get_music(&self, message_index: u32) -> Option<String> {
        self.media_by_message_index
            .read()
            .expect("media index lock poisoned")
            .get(&message_index)
            .and_then(|m| m.music.clone())
    }
}

#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        session_id: SessionId,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) -> SessionHandle {
        let handle = SessionHandle {
            session_id,
            outbound,
            active_game: Arc::new(RwLock::new(None)),
            command_in_flight: Arc::new(AtomicBool::new(false)),
            media_by_message_index: Arc::new(RwLock::new(HashMap::new())),
        };
        self.sessions
            .write()
            .expect("session map lock poisoned")
            .insert(session_id, handle.clone());
        handle
    }

    pub fn get(&self, session_id: &SessionId) -> Option<SessionHandle> {
        self.sessions
            .read()
            .expect("session map lock poisoned")
            .get(session_id)
            .cloned()
    }

    pub fn remove(&self, session_id: &SessionId) {
        self.sessions
            .write()
            .expect("session map lock poisoned")
            .remove(session_id);
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.read().expect("session map lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session_id() -> SessionId {
        SessionId::from_suffix("00000001").unwrap()
    }

    #[test]
    fn register_then_get_returns_same_handle() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = sample_session_id();
        manager.register(id, tx);
        assert!(manager.get(&id).is_some());
        assert_eq!(manager.active_session_count(), 1);
    }

    #[test]
    fn only_one_command_may_be_in_flight_at_a_time() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = manager.register(sample_session_id(), tx);

        assert!(handle.try_begin_command());
        assert!(!handle.try_begin_command());
        handle.end_command();
        assert!(handle.try_begin_command());
    }

    #[test]
    fn remove_drops_the_session() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = sample_session_id();
        manager.register(id, tx);
        manager.remove(&id);
        assert!(manager.get(&id).is_none());
    }

    #[test]
    fn recorded_media_is_retrievable_by_message_index() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = manager.register(sample_session_id(), tx);

        assert_eq!(handle.get_image(3), None);
        handle.record_image(3, "base64-image".to_string());
        handle.record_music(3, "base64-music".to_string());
        assert_eq!(handle.get_image(3), Some("base64-image".to_string()));
        assert_eq!(handle.get_music(3), Some("base64-music".to_string()));
        assert_eq!(handle.get_image(4), None);
    }

    #[test]
    fn active_game_starts_unset_and_is_settable() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = manager.register(sample_session_id(), tx);
        assert!(handle.active_game().is_none());
        let game_id = GameId::from_suffix("0a0a0a0a").unwrap();
        handle.set_active_game(game_id);
        assert_eq!(handle.active_game(), Some(game_id));
    }
}
