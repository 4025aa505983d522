//! WebSocket wire envelope (spec §4.7, §6 — component C12).
//!
//! Pure DTOs: no business logic. The transport layer (`storyforge_engine::ws`)
//! deserializes `ClientMessage`, dispatches to the engine façade, and
//! serializes `ServerMessage` frames back out, preserving the ordering
//! invariant of spec §4.7: for a single command, `textChunk*` (strictly
//! increasing `chunk_number`), then exactly one `streamComplete`, then 0-or-1
//! `imageReady`, then 0-or-1 `musicReady`.

use serde::{Deserialize, Serialize};
use storyforge_domain::GameScene;

/// Messages from client (Player) to server (Engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "newGame")]
    NewGame {
        #[serde(default)]
        theme: Option<String>,
        #[serde(default, rename = "artStyle")]
        art_style: Option<String>,
        #[serde(rename = "imageGeneration")]
        image_generation: bool,
        #[serde(default, rename = "adventureOutline")]
        adventure_outline: Option<String>,
    },
    #[serde(rename = "loadGame")]
    LoadGame {
        #[serde(rename = "gameId")]
        game_id: String,
    },
    #[serde(rename = "command")]
    Command { command: String },
    #[serde(rename = "streamCommand")]
    StreamCommand {
        command: String,
        #[serde(default, rename = "imageGeneration")]
        image_generation: Option<bool>,
    },
    #[serde(rename = "audioCommand")]
    AudioCommand { audio: String },
    #[serde(rename = "getImage")]
    GetImage {
        #[serde(rename = "messageIndex")]
        message_index: u32,
    },
    #[serde(rename = "getMusic")]
    GetMusic {
        #[serde(rename = "messageIndex")]
        message_index: u32,
    },
    #[serde(rename = "listGames")]
    ListGames,
    #[serde(rename = "ping")]
    Ping { timestamp: i64 },
}

/// Messages from server (Engine) to client (Player).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connected")]
    Connected {
        message: String,
        version: String,
        #[serde(rename = "serverInstanceId")]
        server_instance_id: String,
    },
    #[serde(rename = "gameStarted")]
    GameStarted {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "gameId")]
        game_id: String,
        text: String,
        #[serde(rename = "messageIndex")]
        message_index: u32,
        #[serde(default)]
        scene: Option<GameScene>,
        #[serde(default)]
        audio: Option<String>,
        #[serde(rename = "hasImage")]
        has_image: bool,
        #[serde(rename = "hasMusic")]
        has_music: bool,
    },
    #[serde(rename = "gameLoaded")]
    GameLoaded {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "gameId")]
        game_id: String,
        conversation: Vec<ConversationEntryDto>,
        #[serde(default, rename = "currentLocation")]
        current_location: Option<String>,
        #[serde(default, rename = "currentScene")]
        current_scene: Option<GameScene>,
    },
    #[serde(rename = "commandResponse")]
    CommandResponse {
        text: String,
        #[serde(rename = "messageIndex")]
        message_index: u32,
        command: String,
        #[serde(default)]
        scene: Option<GameScene>,
        #[serde(default)]
        audio: Option<String>,
        #[serde(rename = "hasImage")]
        has_image: bool,
        #[serde(rename = "hasMusic")]
        has_music: bool,
    },
    #[serde(rename = "textChunk")]
    TextChunk {
        text: String,
        #[serde(rename = "chunkNumber")]
        chunk_number: u32,
    },
    #[serde(rename = "streamComplete")]
    StreamComplete {
        #[serde(rename = "messageIndex")]
        message_index: u32,
        #[serde(rename = "totalChunks")]
        total_chunks: u32,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
        #[serde(default)]
        scene: Option<GameScene>,
        #[serde(default)]
        audio: Option<String>,
        #[serde(rename = "hasImage")]
        has_image: bool,
        #[serde(rename = "hasMusic")]
        has_music: bool,
    },
    #[serde(rename = "transcription")]
    Transcription { text: String },
    #[serde(rename = "imageReady")]
    ImageReady {
        #[serde(rename = "messageIndex")]
        message_index: u32,
        image: String,
        #[serde(default)]
        mood: Option<String>,
    },
    #[serde(rename = "musicReady")]
    MusicReady {
        #[serde(rename = "messageIndex")]
        message_index: u32,
        music: String,
        #[serde(default)]
        mood: Option<String>,
    },
    #[serde(rename = "gamesList")]
    GamesList { games: Vec<GameSummaryDto> },
    #[serde(rename = "error")]
    Error {
        error: String,
        #[serde(default)]
        details: Option<String>,
    },
    #[serde(rename = "pong")]
    Pong { timestamp: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntryDto {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummaryDto {
    #[serde(rename = "gameId")]
    pub game_id: String,
    #[serde(rename = "adventureTitle")]
    pub adventure_title: Option<String>,
    #[serde(rename = "lastPlayed")]
    pub last_played: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "currentStep")]
    pub current_step: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_tag_round_trips() {
        let msg = ClientMessage::Command {
            command: "go north".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"command""#));
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        matches!(back, ClientMessage::Command { .. });
    }

    #[test]
    fn server_text_chunk_uses_camel_case_fields() {
        let msg = ServerMessage::TextChunk {
            text: "hi".into(),
            chunk_number: 3,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["chunkNumber"], 3);
    }

    #[test]
    fn ping_round_trips() {
        let json = r#"{"type":"ping","timestamp":1234}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        matches!(msg, ClientMessage::Ping { timestamp: 1234 });
    }
}
