//! Websocket transport (spec §4.7, component C12): upgrades the connection,
//! registers a [`crate::session::SessionHandle`], and dispatches incoming
//! [`ClientMessage`]s to the [`crate::game_engine::GameEngine`] façade,
//! translating its results into [`ServerMessage`] frames.
//!
//! Grounded on the teacher's `infrastructure::websocket` connection-handler
//! module (split reader/writer tasks over one socket, a single mpsc-backed
//! writer so message ordering can never be interleaved by two senders).

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use rand::Rng as _;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use storyforge_domain::{AdventureOutline, AgentMessage, GameId, SessionId};
use storyforge_protocol::{ClientMessage, ConversationEntryDto, GameSummaryDto, ServerMessage};

use crate::error::EngineError;
use crate::session::SessionHandle;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(upgrade))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

fn random_hex_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| std::char::from_digit(rng.gen_range(0..16), 16).expect("0..16 is a valid hex digit"))
        .collect()
}

#[instrument(skip(socket, state))]
async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let session_id = SessionId::from_suffix(&random_hex_suffix()).expect("random_hex_suffix is always valid");

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let handle = state.sessions.register(session_id, outbound_tx);

    // The single writer task: every frame for this connection funnels
    // through `outbound_rx`, so ordering between concurrently-produced
    // messages (narration chunks vs. media-ready notices) is never raced.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                error!("failed to serialize outbound server message");
                continue;
            };
            if ws_sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    if handle
        .send(ServerMessage::Connected {
            message: "connected to storyforge engine".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            server_instance_id: state.server_instance_id.clone(),
        })
        .is_err()
    {
        warn!(%session_id, "failed to send connected greeting, closing connection");
        return;
    }

    while let Some(Ok(message)) = ws_stream.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let client_message: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(err) => {
                let _ = handle.send(ServerMessage::Error {
                    error: "malformed message".to_string(),
                    details: Some(err.to_string()),
                });
                continue;
            }
        };
        handle_client_message(&state, &handle, client_message).await;
    }

    state.sessions.remove(&session_id);
    writer.abort();
    info!(%session_id, "session disconnected");
}

async fn handle_client_message(state: &Arc<AppState>, handle: &SessionHandle, message: ClientMessage) {
    match message {
        ClientMessage::Ping { timestamp } => {
            let _ = handle.send(ServerMessage::Pong { timestamp });
        }
        ClientMessage::ListGames => match state.engine.list_games() {
            Ok(games) => {
                let games = games
                    .into_iter()
                    .map(|g| GameSummaryDto {
                        game_id: g.game_id,
                        adventure_title: g.adventure_title,
                        last_played: g.last_played,
                        current_step: g.current_step,
                    })
                    .collect();
                let _ = handle.send(ServerMessage::GamesList { games });
            }
            Err(err) => send_error(handle, &err),
        },
        ClientMessage::NewGame {
            theme,
            art_style,
            image_generation,
            adventure_outline,
        } => handle_new_game(state, handle, theme, art_style, image_generation, adventure_outline).await,
        ClientMessage::LoadGame { game_id } => handle_load_game(state, handle, &game_id).await,
        ClientMessage::Command { command } => handle_command(state, handle, &command).await,
        ClientMessage::StreamCommand { command, .. } => handle_stream_command(state, handle, &command).await,
        ClientMessage::AudioCommand { audio } => handle_audio_command(state, handle, &audio).await,
        ClientMessage::GetImage { message_index } => match handle.get_image(message_index) {
            Some(image) => {
                let _ = handle.send(ServerMessage::ImageReady {
                    message_index,
                    image,
                    mood: None,
                });
            }
            None => {
                let _ = handle.send(ServerMessage::Error {
                    error: "no cached image for that message index".to_string(),
                    details: Some(format!("message_index={message_index}")),
                });
            }
        },
        ClientMessage::GetMusic { message_index } => match handle.get_music(message_index) {
            Some(music) => {
                let _ = handle.send(ServerMessage::MusicReady {
                    message_index,
                    music,
                    mood: None,
                });
            }
            None => {
                let _ = handle.send(ServerMessage::Error {
                    error: "no cached music for that message index".to_string(),
                    details: Some(format!("message_index={message_index}")),
                });
            }
        },
    }
}

fn send_error(handle: &SessionHandle, err: &EngineError) {
    let _ = handle.send(ServerMessage::Error {
        error: err.to_string(),
        details: None,
    });
}

fn parse_game_id(raw: &str) -> Result<GameId, EngineError> {
    GameId::parse(raw).map_err(|e| EngineError::InvalidRequest(e.to_string()))
}

async fn handle_new_game(
    state: &Arc<AppState>,
    handle: &SessionHandle,
    theme: Option<String>,
    art_style: Option<String>,
    image_generation: bool,
    adventure_outline: Option<String>,
) {
    let outline = match adventure_outline.as_deref().map(serde_json::from_str::<AdventureOutline>) {
        Some(Ok(outline)) => Some(outline),
        Some(Err(err)) => {
            send_error(handle, &EngineError::InvalidRequest(format!("invalid adventureOutline: {err}")));
            return;
        }
        None => None,
    };

    match state.engine.initialize(theme, art_style, outline).await {
        Ok(outcome) => {
            let game_id = GameId::parse(&outcome.state.game_id).expect("engine always mints valid ids");
            handle.set_active_game(game_id);

            let has_image = image_generation && state.engine.should_generate_scene_image(&outcome.state, &outcome.response);
            let has_music = state.engine.should_generate_background_music(&outcome.state, &outcome.response);

            let _ = handle.send(ServerMessage::GameStarted {
                session_id: handle.session_id.to_string(),
                game_id: game_id.to_string(),
                text: outcome.response.narration_text().to_string(),
                message_index: outcome.state.agent_messages.len() as u32,
                scene: scene_of(&outcome.response),
                audio: None,
                has_image,
                has_music,
            });

            deliver_media(state, handle, &game_id, outcome.state, outcome.response, has_image, has_music).await;
        }
        Err(err) => send_error(handle, &err),
    }
}

async fn handle_load_game(state: &Arc<AppState>, handle: &SessionHandle, game_id_raw: &str) {
    let game_id = match parse_game_id(game_id_raw) {
        Ok(id) => id,
        Err(err) => return send_error(handle, &err),
    };
    match state.engine.get_game_state(&game_id) {
        Ok(game_state) => {
            handle.set_active_game(game_id);
            let conversation = game_state
                .agent_messages
                .iter()
                .filter_map(player_visible_entry)
                .collect();
            let _ = handle.send(ServerMessage::GameLoaded {
                session_id: handle.session_id.to_string(),
                game_id: game_id.to_string(),
                conversation,
                current_location: game_state.core.current_scene.as_ref().map(|s| s.location_id.clone()),
                current_scene: game_state.core.current_scene.clone(),
            });
        }
        Err(err) => send_error(handle, &err),
    }
}

fn player_visible_entry(message: &AgentMessage) -> Option<ConversationEntryDto> {
    match message {
        AgentMessage::User { content } => Some(ConversationEntryDto {
            role: "user".to_string(),
            content: content.clone(),
        }),
        AgentMessage::Assistant { content, .. } => content.as_ref().map(|c| ConversationEntryDto {
            role: "assistant".to_string(),
            content: c.clone(),
        }),
        AgentMessage::System { .. } | AgentMessage::Tool { .. } => None,
    }
}

async fn handle_command(state: &Arc<AppState>, handle: &SessionHandle, command: &str) {
    let Some(game_id) = handle.active_game() else {
        return send_error(handle, &EngineError::InvalidRequest("no active game on this session".to_string()));
    };
    if !handle.try_begin_command() {
        return send_error(handle, &EngineError::CommandInFlight);
    }

    let result = state.engine.process_command(&game_id, command).await;
    handle.end_command();

    match result {
        Ok(outcome) => {
            let has_image = state.engine.should_generate_scene_image(&outcome.state, &outcome.response);
            let has_music = state.engine.should_generate_background_music(&outcome.state, &outcome.response);

            let _ = handle.send(ServerMessage::CommandResponse {
                text: outcome.response.narration_text().to_string(),
                message_index: outcome.state.agent_messages.len() as u32,
                command: command.to_string(),
                scene: scene_of(&outcome.response),
                audio: None,
                has_image,
                has_music,
            });

            deliver_media(state, handle, &game_id, outcome.state, outcome.response, has_image, has_music).await;
        }
        Err(err) => send_error(handle, &err),
    }
}

async fn handle_stream_command(state: &Arc<AppState>, handle: &SessionHandle, command: &str) {
    let Some(game_id) = handle.active_game() else {
        return send_error(handle, &EngineError::InvalidRequest("no active game on this session".to_string()));
    };
    if !handle.try_begin_command() {
        return send_error(handle, &EngineError::CommandInFlight);
    }

    let started = Instant::now();
    let (narration_tx, mut narration_rx) = mpsc::unbounded_channel::<String>();
    let forward_handle = handle.clone();
    let forwarder = tokio::spawn(async move {
        let mut chunk_number = 0u32;
        while let Some(text) = narration_rx.recv().await {
            chunk_number += 1;
            let _ = forward_handle.send(ServerMessage::TextChunk { text, chunk_number });
        }
        chunk_number
    });

    let result = state
        .engine
        .process_command_streaming(&game_id, command, narration_tx)
        .await;
    let total_chunks = forwarder.await.unwrap_or(0);
    handle.end_command();

    match result {
        Ok(outcome) => {
            let has_image = state.engine.should_generate_scene_image(&outcome.state, &outcome.response);
            let has_music = state.engine.should_generate_background_music(&outcome.state, &outcome.response);

            let _ = handle.send(ServerMessage::StreamComplete {
                message_index: outcome.state.agent_messages.len() as u32,
                total_chunks,
                duration_ms: started.elapsed().as_millis() as u64,
                scene: scene_of(&outcome.response),
                audio: None,
                has_image,
                has_music,
            });

            deliver_media(state, handle, &game_id, outcome.state, outcome.response, has_image, has_music).await;
        }
        Err(err) => send_error(handle, &err),
    }
}

async fn handle_audio_command(state: &Arc<AppState>, handle: &SessionHandle, narration: &str) {
    match state.engine.synthesize_narration(narration, &state.config.default_voice).await {
        Ok(audio) => {
            let _ = handle.send(ServerMessage::Transcription { text: audio });
        }
        Err(err) => send_error(handle, &err),
    }
}

async fn deliver_media(
    state: &Arc<AppState>,
    handle: &SessionHandle,
    game_id: &GameId,
    mut game_state: storyforge_domain::GameState,
    response: storyforge_domain::StructuredResponse,
    has_image: bool,
    has_music: bool,
) {
    let message_index = game_state.agent_messages.len() as u32;

    if has_image {
        match state.engine.generate_scene_image(game_id, &game_state, &response).await {
            Ok(image) => {
                handle.record_image(message_index, image.clone());
                let _ = handle.send(ServerMessage::ImageReady {
                    message_index,
                    image,
                    mood: None,
                });
            }
            Err(err) => {
                debug!(error = %err, "scene image generation failed, continuing without it");
            }
        }
    }

    if has_music {
        match state
            .engine
            .generate_background_music(game_id, &mut game_state, &response)
            .await
        {
            Ok(music) => {
                handle.record_music(message_index, music.clone());
                let _ = handle.send(ServerMessage::MusicReady {
                    message_index,
                    music,
                    mood: None,
                });
            }
            Err(err) => {
                debug!(error = %err, "background music generation failed, continuing without it");
            }
        }
    }
}

fn scene_of(response: &storyforge_domain::StructuredResponse) -> Option<storyforge_domain::GameScene> {
    match response {
        storyforge_domain::StructuredResponse::Scene(scene) => Some(scene.clone()),
        storyforge_domain::StructuredResponse::Simple(_) => None,
    }
}
