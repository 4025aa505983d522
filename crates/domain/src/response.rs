//! Structured response model & validator (spec §3, §4.1 — component C2).
//!
//! The LLM is instructed to emit `<narration prose>\n<<<JSON>>>\n{ ... }` for
//! every turn. This module owns the JSON half of that contract: parsing it
//! into a `GameScene` or `SimpleResponse` and enforcing every invariant named
//! in spec §3/§8 except the movement gate, which needs the *previous* scene
//! and therefore lives in [`crate::core_state`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compass-like exit directions. Fixed set per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
    In,
    Out,
}

impl Direction {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "north" => Self::North,
            "south" => Self::South,
            "east" => Self::East,
            "west" => Self::West,
            "up" => Self::Up,
            "down" => Self::Down,
            "in" => Self::In,
            "out" => Self::Out,
            _ => return None,
        })
    }
}

/// State of a passage out of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitState {
    Open,
    Closed,
    Locked,
    Sealed,
    Blocked,
    Hidden,
}

impl ExitState {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "open" => Self::Open,
            "closed" => Self::Closed,
            "locked" => Self::Locked,
            "sealed" => Self::Sealed,
            "blocked" => Self::Blocked,
            "hidden" => Self::Hidden,
            _ => return None,
        })
    }
}

/// Atmospheric mood steering music generation. Fixed 16-value enum per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicMood {
    Entrance,
    Exploration,
    Combat,
    Victory,
    Dungeon,
    Forest,
    Town,
    Mystery,
    Castle,
    Underwater,
    Temple,
    Boss,
    Stealth,
    Treasure,
    Danger,
    Peaceful,
}

impl MusicMood {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "entrance" => Self::Entrance,
            "exploration" => Self::Exploration,
            "combat" => Self::Combat,
            "victory" => Self::Victory,
            "dungeon" => Self::Dungeon,
            "forest" => Self::Forest,
            "town" => Self::Town,
            "mystery" => Self::Mystery,
            "castle" => Self::Castle,
            "underwater" => Self::Underwater,
            "temple" => Self::Temple,
            "boss" => Self::Boss,
            "stealth" => Self::Stealth,
            "treasure" => Self::Treasure,
            "danger" => Self::Danger,
            "peaceful" => Self::Peaceful,
            _ => return None,
        })
    }
}

/// An exit from a `GameScene`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    pub direction: Direction,
    pub target_location_id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: ExitState,
}

/// A fully described location (spec §3 `GameScene`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameScene {
    pub location_id: String,
    pub location_name: String,
    /// Re-attached by the streaming parser from the narration prefix, not by
    /// the LLM's JSON payload — see spec §4.1. Present here because once a
    /// turn is fully assembled this is the single source of truth for it.
    pub narration_text: String,
    pub image_description: String,
    pub music_description: String,
    pub music_mood: MusicMood,
    pub exits: Vec<Exit>,
    #[serde(default)]
    pub items: HashSet<String>,
    #[serde(default)]
    pub npcs: HashSet<String>,
}

/// Actions recognized for a non-movement turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTaken {
    Examine,
    Help,
    Inventory,
    Talk,
    Use,
    Take,
    Drop,
    Open,
    Other,
}

impl ActionTaken {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "examine" => Self::Examine,
            "help" => Self::Help,
            "inventory" => Self::Inventory,
            "talk" => Self::Talk,
            "use" => Self::Use,
            "take" => Self::Take,
            "drop" => Self::Drop,
            "open" => Self::Open,
            "other" => Self::Other,
            _ => return None,
        })
    }
}

/// An action that does not move to a new scene (spec §3 `SimpleResponse`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleResponse {
    pub location_id: String,
    pub action_taken: ActionTaken,
    pub narration_text: String,
}

/// Either shape of structured LLM output.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredResponse {
    Scene(GameScene),
    Simple(SimpleResponse),
}

impl StructuredResponse {
    pub fn location_id(&self) -> &str {
        match self {
            Self::Scene(s) => &s.location_id,
            Self::Simple(s) => &s.location_id,
        }
    }

    pub fn narration_text(&self) -> &str {
        match self {
            Self::Scene(s) => &s.narration_text,
            Self::Simple(s) => &s.narration_text,
        }
    }

    /// `response.json`'s on-disk shape (spec §4.6): the parsed response plus
    /// a `type` discriminant distinct from the wire-level `responseType`.
    pub fn to_persisted_json(&self) -> serde_json::Value {
        let (tag, mut value) = match self {
            Self::Scene(scene) => ("scene", serde_json::to_value(scene)),
            Self::Simple(simple) => ("action", serde_json::to_value(simple)),
        };
        let value = value
            .as_mut()
            .expect("GameScene/SimpleResponse always serialize")
            .as_object_mut()
            .expect("GameScene/SimpleResponse always serialize to an object");
        value.insert("type".to_string(), serde_json::json!(tag));
        serde_json::Value::Object(value.clone())
    }

    /// Reconstructs a response from a `response.json` value written by
    /// [`Self::to_persisted_json`]. Returns `None` if `type` is missing,
    /// unrecognized, or the remaining fields don't match that shape.
    pub fn from_persisted_json(value: &serde_json::Value) -> Option<Self> {
        match value.get("type")?.as_str()? {
            "scene" => serde_json::from_value::<GameScene>(value.clone()).ok().map(Self::Scene),
            "action" => serde_json::from_value::<SimpleResponse>(value.clone())
                .ok()
                .map(Self::Simple),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingJson,
    MalformedJson,
    InvalidField,
    InvalidExitDirection,
    UnknownResponseType,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub issues: Vec<String>,
}

impl ParseError {
    fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            issues: Vec::new(),
        }
    }

    fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }
}

const LOCATION_ID_CHARS: &str = "abcdefghijklmnopqrstuvwxyz0123456789_";

fn is_valid_location_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| LOCATION_ID_CHARS.contains(c))
}

/// Parse the JSON half of a turn (everything at/after `<<<JSON>>>`) into a
/// `GameScene` or `SimpleResponse`, re-attaching `narration_text` from the
/// narration prefix the streaming parser already extracted.
///
/// This does not enforce the movement gate — that requires the previous
/// scene and is applied by [`crate::core_state::CoreState::apply_response`].
pub fn parse_and_validate(
    json_payload: &str,
    narration_text: &str,
) -> Result<StructuredResponse, ParseError> {
    let trimmed = json_payload.trim();
    if trimmed.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::MissingJson,
            "no JSON payload found after <<<JSON>>> marker",
        ));
    }

    let value: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
        ParseError::new(ParseErrorKind::MalformedJson, format!("invalid JSON: {e}"))
    })?;

    let response_type = value
        .get("responseType")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ParseError::new(ParseErrorKind::InvalidField, "missing field `responseType`")
        })?;

    match response_type {
        "fullScene" => parse_scene(&value, narration_text).map(StructuredResponse::Scene),
        "simple" => parse_simple(&value, narration_text).map(StructuredResponse::Simple),
        other => Err(ParseError::new(
            ParseErrorKind::UnknownResponseType,
            format!("unknown responseType {other:?}"),
        )),
    }
}

fn require_str<'a>(value: &'a serde_json::Value, field: &str) -> Result<&'a str, ParseError> {
    value.get(field).and_then(|v| v.as_str()).ok_or_else(|| {
        ParseError::new(ParseErrorKind::InvalidField, format!("missing field `{field}`"))
    })
}

fn parse_scene(value: &serde_json::Value, narration_text: &str) -> Result<GameScene, ParseError> {
    let mut issues = Vec::new();

    let location_id = require_str(value, "locationId")?.to_string();
    if !is_valid_location_id(&location_id) {
        issues.push(format!(
            "locationId {location_id:?} does not match [a-z0-9_]+"
        ));
    }

    let location_name = require_str(value, "locationName")?.to_string();
    let image_description = require_str(value, "imageDescription")?.to_string();
    let music_description = require_str(value, "musicDescription")?.to_string();

    let mood_raw = require_str(value, "musicMood")?;
    let music_mood = MusicMood::parse(mood_raw).ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::InvalidField,
            format!("unknown musicMood {mood_raw:?}"),
        )
    })?;

    let exits_value = value
        .get("exits")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidField, "missing field `exits`"))?;

    let mut exits = Vec::with_capacity(exits_value.len());
    let mut seen_directions = HashSet::new();
    for raw_exit in exits_value {
        let direction_raw = require_str(raw_exit, "direction")?;
        let direction = Direction::parse(direction_raw).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::InvalidExitDirection,
                format!("unknown exit direction {direction_raw:?}"),
            )
        })?;
        if !seen_directions.insert(direction_raw.to_string()) {
            return Err(ParseError::new(
                ParseErrorKind::InvalidExitDirection,
                format!("duplicate exit direction {direction_raw:?} in scene"),
            ));
        }
        let target_location_id = require_str(raw_exit, "targetLocationId")?.to_string();
        let description = raw_exit
            .get("description")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let state_raw = require_str(raw_exit, "state")?;
        let state = ExitState::parse(state_raw).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::InvalidField,
                format!("unknown exit state {state_raw:?}"),
            )
        })?;
        exits.push(Exit {
            direction,
            target_location_id,
            description,
            state,
        });
    }

    let items = value
        .get("items")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    let npcs = value
        .get("npcs")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();

    if !issues.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::InvalidField,
            "scene failed validation",
        )
        .with_issues(issues));
    }

    Ok(GameScene {
        location_id,
        location_name,
        narration_text: narration_text.to_string(),
        image_description,
        music_description,
        music_mood,
        exits,
        items,
        npcs,
    })
}

fn parse_simple(
    value: &serde_json::Value,
    narration_text: &str,
) -> Result<SimpleResponse, ParseError> {
    let location_id = require_str(value, "locationId")?.to_string();
    if location_id.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::InvalidField,
            "locationId must be non-empty",
        ));
    }
    let action_raw = require_str(value, "actionTaken")?;
    let action_taken = ActionTaken::parse(action_raw).ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::InvalidField,
            format!("unknown actionTaken {action_raw:?}"),
        )
    })?;

    Ok(SimpleResponse {
        location_id,
        action_taken,
        narration_text: narration_text.to_string(),
    })
}
