//! On-disk step layout (spec §4.6, component C10): one directory per game,
//! directly under the saves root, containing `game.json` plus a dense,
//! 1-based, zero-padded `step-NNNN/` subtree. `metadata.json` is always
//! written last within a step directory so its presence is the commit
//! marker — a step directory missing it is a crash-torn write and must be
//! ignored by loaders.

use std::path::{Path, PathBuf};

pub const STEP_DIR_WIDTH: usize = 4;
const STEP_DIR_PREFIX: &str = "step-";

pub fn game_dir(base_dir: &Path, game_id: &str) -> PathBuf {
    base_dir.join(game_id)
}

pub fn game_metadata_path(base_dir: &Path, game_id: &str) -> PathBuf {
    game_dir(base_dir, game_id).join("game.json")
}

pub fn step_dir(base_dir: &Path, game_id: &str, step_number: u32) -> PathBuf {
    game_dir(base_dir, game_id).join(format!(
        "{STEP_DIR_PREFIX}{step_number:0width$}",
        width = STEP_DIR_WIDTH
    ))
}

pub fn step_metadata_path(step_dir: &Path) -> PathBuf {
    step_dir.join("metadata.json")
}

pub fn state_path(step_dir: &Path) -> PathBuf {
    step_dir.join("state.json")
}

pub fn command_path(step_dir: &Path) -> PathBuf {
    step_dir.join("command.txt")
}

pub fn response_text_path(step_dir: &Path) -> PathBuf {
    step_dir.join("response.txt")
}

pub fn response_json_path(step_dir: &Path) -> PathBuf {
    step_dir.join("response.json")
}

pub fn messages_path(step_dir: &Path) -> PathBuf {
    step_dir.join("messages.json")
}

pub fn tool_calls_path(step_dir: &Path) -> PathBuf {
    step_dir.join("tool-calls.json")
}

pub fn outline_path(step_dir: &Path) -> PathBuf {
    step_dir.join("outline.json")
}

/// Parses a game directory's `step-NNNN` child name back into a step
/// number, rejecting anything that doesn't match the layout exactly.
pub fn parse_step_dir_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(STEP_DIR_PREFIX)?;
    if digits.len() != STEP_DIR_WIDTH || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_dir_is_zero_padded() {
        let base = Path::new("/data");
        assert_eq!(
            step_dir(base, "game-00000001", 3),
            PathBuf::from("/data/game-00000001/step-0003")
        );
    }

    #[test]
    fn parse_step_dir_name_roundtrips() {
        assert_eq!(parse_step_dir_name("step-0007"), Some(7));
        assert_eq!(parse_step_dir_name("step-7"), None);
        assert_eq!(parse_step_dir_name("0007"), None);
        assert_eq!(parse_step_dir_name("step-abcd"), None);
    }
}
