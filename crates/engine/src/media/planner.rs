//! Media generation planning (spec §4.5, component C9): turns a parsed
//! structured response into the concrete image/music prompts handed to the
//! provider SPIs, and picks a fallback mood/description for turns that have
//! no `GameScene` of their own to read one from.
//!
//! Grounded on the teacher's `use_cases::media::build_prompt` string
//! templating, generalized to this spec's art-style/mood/vocabulary tables.

use storyforge_domain::{MusicMood, StructuredResponse};

/// Keyword → mood table for `detectMoodFromText`, covering all 16 moods.
/// Checked in order; the first keyword contained in the (lowercased) text
/// wins. Falls back to `Exploration` when nothing matches.
const MOOD_KEYWORD_TABLE: &[(&str, MusicMood)] = &[
    ("battle", MusicMood::Combat),
    ("ambush", MusicMood::Combat),
    ("combat", MusicMood::Combat),
    ("fight", MusicMood::Combat),
    ("boss", MusicMood::Boss),
    ("final showdown", MusicMood::Boss),
    ("victory", MusicMood::Victory),
    ("triumph", MusicMood::Victory),
    ("danger", MusicMood::Danger),
    ("threat", MusicMood::Danger),
    ("peril", MusicMood::Danger),
    ("treasure", MusicMood::Treasure),
    ("gold", MusicMood::Treasure),
    ("hoard", MusicMood::Treasure),
    ("stealth", MusicMood::Stealth),
    ("sneak", MusicMood::Stealth),
    ("shadows", MusicMood::Stealth),
    ("dungeon", MusicMood::Dungeon),
    ("crypt", MusicMood::Dungeon),
    ("catacomb", MusicMood::Dungeon),
    ("underwater", MusicMood::Underwater),
    ("submerged", MusicMood::Underwater),
    ("ocean floor", MusicMood::Underwater),
    ("temple", MusicMood::Temple),
    ("shrine", MusicMood::Temple),
    ("altar", MusicMood::Temple),
    ("castle", MusicMood::Castle),
    ("keep", MusicMood::Castle),
    ("throne room", MusicMood::Castle),
    ("forest", MusicMood::Forest),
    ("woods", MusicMood::Forest),
    ("grove", MusicMood::Forest),
    ("town", MusicMood::Town),
    ("village", MusicMood::Town),
    ("market", MusicMood::Town),
    ("mystery", MusicMood::Mystery),
    ("mysterious", MusicMood::Mystery),
    ("riddle", MusicMood::Mystery),
    ("enter", MusicMood::Entrance),
    ("arrive", MusicMood::Entrance),
    ("step through", MusicMood::Entrance),
    ("peaceful", MusicMood::Peaceful),
    ("calm", MusicMood::Peaceful),
    ("serene", MusicMood::Peaceful),
];

/// Visual-noun vocabulary used by `extractSceneDescription` to pick out the
/// sentence most worth illustrating when the LLM didn't emit a `GameScene`.
const VISUAL_NOUN_VOCABULARY: &[&str] = &[
    "hall", "hallway", "room", "chamber", "corridor", "door", "doorway", "gate", "wall", "tower",
    "castle", "forest", "tree", "grove", "river", "lake", "cave", "cavern", "bridge", "statue",
    "altar", "shrine", "throne", "mountain", "sky", "ruins", "courtyard", "staircase", "stairs",
    "chest", "temple", "garden", "path", "clearing", "cliff", "tunnel",
];

/// `detectMoodFromText` (spec §4.5): maps keyword presence to one of 16
/// moods, defaulting to `exploration`.
pub fn detect_mood_from_text(text: &str) -> MusicMood {
    let lower = text.to_lowercase();
    for (keyword, mood) in MOOD_KEYWORD_TABLE {
        if lower.contains(keyword) {
            return *mood;
        }
    }
    MusicMood::Exploration
}

/// `extractSceneDescription` (spec §4.5): a fallback used when the LLM did
/// not emit a `GameScene`. Selects the first sentence containing a
/// visual-noun word, falling back to the first sentence, falling back to
/// the whole text if it doesn't split into sentences at all.
pub fn extract_scene_description(text: &str) -> String {
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if let Some(sentence) = sentences.iter().find(|sentence| {
        let lower = sentence.to_lowercase();
        VISUAL_NOUN_VOCABULARY.iter().any(|noun| lower.contains(noun))
    }) {
        return sentence.to_string();
    }
    sentences
        .first()
        .map(|s| s.to_string())
        .unwrap_or_else(|| text.trim().to_string())
}

/// `styledImagePrompt` (spec §4.5): rewrites `base` into a provider-agnostic
/// prompt keyed to `style` (matched case-insensitively against pixel /
/// pencil / painting / comic); any other style falls back to concatenating
/// `"{base}, {styleDescription}"`.
pub fn styled_image_prompt(style: &str, base: &str, style_description: &str) -> String {
    let lower = style.to_lowercase();
    let rewritten = if lower.contains("pixel") {
        format!("{base}, pixel art sprite, 16-bit retro video game aesthetic")
    } else if lower.contains("pencil") || lower.contains("sketch") {
        format!("{base}, pencil sketch, graphite linework, hand-drawn illustration")
    } else if lower.contains("paint") {
        format!("{base}, oil painting, painterly brushwork, fine art composition")
    } else if lower.contains("comic") {
        format!("{base}, comic book panel, bold ink outlines, flat cel-shaded color")
    } else if style_description.trim().is_empty() {
        return base.to_string();
    } else {
        return format!("{base}, {style_description}");
    };

    if style_description.trim().is_empty() {
        rewritten
    } else {
        format!("{rewritten}, {style_description}")
    }
}

/// Builds the text-to-image prompt for a scene, folding in the game's art
/// style so every generated image stays visually consistent. Thin wrapper
/// over [`styled_image_prompt`] that uses the raw style string itself as the
/// fallback style description.
pub fn build_image_prompt(image_description: &str, art_style: &str) -> String {
    styled_image_prompt(art_style, image_description, art_style)
}

/// Builds the text-to-music prompt for a mood + scene description.
pub fn build_music_prompt(mood: MusicMood, music_description: &str) -> String {
    format!("{}: {}", mood_label(mood), music_description)
}

pub fn mood_label(mood: MusicMood) -> &'static str {
    match mood {
        MusicMood::Entrance => "entrance",
        MusicMood::Exploration => "exploration",
        MusicMood::Combat => "combat",
        MusicMood::Victory => "victory",
        MusicMood::Dungeon => "dungeon",
        MusicMood::Forest => "forest",
        MusicMood::Town => "town",
        MusicMood::Mystery => "mystery",
        MusicMood::Castle => "castle",
        MusicMood::Underwater => "underwater",
        MusicMood::Temple => "temple",
        MusicMood::Boss => "boss",
        MusicMood::Stealth => "stealth",
        MusicMood::Treasure => "treasure",
        MusicMood::Danger => "danger",
        MusicMood::Peaceful => "peaceful",
    }
}

/// Picks the mood and a short description for a response that has no
/// `GameScene` of its own (a `SimpleResponse` turn) but whose narration text
/// reads as a mood shift.
pub fn fallback_mood_for(response: &StructuredResponse) -> (MusicMood, String) {
    let text = response.narration_text();
    (detect_mood_from_text(text), text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyforge_domain::{ActionTaken, SimpleResponse};

    #[test]
    fn image_prompt_rewrites_pixel_style() {
        let prompt = build_image_prompt("a dim stone hallway", "pixel art");
        assert!(prompt.contains("a dim stone hallway"));
        assert!(prompt.contains("pixel art sprite"));
    }

    #[test]
    fn image_prompt_falls_back_for_unrecognized_style() {
        let prompt = build_image_prompt("a dim stone hallway", "watercolor");
        assert_eq!(prompt, "a dim stone hallway, watercolor");
    }

    #[test]
    fn image_prompt_omits_style_when_blank() {
        let prompt = build_image_prompt("a dim stone hallway", "");
        assert_eq!(prompt, "a dim stone hallway");
    }

    #[test]
    fn styled_image_prompt_covers_all_four_named_styles() {
        let base = "a ruined courtyard";
        assert!(styled_image_prompt("pixel", base, "").contains("pixel art"));
        assert!(styled_image_prompt("pencil sketch", base, "").contains("pencil sketch"));
        assert!(styled_image_prompt("oil painting", base, "").contains("oil painting"));
        assert!(styled_image_prompt("comic book", base, "").contains("comic book panel"));
    }

    #[test]
    fn music_prompt_includes_mood_label() {
        let prompt = build_music_prompt(MusicMood::Combat, "tense percussion");
        assert_eq!(prompt, "combat: tense percussion");
    }

    #[test]
    fn detect_mood_finds_combat_keyword() {
        assert_eq!(
            detect_mood_from_text("An ambush springs from the shadows!"),
            MusicMood::Combat
        );
    }

    #[test]
    fn detect_mood_defaults_to_exploration() {
        assert_eq!(
            detect_mood_from_text("You inspect the dusty bookshelf."),
            MusicMood::Exploration
        );
    }

    #[test]
    fn detect_mood_covers_every_variant() {
        let samples: &[(&str, MusicMood)] = &[
            ("you enter the hall", MusicMood::Entrance),
            ("a quiet afternoon", MusicMood::Exploration),
            ("battle erupts", MusicMood::Combat),
            ("victory is yours", MusicMood::Victory),
            ("a dank dungeon", MusicMood::Dungeon),
            ("a sunlit forest", MusicMood::Forest),
            ("the town square", MusicMood::Town),
            ("a mysterious riddle", MusicMood::Mystery),
            ("the castle keep", MusicMood::Castle),
            ("submerged ruins", MusicMood::Underwater),
            ("an ancient temple", MusicMood::Temple),
            ("the boss awaits", MusicMood::Boss),
            ("move in stealth", MusicMood::Stealth),
            ("a pile of treasure", MusicMood::Treasure),
            ("a sense of danger", MusicMood::Danger),
            ("a peaceful meadow", MusicMood::Peaceful),
        ];
        for (text, expected) in samples {
            assert_eq!(detect_mood_from_text(text), *expected, "text={text:?}");
        }
    }

    #[test]
    fn extract_scene_description_prefers_visual_sentence() {
        let text = "You feel a chill. A crumbling stone bridge spans the chasm ahead. You should hurry.";
        assert_eq!(
            extract_scene_description(text),
            "A crumbling stone bridge spans the chasm ahead"
        );
    }

    #[test]
    fn extract_scene_description_falls_back_to_first_sentence() {
        let text = "You feel uneasy. Something rustles nearby.";
        assert_eq!(extract_scene_description(text), "You feel uneasy");
    }

    #[test]
    fn fallback_mood_detects_combat_keyword() {
        let response = StructuredResponse::Simple(SimpleResponse {
            location_id: "hall".into(),
            action_taken: ActionTaken::Other,
            narration_text: "An ambush springs from the shadows!".into(),
        });
        let (mood, _) = fallback_mood_for(&response);
        assert_eq!(mood, MusicMood::Combat);
    }

    #[test]
    fn fallback_mood_defaults_to_exploration() {
        let response = StructuredResponse::Simple(SimpleResponse {
            location_id: "hall".into(),
            action_taken: ActionTaken::Examine,
            narration_text: "You inspect the dusty bookshelf.".into(),
        });
        let (mood, _) = fallback_mood_for(&response);
        assert_eq!(mood, MusicMood::Exploration);
    }
}
