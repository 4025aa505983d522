//! Media coordination layer (spec §4.5, components C8/C9): content-addressed
//! caching of generated images/music plus the prompt-building logic that
//! decides what to ask the provider SPIs for.

pub mod cache;
pub mod planner;

pub use cache::{cache_key, CacheError, MediaCache};
pub use planner::{
    build_image_prompt, build_music_prompt, detect_mood_from_text, extract_scene_description,
    fallback_mood_for, mood_label, styled_image_prompt,
};
