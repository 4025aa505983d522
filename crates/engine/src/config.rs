//! Application configuration (ambient stack: loaded from environment via
//! `dotenvy` + plain `std::env::var`, matching the teacher's
//! `infrastructure::config::AppConfig::from_env` convention).

use std::env;

use anyhow::{Context, Result};

/// Server configuration loaded from environment variables at boot.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind port for the websocket/HTTP server.
    pub server_port: u16,
    /// CORS allowed origins (comma-separated, or "*" for any).
    pub cors_allowed_origins: Vec<String>,
    /// Base directory for step-based game saves.
    pub data_dir: String,
    /// Base directory for the content-addressed media cache.
    pub media_cache_dir: String,
    /// Default art style applied when a new game doesn't specify one.
    pub default_art_style: String,
    /// Default TTS voice used for audio commands.
    pub default_voice: String,
    /// Media cache entry time-to-live, in seconds.
    pub media_cache_ttl_secs: u64,
    /// Media cache total size bound, in bytes.
    pub media_cache_max_bytes: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,

            cors_allowed_origins: parse_cors_origins(
                &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            ),

            data_dir: env::var("STORYFORGE_DATA_DIR").unwrap_or_else(|_| "./data/games".to_string()),

            media_cache_dir: env::var("STORYFORGE_MEDIA_CACHE_DIR")
                .unwrap_or_else(|_| "./data/media-cache".to_string()),

            default_art_style: env::var("STORYFORGE_DEFAULT_ART_STYLE")
                .unwrap_or_else(|_| "painterly fantasy illustration".to_string()),

            default_voice: env::var("STORYFORGE_DEFAULT_VOICE").unwrap_or_else(|_| "narrator".to_string()),

            media_cache_ttl_secs: env::var("STORYFORGE_MEDIA_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "604800".to_string()) // 7 days
                .parse()
                .unwrap_or(604_800),

            media_cache_max_bytes: env::var("STORYFORGE_MEDIA_CACHE_MAX_BYTES")
                .unwrap_or_else(|_| "536870912".to_string()) // 512 MiB
                .parse()
                .unwrap_or(536_870_912),
        })
    }
}

fn parse_cors_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_origins_split_and_trim() {
        let origins = parse_cors_origins(" http://a.test , http://b.test ");
        assert_eq!(origins, vec!["http://a.test".to_string(), "http://b.test".to_string()]);
    }

    #[test]
    fn cors_origins_wildcard_is_a_single_entry() {
        assert_eq!(parse_cors_origins("*"), vec!["*".to_string()]);
    }
}
