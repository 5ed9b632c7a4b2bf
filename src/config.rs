use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Which rejection-filter profile to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterProfile {
    /// Full heuristic pipeline, requires the profile-lookup collaborator
    Strict,
    /// Reply-only rejection, no external lookups
    Minimal,
}

/// The five threshold values the curation engine runs on.
///
/// All of them must be present in the environment before `run` will start.
/// Values are validated by presence only, not by range.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Likes above this get a post evicted from the feed
    pub max_threshold: u32,
    /// Likes must exceed this before a post is considered for the feed
    pub min_threshold: u32,
    pub min_age_of_post_ms: i64,
    pub max_age_of_post_ms: i64,
    /// Authors with more followers than this are rejected permanently
    pub max_followers_allowed: i64,
}

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. The
/// threshold variables keep their historical BLUESKY_* names.
pub struct Config {
    pub db_path: String,
    /// Firehose subscription endpoint (websocket)
    pub subscription_endpoint: String,
    /// Public AT Protocol API endpoint for profile/post lookups
    pub public_api_url: String,
    pub filter_profile: FilterProfile,
    /// Authors with fewer posts than this are rejected (re-checked per post)
    pub min_author_posts: i64,
    /// ISO 639-3 codes; a post whose detected language is listed is rejected
    pub reject_languages: Vec<String>,
    max_threshold: Option<u32>,
    min_threshold: Option<u32>,
    min_age_of_post_ms: Option<i64>,
    max_age_of_post_ms: Option<i64>,
    max_followers_allowed: Option<i64>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Only the engine thresholds are required, and only by `run`; `init`
    /// and `status` work with the defaults alone.
    pub fn load() -> Result<Self> {
        let filter_profile = match env::var("LUKEWARM_FILTER_PROFILE").as_deref() {
            Ok("minimal") => FilterProfile::Minimal,
            // "strict" or unset both default to the full filter
            _ => FilterProfile::Strict,
        };

        let reject_languages = env::var("LUKEWARM_REJECT_LANGUAGES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            db_path: env::var("LUKEWARM_DB_PATH").unwrap_or_else(|_| "./lukewarm.db".to_string()),
            subscription_endpoint: env::var("FEEDGEN_SUBSCRIPTION_ENDPOINT")
                .unwrap_or_else(|_| "wss://bsky.network".to_string()),
            public_api_url: env::var("PUBLIC_API_URL")
                .unwrap_or_else(|_| crate::bluesky::client::DEFAULT_PUBLIC_API_URL.to_string()),
            filter_profile,
            min_author_posts: optional_var("LUKEWARM_MIN_AUTHOR_POSTS")?.unwrap_or(4),
            reject_languages,
            max_threshold: optional_var("BLUESKY_MAX_THRESHOLD")?,
            min_threshold: optional_var("BLUESKY_MIN_THRESHOLD")?,
            min_age_of_post_ms: optional_var("BLUESKY_MIN_AGE_OF_POST_IN_MS")?,
            max_age_of_post_ms: optional_var("BLUESKY_MAX_AGE_OF_POST_IN_MS")?,
            max_followers_allowed: optional_var("BLUESKY_MAX_FOLLOWERS_ALLOWED")?,
        })
    }

    /// Check that every engine threshold is configured, and return them.
    /// Call this before starting the ingest loop.
    pub fn require_engine(&self) -> Result<EngineSettings> {
        let mut missing = Vec::new();
        if self.max_threshold.is_none() {
            missing.push("BLUESKY_MAX_THRESHOLD");
        }
        if self.min_threshold.is_none() {
            missing.push("BLUESKY_MIN_THRESHOLD");
        }
        if self.min_age_of_post_ms.is_none() {
            missing.push("BLUESKY_MIN_AGE_OF_POST_IN_MS");
        }
        if self.max_age_of_post_ms.is_none() {
            missing.push("BLUESKY_MAX_AGE_OF_POST_IN_MS");
        }
        if self.max_followers_allowed.is_none() {
            missing.push("BLUESKY_MAX_FOLLOWERS_ALLOWED");
        }
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required environment variables: {}\n\
                 Add them to your .env file. See .env.example for the full list.",
                missing.join(", ")
            );
        }
        Ok(EngineSettings {
            max_threshold: self.max_threshold.unwrap_or_default(),
            min_threshold: self.min_threshold.unwrap_or_default(),
            min_age_of_post_ms: self.min_age_of_post_ms.unwrap_or_default(),
            max_age_of_post_ms: self.max_age_of_post_ms.unwrap_or_default(),
            max_followers_allowed: self.max_followers_allowed.unwrap_or_default(),
        })
    }
}

/// Read an env var that may be absent; parse it when present.
/// A set-but-unparseable value is a configuration error, not a default.
fn optional_var<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("{name} is set but not a valid number: {raw:?}"))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}
