// Threshold state machine — the per-like promotion/eviction decision.
//
// A tracked post moves SEEN -> PROMOTED -> EVICTED and nothing else.
// Comparisons are strict (>) on the lower like bound and inclusive (<=)
// on the upper, and the age window is inclusive at both ends.

use chrono::{DateTime, Duration, Utc};

use super::table::TrackedPost;
use crate::config::EngineSettings;

/// Like-count and age bounds for promotion into the feed.
#[derive(Debug, Clone)]
pub struct Thresholds {
    pub min_likes: u32,
    pub max_likes: u32,
    pub min_age: Duration,
    pub max_age: Duration,
}

impl Thresholds {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            min_likes: settings.min_threshold,
            max_likes: settings.max_threshold,
            min_age: Duration::milliseconds(settings.min_age_of_post_ms),
            max_age: Duration::milliseconds(settings.max_age_of_post_ms),
        }
    }
}

/// What a like event does to a tracked post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Keep tracking, nothing changes
    Hold,
    /// Candidate for the feed, pending the label re-check
    Promote,
    /// Too popular: drop from the feed and forget
    Evict,
}

impl Thresholds {
    /// Decide the transition for a post whose like count was just
    /// incremented. Eviction is checked first: a promoted post that
    /// crosses the upper bound leaves regardless of age.
    pub fn on_like(&self, post: &TrackedPost, now: DateTime<Utc>) -> Transition {
        if post.promoted {
            if post.like_count > self.max_likes {
                return Transition::Evict;
            }
            return Transition::Hold;
        }

        let in_like_window = post.like_count > self.min_likes && post.like_count <= self.max_likes;
        let age = now - post.first_seen_at;
        let in_age_window = age >= self.min_age && age <= self.max_age;

        if in_like_window && in_age_window {
            Transition::Promote
        } else {
            Transition::Hold
        }
    }
}
