// Rejection filter — moderation/quality heuristics for incoming posts.
//
// Candidate posts pass through an ordered list of checks; the first hit
// rejects. Author-level verdicts (follower cap, viewer relation, profile
// terms, language) are remembered in the registry for the life of the
// process, so that author's later posts are rejected without another
// lookup. Post-level verdicts (new author, reply, content patterns) are
// re-evaluated on every post.

use std::collections::HashSet;

use anyhow::{Context, Result};
use regex_lite::Regex;

use crate::bluesky::posts::FetchedPost;
use crate::bluesky::profiles::AuthorSnapshot;
use crate::config::FilterProfile;
use crate::firehose::ops::CreateOp;
use crate::firehose::records::PostRecord;

/// Explicit/NSFW markers looked for in author profile descriptions.
const FORBIDDEN_TERMS: &str = r"(?i)nsfw|🔞|🦊|fursuit|furry|anthro|ffxiv|boobs|onlyfans|only\s*fans|of\s*model|pervert|himbo|\bdni\b|transformation|paws|lewd|18\+|\+18|shirtless|thirst|\bfur\b|daddy|nudist|\bsub\b|subby|\bdom\b|domme|masochist|horny|porn|penis|cock|tits|nude|suggestive|no\s*minors";

/// Hashtags that disqualify a post outright.
const DISALLOWED_HASHTAGS: &str = r"(?i)#bondage|#bdsm|#nsfw|#gay|#yiff|#dirtypaws|#anthro|#porn";

/// Any hashtag containing "fur".
const FUR_HASHTAG: &str = r"(?i)#\S*fur";

/// Why a post was rejected. The author-level reasons add the author to
/// the registry; the post-level ones don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Author was rejected before; no further checks run
    RegisteredAuthor,
    TooManyFollowers,
    /// Author is muted by, or has blocked, the configured viewer
    ViewerRelation,
    /// Profile description matched the forbidden-terms pattern
    ProfileTerms,
    /// Post text's detected language is on the reject list
    Language,
    /// Author hasn't posted enough yet (anti-spam)
    NewAuthor,
    /// The feed is root-posts-only
    Reply,
    /// Disallowed hashtags or boilerplate post text
    ContentPattern,
}

impl Rejection {
    /// Whether this verdict is author-level and permanent.
    pub fn registers_author(self) -> bool {
        matches!(
            self,
            Rejection::TooManyFollowers
                | Rejection::ViewerRelation
                | Rejection::ProfileTerms
                | Rejection::Language
        )
    }
}

/// Thresholds and lists the filter evaluates against.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub profile: FilterProfile,
    pub max_followers_allowed: i64,
    pub min_author_posts: i64,
    /// ISO 639-3 codes, lowercase
    pub reject_languages: Vec<String>,
}

/// The rejection filter plus the process-wide registry of rejected
/// authors.
pub struct RejectionFilter {
    config: FilterConfig,
    registry: HashSet<String>,
    forbidden_terms: Regex,
    disallowed_hashtags: Regex,
    fur_hashtag: Regex,
}

impl RejectionFilter {
    pub fn new(config: FilterConfig) -> Result<Self> {
        Ok(Self {
            config,
            registry: HashSet::new(),
            forbidden_terms: Regex::new(FORBIDDEN_TERMS)
                .context("Failed to compile forbidden-terms pattern")?,
            disallowed_hashtags: Regex::new(DISALLOWED_HASHTAGS)
                .context("Failed to compile hashtag pattern")?,
            fur_hashtag: Regex::new(FUR_HASHTAG)
                .context("Failed to compile fur-hashtag pattern")?,
        })
    }

    /// Whether an author has been permanently rejected.
    pub fn is_registered(&self, did: &str) -> bool {
        self.registry.contains(did)
    }

    /// Permanently reject an author for the life of the process.
    pub fn register(&mut self, did: &str) {
        self.registry.insert(did.to_string());
    }

    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    /// Evaluate a candidate post. Returns the first matching rejection,
    /// or None to keep. Author-level rejections are recorded in the
    /// registry as a side effect.
    ///
    /// `author` is None when no lookup collaborator is available (or the
    /// lookup failed); the author-based checks are skipped in that case.
    pub fn evaluate(
        &mut self,
        post: &CreateOp<PostRecord>,
        author: Option<&AuthorSnapshot>,
    ) -> Option<Rejection> {
        let rejection = self.decide(post, author);
        if let Some(rejection) = rejection {
            if rejection.registers_author() {
                self.register(&post.author);
            }
        }
        rejection
    }

    fn decide(
        &self,
        post: &CreateOp<PostRecord>,
        author: Option<&AuthorSnapshot>,
    ) -> Option<Rejection> {
        if self.registry.contains(&post.author) {
            return Some(Rejection::RegisteredAuthor);
        }

        if self.config.profile == FilterProfile::Minimal {
            // Reply-only filter: no lookups, no text heuristics
            if post.record.reply.is_some() {
                return Some(Rejection::Reply);
            }
            return None;
        }

        if let Some(author) = author {
            if author.follower_count > self.config.max_followers_allowed {
                return Some(Rejection::TooManyFollowers);
            }
            if author.viewer_muted || author.viewer_blocked_by {
                return Some(Rejection::ViewerRelation);
            }
            if let Some(description) = &author.description {
                if self.forbidden_terms.is_match(description) {
                    return Some(Rejection::ProfileTerms);
                }
            }
        }

        if self.rejects_language(&post.record.text) {
            return Some(Rejection::Language);
        }

        if let Some(author) = author {
            if author.post_count < self.config.min_author_posts {
                return Some(Rejection::NewAuthor);
            }
        }

        if post.record.reply.is_some() {
            return Some(Rejection::Reply);
        }

        if self.rejects_content(&post.record.text) {
            return Some(Rejection::ContentPattern);
        }

        None
    }

    fn rejects_language(&self, text: &str) -> bool {
        if self.config.reject_languages.is_empty() {
            return false;
        }
        match whatlang::detect_lang(text) {
            Some(lang) => self
                .config
                .reject_languages
                .iter()
                .any(|code| code == lang.code()),
            None => false,
        }
    }

    fn rejects_content(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        lower.contains("hello world")
            || lower.contains("hello, world")
            || self.fur_hashtag.is_match(text)
            || self.disallowed_hashtags.is_match(text)
    }
}

/// Late-stage re-validation of a promotion candidate against moderation
/// labels fetched at promotion time. Any label at all aborts the
/// promotion.
pub fn passes_label_check(fetched: &FetchedPost) -> bool {
    fetched.labels.is_empty()
}
