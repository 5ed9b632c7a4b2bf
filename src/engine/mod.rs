// Curation engine — applies one operation batch to the working set and
// returns the resulting feed-index diff.
//
// Within a batch, deletes resolve first, then the hour rotation and age
// sweep, then post creates (through the rejection filter), then likes
// (through the threshold state machine). That order means no operation
// acts on a post before it exists in the table.

pub mod filter;
pub mod table;
pub mod threshold;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::bluesky::agent::AgentView;
use crate::bluesky::profiles::AuthorSnapshot;
use crate::config::{EngineSettings, FilterProfile};
use crate::db::models::PostRow;
use crate::firehose::ops::OperationBatch;

use self::filter::{FilterConfig, RejectionFilter};
use self::table::{PostTable, RETENTION_HOURS};
use self::threshold::{Thresholds, Transition};

/// The feed-index diff produced by one batch: rows to insert and post
/// identifiers to delete. The caller applies both to the store.
#[derive(Debug, Default)]
pub struct EngineOutput {
    pub to_insert: Vec<PostRow>,
    pub to_delete: Vec<String>,
}

/// Result of the promotion-time label re-check.
enum LabelVerdict {
    Clean,
    Labeled { author: String },
}

/// The curation engine: windowed post table, hourly buckets, rejection
/// filter, and threshold policy behind a single `apply` entry point.
///
/// All state is owned here; callers hold the one instance and feed it
/// batches in arrival order.
pub struct CurationEngine {
    thresholds: Thresholds,
    filter: RejectionFilter,
    table: PostTable,
    agent: Option<Arc<dyn AgentView>>,
}

impl CurationEngine {
    pub fn new(
        settings: &EngineSettings,
        filter_config: FilterConfig,
        agent: Option<Arc<dyn AgentView>>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            thresholds: Thresholds::from_settings(settings),
            filter: RejectionFilter::new(filter_config)?,
            table: PostTable::new(),
            agent,
        })
    }

    /// Number of posts currently tracked.
    pub fn tracked_posts(&self) -> usize {
        self.table.len()
    }

    /// Apply one operation batch and return the feed-index diff.
    ///
    /// Never fails: decode problems were already handled at the transport
    /// boundary, and lookup failures degrade to the no-agent policy for
    /// the single post involved.
    pub async fn apply(&mut self, batch: &OperationBatch, now: DateTime<Utc>) -> EngineOutput {
        let mut output = EngineOutput::default();

        // 1. Explicit deletes. Promoted posts need their row removed;
        //    everything else is silently forgotten.
        for delete in &batch.posts.deletes {
            if let Some(post) = self.table.evict(&delete.uri) {
                if post.promoted {
                    output.to_delete.push(delete.uri.clone());
                }
            }
        }

        // 2. Hour rotation: flush the returning slot's old cohort, then
        //    sweep everything past the retention window.
        if let Some(flushed) = self.table.rotate_hour_if_needed(now) {
            if !flushed.is_empty() {
                info!(count = flushed.len(), "hourly bucket flushed");
            }
            output.to_delete.extend(flushed);

            let swept = self
                .table
                .sweep_older_than(Duration::hours(RETENTION_HOURS), now);
            for (uri, was_promoted) in swept {
                debug!(uri = %uri, promoted = was_promoted, "swept stale post");
                if was_promoted {
                    output.to_delete.push(uri);
                }
            }
        }

        // 3. Post creates, through the rejection filter.
        for create in &batch.posts.creates {
            // Registered authors are rejected before any lookup
            if self.filter.is_registered(&create.author) {
                continue;
            }

            let author = self.author_snapshot(&create.author).await;
            if let Some(rejection) = self.filter.evaluate(create, author.as_ref()) {
                debug!(uri = %create.uri, reason = ?rejection, "rejected post");
                continue;
            }

            self.table.record_new_post(create, now);
        }

        // 4. Likes, through the threshold state machine.
        for like in &batch.likes.creates {
            let uri = &like.record.subject.uri;
            let transition = match self.table.record_like(uri) {
                Some(post) => self.thresholds.on_like(post, now),
                None => continue,
            };

            match transition {
                Transition::Hold => {}
                Transition::Evict => {
                    self.table.evict(uri);
                    output.to_delete.push(uri.clone());
                }
                Transition::Promote => match self.label_verdict(uri).await {
                    LabelVerdict::Clean => {
                        if let Some(row) = self.table.promote(uri, now) {
                            info!(uri = %uri, "post promoted into feed");
                            output.to_insert.push(row);
                        }
                    }
                    LabelVerdict::Labeled { author } => {
                        self.table.evict(uri);
                        info!(uri = %uri, author = %author, "labeled post dropped, author rejected");
                        self.filter.register(&author);
                    }
                },
            }
        }

        // The bucket flush and the sweep can both name the same post;
        // the store only needs to hear about it once.
        let mut seen = HashSet::new();
        output.to_delete.retain(|uri| seen.insert(uri.clone()));

        output
    }

    /// Fetch an author snapshot if a lookup collaborator is available.
    /// A failed lookup degrades to "no data" for this one post.
    async fn author_snapshot(&self, did: &str) -> Option<AuthorSnapshot> {
        let agent = self.agent.as_ref()?;
        match agent.author_snapshot(did).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(did = %did, error = %e, "profile lookup failed, skipping author checks");
                None
            }
        }
    }

    /// Re-fetch a promotion candidate to read its moderation labels.
    /// No collaborator, a failed fetch, or a missing post all count as
    /// insufficient data and let the promotion proceed.
    async fn label_verdict(&self, uri: &str) -> LabelVerdict {
        let Some(agent) = self.agent.as_ref() else {
            return LabelVerdict::Clean;
        };

        let uris = [uri.to_string()];
        match agent.fetch_posts(&uris).await {
            Ok(posts) => match posts.iter().find(|p| p.uri == uri) {
                Some(fetched) if !filter::passes_label_check(fetched) => LabelVerdict::Labeled {
                    author: fetched.author_did.clone(),
                },
                _ => LabelVerdict::Clean,
            },
            Err(e) => {
                warn!(uri = %uri, error = %e, "label check fetch failed, promoting anyway");
                LabelVerdict::Clean
            }
        }
    }
}

/// Build the filter configuration for the chosen profile from loaded
/// settings.
pub fn filter_config(
    profile: FilterProfile,
    settings: &EngineSettings,
    min_author_posts: i64,
    reject_languages: Vec<String>,
) -> FilterConfig {
    FilterConfig {
        profile,
        max_followers_allowed: settings.max_followers_allowed,
        min_author_posts,
        reject_languages,
    }
}
