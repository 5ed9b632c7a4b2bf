// Engine tests — batch processing through the curation engine.
//
// Covers the threshold state machine end to end (track, promote, evict),
// the hourly rotation and 23-hour sweep, the label re-check with a mock
// lookup collaborator, and the at-least-once replay properties.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use lukewarm::bluesky::agent::AgentView;
use lukewarm::bluesky::posts::FetchedPost;
use lukewarm::bluesky::profiles::AuthorSnapshot;
use lukewarm::config::{EngineSettings, FilterProfile};
use lukewarm::engine::filter::FilterConfig;
use lukewarm::engine::CurationEngine;
use lukewarm::firehose::ops::{CreateOp, DeleteOp, OperationBatch};
use lukewarm::firehose::records::{LikeRecord, PostRecord, StrongRef};

// ============================================================
// Test fixtures
// ============================================================

fn settings() -> EngineSettings {
    EngineSettings {
        max_threshold: 10,
        min_threshold: 3,
        min_age_of_post_ms: 0,
        max_age_of_post_ms: 8 * 60 * 60 * 1000,
        max_followers_allowed: 10_000,
    }
}

fn filter_config(profile: FilterProfile) -> FilterConfig {
    FilterConfig {
        profile,
        max_followers_allowed: 10_000,
        min_author_posts: 4,
        reject_languages: Vec::new(),
    }
}

/// Engine with no lookup collaborator: author checks and the label
/// re-check are skipped, which keeps most tests synchronous in spirit.
fn bare_engine() -> CurationEngine {
    CurationEngine::new(&settings(), filter_config(FilterProfile::Strict), None).unwrap()
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
}

fn next_day(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 2, hour, minute, 0).unwrap()
}

fn post_uri(n: u32) -> String {
    format!("at://did:plc:author/app.bsky.feed.post/{n}")
}

fn create_batch(uri: &str, author: &str) -> OperationBatch {
    let mut batch = OperationBatch::default();
    batch.posts.creates.push(CreateOp {
        uri: uri.to_string(),
        cid: "bafyexample".to_string(),
        author: author.to_string(),
        record: PostRecord {
            text: "an unremarkable post about gardening".to_string(),
            reply: None,
            langs: None,
            created_at: "2024-06-01T12:00:00Z".to_string(),
        },
    });
    batch
}

fn likes_batch(uri: &str, count: usize) -> OperationBatch {
    let mut batch = OperationBatch::default();
    for n in 0..count {
        batch.likes.creates.push(CreateOp {
            uri: format!("at://did:plc:liker/app.bsky.feed.like/{n}"),
            cid: "bafylike".to_string(),
            author: "did:plc:liker".to_string(),
            record: LikeRecord {
                subject: StrongRef {
                    uri: uri.to_string(),
                    cid: "bafyexample".to_string(),
                },
                created_at: "2024-06-01T12:00:00Z".to_string(),
            },
        });
    }
    batch
}

fn delete_batch(uri: &str) -> OperationBatch {
    let mut batch = OperationBatch::default();
    batch.posts.deletes.push(DeleteOp {
        uri: uri.to_string(),
    });
    batch
}

// ============================================================
// Mock lookup collaborator
// ============================================================

#[derive(Default)]
struct MockAgent {
    profiles: HashMap<String, AuthorSnapshot>,
    /// URIs that come back carrying a moderation label
    labeled: HashSet<String>,
    profile_calls: Mutex<Vec<String>>,
}

impl MockAgent {
    fn with_profile(mut self, snapshot: AuthorSnapshot) -> Self {
        self.profiles.insert(snapshot.did.clone(), snapshot);
        self
    }

    fn with_label(mut self, uri: &str) -> Self {
        self.labeled.insert(uri.to_string());
        self
    }

    fn profile_call_count(&self) -> usize {
        self.profile_calls.lock().unwrap().len()
    }
}

fn snapshot(did: &str) -> AuthorSnapshot {
    AuthorSnapshot {
        did: did.to_string(),
        follower_count: 200,
        post_count: 50,
        description: Some("gardening and long walks".to_string()),
        viewer_muted: false,
        viewer_blocked_by: false,
    }
}

#[async_trait]
impl AgentView for MockAgent {
    async fn author_snapshot(&self, did: &str) -> Result<AuthorSnapshot> {
        self.profile_calls.lock().unwrap().push(did.to_string());
        self.profiles
            .get(did)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("profile unavailable"))
    }

    async fn fetch_posts(&self, uris: &[String]) -> Result<Vec<FetchedPost>> {
        Ok(uris
            .iter()
            .map(|uri| FetchedPost {
                uri: uri.clone(),
                author_did: "did:plc:author".to_string(),
                labels: if self.labeled.contains(uri) {
                    vec!["rude".to_string()]
                } else {
                    Vec::new()
                },
            })
            .collect())
    }
}

// ============================================================
// Tracking and like counting
// ============================================================

#[tokio::test]
async fn likes_accumulate_one_per_event() {
    let mut engine = bare_engine();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;
    engine.apply(&likes_batch(&uri, 2), at(12, 5)).await;
    let out = engine.apply(&likes_batch(&uri, 1), at(12, 6)).await;

    // 3 likes: still at the threshold, not over it
    assert!(out.to_insert.is_empty());
    assert!(out.to_delete.is_empty());
    assert_eq!(engine.tracked_posts(), 1);
}

#[tokio::test]
async fn likes_for_untracked_posts_are_ignored() {
    let mut engine = bare_engine();
    let out = engine.apply(&likes_batch(&post_uri(9), 5), at(12, 0)).await;
    assert!(out.to_insert.is_empty());
    assert!(out.to_delete.is_empty());
    assert_eq!(engine.tracked_posts(), 0);
}

#[tokio::test]
async fn replayed_create_does_not_reset_state() {
    let mut engine = bare_engine();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;
    engine.apply(&likes_batch(&uri, 3), at(12, 5)).await;
    // The stream is at-least-once: the same create arrives again
    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 10)).await;

    // One more like crosses the threshold; a reset count would need four
    let out = engine.apply(&likes_batch(&uri, 1), at(12, 15)).await;
    assert_eq!(out.to_insert.len(), 1);
}

// ============================================================
// Promotion
// ============================================================

#[tokio::test]
async fn crossing_threshold_promotes_with_projected_row() {
    let mut engine = bare_engine();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;
    let out = engine.apply(&likes_batch(&uri, 5), at(12, 30)).await;

    assert_eq!(out.to_insert.len(), 1);
    let row = &out.to_insert[0];
    assert_eq!(row.uri, uri);
    assert_eq!(row.cid, "bafyexample");
    assert_eq!(row.reply_parent, None);
    assert_eq!(row.reply_root, None);
    assert_eq!(row.indexed_at, at(12, 30).to_rfc3339());
    assert!(out.to_delete.is_empty());
}

#[tokio::test]
async fn promotion_happens_at_most_once() {
    let mut engine = bare_engine();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;
    let first = engine.apply(&likes_batch(&uri, 5), at(12, 30)).await;
    let second = engine.apply(&likes_batch(&uri, 2), at(12, 40)).await;

    assert_eq!(first.to_insert.len(), 1);
    assert!(second.to_insert.is_empty());
    assert!(second.to_delete.is_empty());
}

#[tokio::test]
async fn too_old_post_is_never_promoted() {
    let mut engine = CurationEngine::new(
        &EngineSettings {
            max_age_of_post_ms: 60 * 60 * 1000,
            ..settings()
        },
        filter_config(FilterProfile::Strict),
        None,
    )
    .unwrap();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(10, 0)).await;
    // Two hours later: outside the one-hour age window
    let out = engine.apply(&likes_batch(&uri, 5), at(12, 0)).await;

    assert!(out.to_insert.is_empty());
    // Still tracked: age only gates promotion, not tracking
    assert_eq!(engine.tracked_posts(), 1);
}

#[tokio::test]
async fn too_young_post_is_not_promoted_yet() {
    let mut engine = CurationEngine::new(
        &EngineSettings {
            min_age_of_post_ms: 30 * 60 * 1000,
            ..settings()
        },
        filter_config(FilterProfile::Strict),
        None,
    )
    .unwrap();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;
    let early = engine.apply(&likes_batch(&uri, 5), at(12, 10)).await;
    assert!(early.to_insert.is_empty());

    // Old enough now; the next like re-evaluates and promotes
    let later = engine.apply(&likes_batch(&uri, 1), at(12, 45)).await;
    assert_eq!(later.to_insert.len(), 1);
}

// ============================================================
// Eviction
// ============================================================

#[tokio::test]
async fn exceeding_max_threshold_evicts_promoted_post() {
    let mut engine = bare_engine();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;
    engine.apply(&likes_batch(&uri, 5), at(12, 30)).await;
    // 5 -> 11 likes crosses max_threshold = 10
    let out = engine.apply(&likes_batch(&uri, 6), at(13, 0)).await;

    assert_eq!(out.to_delete, vec![uri.clone()]);
    assert!(out.to_insert.is_empty());
    assert_eq!(engine.tracked_posts(), 0);

    // The post is terminally forgotten: more likes do nothing
    let after = engine.apply(&likes_batch(&uri, 1), at(13, 5)).await;
    assert!(after.to_delete.is_empty());
}

#[tokio::test]
async fn never_promoted_post_is_not_deleted_on_max_crossing() {
    // A post that shoots straight past the window without ever being
    // promoted just stops being eligible; nothing is emitted for it.
    let mut engine = CurationEngine::new(
        &EngineSettings {
            min_age_of_post_ms: 30 * 60 * 1000,
            ..settings()
        },
        filter_config(FilterProfile::Strict),
        None,
    )
    .unwrap();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;
    // 12 likes arrive while the post is still too young to promote
    let out = engine.apply(&likes_batch(&uri, 12), at(12, 5)).await;

    assert!(out.to_insert.is_empty());
    assert!(out.to_delete.is_empty());
}

#[tokio::test]
async fn explicit_delete_of_promoted_post_emits_deletion() {
    let mut engine = bare_engine();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;
    engine.apply(&likes_batch(&uri, 5), at(12, 30)).await;
    let out = engine.apply(&delete_batch(&uri), at(12, 40)).await;

    assert_eq!(out.to_delete, vec![uri]);
    assert_eq!(engine.tracked_posts(), 0);
}

#[tokio::test]
async fn explicit_delete_of_tracked_post_is_silent() {
    let mut engine = bare_engine();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;
    let out = engine.apply(&delete_batch(&uri), at(12, 10)).await;

    assert!(out.to_delete.is_empty());
    assert_eq!(engine.tracked_posts(), 0);
}

#[tokio::test]
async fn explicit_delete_of_unknown_post_is_a_no_op() {
    let mut engine = bare_engine();
    let out = engine.apply(&delete_batch(&post_uri(404)), at(12, 0)).await;
    assert!(out.to_delete.is_empty());
}

#[tokio::test]
async fn delete_resolves_before_create_in_same_batch() {
    let mut engine = bare_engine();
    let uri = post_uri(1);
    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;

    // One batch carrying both the delete and a re-create: the delete
    // applies to the old incarnation first, then tracking starts fresh.
    let mut batch = create_batch(&uri, "did:plc:author");
    batch.posts.deletes.push(DeleteOp { uri: uri.clone() });
    engine.apply(&batch, at(12, 30)).await;

    assert_eq!(engine.tracked_posts(), 1);
}

// ============================================================
// Hour rotation and the 23-hour sweep
// ============================================================

#[tokio::test]
async fn bucket_flush_evicts_day_old_promotions() {
    let mut engine = bare_engine();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(2, 0)).await;
    engine.apply(&likes_batch(&uri, 5), at(2, 30)).await;
    // An uneventful batch in a later hour moves the current slot along
    engine.apply(&OperationBatch::default(), at(5, 0)).await;

    // The clock comes back around to hour 2: the bucket holding the
    // promotion is flushed (and the sweep catches it too; the diff
    // names it once).
    let out = engine
        .apply(&OperationBatch::default(), next_day(2, 10))
        .await;

    assert_eq!(out.to_delete, vec![uri]);
    assert_eq!(engine.tracked_posts(), 0);
}

#[tokio::test]
async fn sweep_silently_forgets_never_promoted_posts() {
    let mut engine = bare_engine();
    let uri = post_uri(1);

    // Created at hour 2, no likes ever
    engine.apply(&create_batch(&uri, "did:plc:author"), at(2, 0)).await;

    // 23+ hours later the sweep drops it without any output
    let out = engine
        .apply(&OperationBatch::default(), next_day(1, 30))
        .await;

    assert!(out.to_insert.is_empty());
    assert!(out.to_delete.is_empty());
    assert_eq!(engine.tracked_posts(), 0);
}

#[tokio::test]
async fn sweep_emits_deletion_for_promoted_posts() {
    let mut engine = bare_engine();
    let uri = post_uri(1);

    engine.apply(&create_batch(&uri, "did:plc:author"), at(2, 0)).await;
    engine.apply(&likes_batch(&uri, 5), at(2, 30)).await;

    // Hour 1 next day: the hour-1 bucket is empty, so only the sweep
    // can name this post, and it must, or the feed row would be
    // stranded until the hour-2 flush.
    let out = engine
        .apply(&OperationBatch::default(), next_day(1, 30))
        .await;

    assert_eq!(out.to_delete, vec![uri]);
    assert_eq!(engine.tracked_posts(), 0);
}

#[tokio::test]
async fn rotation_is_deterministic_for_a_fixed_schedule() {
    // Two engines fed the identical (time, batch) sequence produce the
    // identical diffs.
    let run = |mut engine: CurationEngine| async move {
        let uri = post_uri(1);
        let mut outputs = Vec::new();
        engine.apply(&create_batch(&uri, "did:plc:author"), at(2, 0)).await;
        outputs.push(engine.apply(&likes_batch(&uri, 5), at(2, 30)).await);
        outputs.push(engine.apply(&OperationBatch::default(), at(3, 0)).await);
        outputs.push(
            engine
                .apply(&OperationBatch::default(), next_day(2, 0))
                .await,
        );
        outputs
            .into_iter()
            .map(|o| (o.to_insert, o.to_delete))
            .collect::<Vec<_>>()
    };

    let first = run(bare_engine()).await;
    let second = run(bare_engine()).await;
    assert_eq!(first, second);
}

// ============================================================
// Rejection filter wiring
// ============================================================

#[tokio::test]
async fn over_cap_author_never_enters_table_and_skips_later_lookups() {
    let agent = Arc::new(
        MockAgent::default().with_profile(AuthorSnapshot {
            follower_count: 50_000,
            ..snapshot("did:plc:famous")
        }),
    );
    let mut engine = CurationEngine::new(
        &settings(),
        filter_config(FilterProfile::Strict),
        Some(agent.clone()),
    )
    .unwrap();

    let first = post_uri(1);
    engine.apply(&create_batch(&first, "did:plc:famous"), at(12, 0)).await;
    assert_eq!(engine.tracked_posts(), 0);

    // Likes for the rejected post go nowhere
    let out = engine.apply(&likes_batch(&first, 5), at(12, 30)).await;
    assert!(out.to_insert.is_empty());

    // The author is registered: the second post triggers no lookup
    engine
        .apply(&create_batch(&post_uri(2), "did:plc:famous"), at(13, 0))
        .await;
    assert_eq!(engine.tracked_posts(), 0);
    assert_eq!(agent.profile_call_count(), 1);
}

#[tokio::test]
async fn failed_profile_lookup_falls_back_to_keeping_the_post() {
    // No profile configured in the mock: the lookup errors, the author
    // checks are skipped for this post, and tracking proceeds.
    let agent = Arc::new(MockAgent::default());
    let mut engine = CurationEngine::new(
        &settings(),
        filter_config(FilterProfile::Strict),
        Some(agent),
    )
    .unwrap();

    engine
        .apply(&create_batch(&post_uri(1), "did:plc:unknown"), at(12, 0))
        .await;
    assert_eq!(engine.tracked_posts(), 1);
}

// ============================================================
// Label re-check at promotion time
// ============================================================

#[tokio::test]
async fn labeled_post_is_dropped_instead_of_promoted() {
    let uri = post_uri(1);
    let agent = Arc::new(
        MockAgent::default()
            .with_profile(snapshot("did:plc:author"))
            .with_label(&uri),
    );
    let mut engine = CurationEngine::new(
        &settings(),
        filter_config(FilterProfile::Strict),
        Some(agent),
    )
    .unwrap();

    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;
    let out = engine.apply(&likes_batch(&uri, 5), at(12, 30)).await;

    // Never promoted, never inserted, gone from the table
    assert!(out.to_insert.is_empty());
    assert!(out.to_delete.is_empty());
    assert_eq!(engine.tracked_posts(), 0);

    // And the author is now registered: their next post is rejected
    engine
        .apply(&create_batch(&post_uri(2), "did:plc:author"), at(13, 0))
        .await;
    assert_eq!(engine.tracked_posts(), 0);
}

#[tokio::test]
async fn clean_label_check_promotes() {
    let uri = post_uri(1);
    let agent = Arc::new(MockAgent::default().with_profile(snapshot("did:plc:author")));
    let mut engine = CurationEngine::new(
        &settings(),
        filter_config(FilterProfile::Strict),
        Some(agent),
    )
    .unwrap();

    engine.apply(&create_batch(&uri, "did:plc:author"), at(12, 0)).await;
    let out = engine.apply(&likes_batch(&uri, 5), at(12, 30)).await;

    assert_eq!(out.to_insert.len(), 1);
    assert_eq!(out.to_insert[0].uri, uri);
}

// ============================================================
// Same-batch properties
// ============================================================

#[tokio::test]
async fn same_batch_insert_and_delete_only_via_prior_promotion() {
    let mut engine = bare_engine();
    let promoted = post_uri(1);
    let rising = post_uri(2);

    engine
        .apply(&create_batch(&promoted, "did:plc:author"), at(12, 0))
        .await;
    engine.apply(&likes_batch(&promoted, 5), at(12, 10)).await;
    engine
        .apply(&create_batch(&rising, "did:plc:author"), at(12, 20))
        .await;

    // One batch: the promoted post blows past max, the rising post
    // crosses min. The deletion refers to the earlier promotion only.
    let mut batch = likes_batch(&promoted, 6);
    batch
        .likes
        .creates
        .extend(likes_batch(&rising, 5).likes.creates);
    let out = engine.apply(&batch, at(12, 30)).await;

    assert_eq!(out.to_delete, vec![promoted]);
    assert_eq!(out.to_insert.len(), 1);
    assert_eq!(out.to_insert[0].uri, rising);
}
