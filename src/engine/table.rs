// Windowed post table and hourly bucket index.
//
// The table is the authoritative working set: a post exists here while
// the engine is still deciding its fate or has promoted it and not yet
// evicted it. The bucket index is a fixed 24-slot ring keyed by
// hour-of-day; the slot that becomes current again after ~24 hours is
// flushed wholesale, which is what ages promoted posts out of the feed.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::db::models::PostRow;
use crate::firehose::ops::CreateOp;
use crate::firehose::records::PostRecord;

/// Retention window for the age sweep. Posts older than this are dropped
/// from the table whatever their promotion state.
pub const RETENTION_HOURS: i64 = 23;

/// One tracked post's state.
#[derive(Debug, Clone)]
pub struct TrackedPost {
    pub author: String,
    pub cid: String,
    pub reply_parent: Option<String>,
    pub reply_root: Option<String>,
    pub like_count: u32,
    /// True once the post has been included in the persisted feed
    pub promoted: bool,
    pub first_seen_at: DateTime<Utc>,
}

/// In-memory working set of posts under consideration, plus the hourly
/// promotion buckets that drive bulk eviction.
pub struct PostTable {
    posts: HashMap<String, TrackedPost>,
    buckets: [Vec<String>; 24],
    /// Hour-of-day slot currently accumulating promotions. Unset until
    /// the first rotation check observes a wall-clock hour.
    current_hour: Option<usize>,
}

impl Default for PostTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PostTable {
    pub fn new() -> Self {
        Self {
            posts: HashMap::new(),
            buckets: std::array::from_fn(|_| Vec::new()),
            current_hour: None,
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn get(&self, uri: &str) -> Option<&TrackedPost> {
        self.posts.get(uri)
    }

    /// Start tracking a post that passed the rejection filter.
    ///
    /// Replaying a create for a post already in the table is a no-op: the
    /// stream is at-least-once, and a replay must not reset the like count
    /// or the first-seen time.
    pub fn record_new_post(&mut self, create: &CreateOp<PostRecord>, now: DateTime<Utc>) {
        if self.posts.contains_key(&create.uri) {
            return;
        }
        let reply = create.record.reply.as_ref();
        self.posts.insert(
            create.uri.clone(),
            TrackedPost {
                author: create.author.clone(),
                cid: create.cid.clone(),
                reply_parent: reply.map(|r| r.parent.uri.clone()),
                reply_root: reply.map(|r| r.root.uri.clone()),
                like_count: 0,
                promoted: false,
                first_seen_at: now,
            },
        );
    }

    /// Count a like against a tracked post and return its updated state.
    /// Likes for posts the table doesn't know are ignored.
    pub fn record_like(&mut self, uri: &str) -> Option<&TrackedPost> {
        let post = self.posts.get_mut(uri)?;
        post.like_count += 1;
        Some(&*post)
    }

    /// Remove a post from the table. Returns the removed state so the
    /// caller can tell whether a persisted row needs deleting.
    pub fn evict(&mut self, uri: &str) -> Option<TrackedPost> {
        self.posts.remove(uri)
    }

    /// Mark a tracked post as promoted, add it to the current hourly
    /// bucket, and build the row to persist. Returns None if the post is
    /// unknown or already promoted.
    pub fn promote(&mut self, uri: &str, now: DateTime<Utc>) -> Option<PostRow> {
        let post = self.posts.get_mut(uri)?;
        if post.promoted {
            return None;
        }
        post.promoted = true;

        let row = PostRow {
            uri: uri.to_string(),
            cid: post.cid.clone(),
            reply_parent: post.reply_parent.clone(),
            reply_root: post.reply_root.clone(),
            indexed_at: now.to_rfc3339(),
        };

        let hour = self.current_hour.unwrap_or(now.hour() as usize);
        self.buckets[hour].push(uri.to_string());

        Some(row)
    }

    /// Check the wall-clock hour against the current slot.
    ///
    /// On a change, the bucket for the new hour value (promotions from
    /// roughly 24 hours ago) is flushed and returned as eviction
    /// candidates, and that slot starts accumulating the new cycle. The
    /// first observation just establishes the slot; there is nothing to
    /// flush yet.
    pub fn rotate_hour_if_needed(&mut self, now: DateTime<Utc>) -> Option<Vec<String>> {
        let hour = now.hour() as usize;
        match self.current_hour {
            Some(current) if current == hour => None,
            Some(_) => {
                let flushed = std::mem::take(&mut self.buckets[hour]);
                self.current_hour = Some(hour);
                Some(flushed)
            }
            None => {
                self.current_hour = Some(hour);
                Some(Vec::new())
            }
        }
    }

    /// Drop every post first seen more than `retention` ago, whatever its
    /// promotion state. Returns the removed (uri, was_promoted) pairs so
    /// the caller can emit deletions for rows already in the feed.
    pub fn sweep_older_than(
        &mut self,
        retention: Duration,
        now: DateTime<Utc>,
    ) -> Vec<(String, bool)> {
        let cutoff = now - retention;
        let stale: Vec<String> = self
            .posts
            .iter()
            .filter(|(_, post)| post.first_seen_at < cutoff)
            .map(|(uri, _)| uri.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|uri| {
                let post = self.posts.remove(&uri)?;
                Some((uri, post.promoted))
            })
            .collect()
    }
}
