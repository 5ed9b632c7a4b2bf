// Commit events and operation batches.
//
// A commit event is one repo's set of record creates/deletes at a point
// in the stream. batch_from_commit sorts its ops into the four typed
// groups the engine understands; a record that fails to decode skips
// that single operation, never the batch.

use serde::Deserialize;
use tracing::debug;

use super::records::{
    self, FollowRecord, LikeRecord, PostRecord, Record, RepostRecord,
};

/// One commit event from the subscription stream.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitEvent {
    /// DID of the repository (the author of every op in this event)
    pub repo: String,
    /// Stream sequence number, used as the resumption cursor
    pub seq: i64,
    #[serde(default)]
    pub time: Option<String>,
    pub ops: Vec<RepoOp>,
}

/// A single repo operation within a commit event.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoOp {
    /// "create", "delete", or "update"
    pub action: String,
    /// "<collection>/<rkey>"
    pub path: String,
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub record: Option<serde_json::Value>,
}

/// A create operation with its decoded record.
#[derive(Debug, Clone)]
pub struct CreateOp<R> {
    pub uri: String,
    pub cid: String,
    /// DID of the authoring repo
    pub author: String,
    pub record: R,
}

/// A delete operation carries only the identifier.
#[derive(Debug, Clone)]
pub struct DeleteOp {
    pub uri: String,
}

/// Creates and deletes for one record collection.
#[derive(Debug, Clone)]
pub struct OpGroup<R> {
    pub creates: Vec<CreateOp<R>>,
    pub deletes: Vec<DeleteOp>,
}

// Derived Default would demand R: Default for no reason
impl<R> Default for OpGroup<R> {
    fn default() -> Self {
        Self {
            creates: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

/// The unit of work delivered to the engine per commit event.
///
/// The engine consumes posts and likes; reposts and follows are decoded
/// for transport completeness and ignored downstream.
#[derive(Debug, Clone, Default)]
pub struct OperationBatch {
    pub posts: OpGroup<PostRecord>,
    pub reposts: OpGroup<RepostRecord>,
    pub likes: OpGroup<LikeRecord>,
    pub follows: OpGroup<FollowRecord>,
}

/// Sort a commit event's ops into typed operation groups.
pub fn batch_from_commit(evt: &CommitEvent) -> OperationBatch {
    let mut batch = OperationBatch::default();

    for op in &evt.ops {
        let uri = format!("at://{}/{}", evt.repo, op.path);
        let collection = op.path.split('/').next().unwrap_or_default();

        match op.action.as_str() {
            // updates not supported yet
            "update" => continue,

            "create" => {
                let (Some(cid), Some(value)) = (&op.cid, &op.record) else {
                    debug!(uri = %uri, "create op missing cid or record, skipped");
                    continue;
                };
                let record = match records::decode_record(collection, value) {
                    Ok(record) => record,
                    Err(e) => {
                        debug!(uri = %uri, error = %e, "skipped undecodable record");
                        continue;
                    }
                };
                let cid = cid.clone();
                let author = evt.repo.clone();
                match record {
                    Record::Post(record) => batch.posts.creates.push(CreateOp {
                        uri,
                        cid,
                        author,
                        record,
                    }),
                    Record::Repost(record) => batch.reposts.creates.push(CreateOp {
                        uri,
                        cid,
                        author,
                        record,
                    }),
                    Record::Like(record) => batch.likes.creates.push(CreateOp {
                        uri,
                        cid,
                        author,
                        record,
                    }),
                    Record::Follow(record) => batch.follows.creates.push(CreateOp {
                        uri,
                        cid,
                        author,
                        record,
                    }),
                }
            }

            "delete" => {
                let deletes = match collection {
                    records::POST_COLLECTION => &mut batch.posts.deletes,
                    records::REPOST_COLLECTION => &mut batch.reposts.deletes,
                    records::LIKE_COLLECTION => &mut batch.likes.deletes,
                    records::FOLLOW_COLLECTION => &mut batch.follows.deletes,
                    _ => continue,
                };
                deletes.push(DeleteOp { uri });
            }

            other => {
                debug!(action = other, "unrecognized op action, skipped");
            }
        }
    }

    batch
}
