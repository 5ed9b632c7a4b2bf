// Record schemas — the four known lexicons, decoded into a tagged union.
//
// Commit events carry records as loose JSON. Each record is validated
// against the schema its collection implies; anything unknown or
// malformed becomes a DecodeError so a single bad record skips one
// operation instead of aborting the batch.

use std::fmt;

use serde::Deserialize;

pub const POST_COLLECTION: &str = "app.bsky.feed.post";
pub const REPOST_COLLECTION: &str = "app.bsky.feed.repost";
pub const LIKE_COLLECTION: &str = "app.bsky.feed.like";
pub const FOLLOW_COLLECTION: &str = "app.bsky.graph.follow";

/// A reference to another record by URI and content id.
#[derive(Debug, Clone, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

/// Parent and root references carried by reply posts.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRefs {
    pub parent: StrongRef,
    pub root: StrongRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reply: Option<ReplyRefs>,
    #[serde(default)]
    pub langs: Option<Vec<String>>,
    #[serde(default, rename = "createdAt")]
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepostRecord {
    pub subject: StrongRef,
    #[serde(default, rename = "createdAt")]
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikeRecord {
    pub subject: StrongRef,
    #[serde(default, rename = "createdAt")]
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowRecord {
    /// DID of the followed account
    pub subject: String,
    #[serde(default, rename = "createdAt")]
    pub created_at: String,
}

/// A decoded record, tagged by the collection it came from.
#[derive(Debug, Clone)]
pub enum Record {
    Post(PostRecord),
    Repost(RepostRecord),
    Like(LikeRecord),
    Follow(FollowRecord),
}

/// Why a record failed to decode. Carried as a value, never thrown past
/// batch processing.
#[derive(Debug)]
pub enum DecodeError {
    /// The collection is not one of the four known lexicons
    UnknownCollection(String),
    /// The record's $type disagrees with the collection it was filed under
    TypeMismatch { collection: String, found: String },
    /// The record doesn't match its collection's schema
    Invalid {
        collection: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownCollection(c) => write!(f, "unknown collection {c}"),
            DecodeError::TypeMismatch { collection, found } => {
                write!(f, "record $type {found} does not match collection {collection}")
            }
            DecodeError::Invalid { collection, source } => {
                write!(f, "invalid {collection} record: {source}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode a raw record value against the schema its collection implies.
pub fn decode_record(collection: &str, value: &serde_json::Value) -> Result<Record, DecodeError> {
    // Records normally carry their lexicon id in $type; when present it
    // must agree with the collection the op was filed under.
    if let Some(found) = value.get("$type").and_then(|t| t.as_str()) {
        if found != collection {
            return Err(DecodeError::TypeMismatch {
                collection: collection.to_string(),
                found: found.to_string(),
            });
        }
    }

    let invalid = |source| DecodeError::Invalid {
        collection: collection.to_string(),
        source,
    };

    match collection {
        POST_COLLECTION => serde_json::from_value(value.clone())
            .map(Record::Post)
            .map_err(invalid),
        REPOST_COLLECTION => serde_json::from_value(value.clone())
            .map(Record::Repost)
            .map_err(invalid),
        LIKE_COLLECTION => serde_json::from_value(value.clone())
            .map(Record::Like)
            .map_err(invalid),
        FOLLOW_COLLECTION => serde_json::from_value(value.clone())
            .map(Record::Follow)
            .map_err(invalid),
        other => Err(DecodeError::UnknownCollection(other.to_string())),
    }
}
