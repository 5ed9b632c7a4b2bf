// Row types for the feed index.

use serde::{Deserialize, Serialize};

/// The minimal persisted shape of a promoted post. This is what the feed
/// serving layer reads back, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRow {
    pub uri: String,
    pub cid: String,
    pub reply_parent: Option<String>,
    pub reply_root: Option<String>,
    /// RFC 3339, set at promotion time
    pub indexed_at: String,
}
