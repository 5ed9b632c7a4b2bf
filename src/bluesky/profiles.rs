// Author snapshots — single-profile lookups for the rejection filter.
//
// The filter needs a handful of author-level facts (follower count, post
// count, bio text, viewer relation flags). atrium's ProfileViewDetailed
// makes most of them optional; this flattens them into a fixed-field
// struct so the filter is total over it.

use anyhow::{Context, Result};
use atrium_api::app::bsky::actor::get_profile;

use super::client::PublicAtpClient;

/// The author-level facts the rejection filter evaluates.
#[derive(Debug, Clone)]
pub struct AuthorSnapshot {
    pub did: String,
    pub follower_count: i64,
    pub post_count: i64,
    pub description: Option<String>,
    /// The configured viewer has muted this author
    pub viewer_muted: bool,
    /// This author has blocked the configured viewer
    pub viewer_blocked_by: bool,
}

/// Fetch a snapshot of an author's profile by DID.
///
/// Viewer relation flags come back only on authenticated requests; on the
/// public endpoint they are absent and default to false.
pub async fn fetch_author_snapshot(
    client: &PublicAtpClient,
    did: &str,
) -> Result<AuthorSnapshot> {
    let output: get_profile::Output = client
        .xrpc_get("app.bsky.actor.getProfile", &[("actor", did)])
        .await
        .with_context(|| format!("Failed to fetch profile for {did}"))?;

    let viewer = output.viewer.as_ref();

    Ok(AuthorSnapshot {
        did: output.did.as_str().to_string(),
        follower_count: output.followers_count.unwrap_or(0),
        post_count: output.posts_count.unwrap_or(0),
        description: output.description.clone(),
        viewer_muted: viewer.and_then(|v| v.muted).unwrap_or(false),
        viewer_blocked_by: viewer.and_then(|v| v.blocked_by).unwrap_or(false),
    })
}
