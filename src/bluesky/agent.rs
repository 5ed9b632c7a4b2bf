// AgentView — the lookup collaborator seam the engine consumes.
//
// The engine never talks HTTP directly: it sees an optional trait object.
// Running without one (the minimal profile, or tests) skips every
// author-based rejection and the label re-check, per the no-agent policy.

use anyhow::Result;
use async_trait::async_trait;

use super::client::PublicAtpClient;
use super::posts::{self, FetchedPost};
use super::profiles::{self, AuthorSnapshot};

#[async_trait]
pub trait AgentView: Send + Sync {
    /// Fetch the author-level facts the rejection filter evaluates.
    async fn author_snapshot(&self, did: &str) -> Result<AuthorSnapshot>;

    /// Fetch full post views (with moderation labels) for the given URIs.
    async fn fetch_posts(&self, uris: &[String]) -> Result<Vec<FetchedPost>>;
}

#[async_trait]
impl AgentView for PublicAtpClient {
    async fn author_snapshot(&self, did: &str) -> Result<AuthorSnapshot> {
        profiles::fetch_author_snapshot(self, did).await
    }

    async fn fetch_posts(&self, uris: &[String]) -> Result<Vec<FetchedPost>> {
        posts::fetch_posts(self, uris).await
    }
}
