// Full-post fetching — moderation label lookups at promotion time.
//
// When a post crosses the inclusion threshold the engine re-fetches it to
// read the moderation labels attached since creation. The
// `app.bsky.feed.getPosts` endpoint accepts up to 25 URIs per request.

use anyhow::{Context, Result};
use atrium_api::app::bsky::feed::get_posts;

use super::client::PublicAtpClient;

/// A fetched post reduced to what the label re-check needs.
#[derive(Debug, Clone)]
pub struct FetchedPost {
    pub uri: String,
    pub author_did: String,
    /// Moderation label values attached to the post (e.g. "porn", "spam")
    pub labels: Vec<String>,
}

/// Fetch full post views for a set of AT URIs, batched at the API maximum.
///
/// URIs that the API doesn't return (deleted or invisible posts) are
/// simply absent from the result.
pub async fn fetch_posts(client: &PublicAtpClient, uris: &[String]) -> Result<Vec<FetchedPost>> {
    let mut result = Vec::with_capacity(uris.len());

    for chunk in uris.chunks(25) {
        let params: Vec<(&str, &str)> = chunk.iter().map(|uri| ("uris", uri.as_str())).collect();

        let output: get_posts::Output = client
            .xrpc_get("app.bsky.feed.getPosts", &params)
            .await
            .context("Failed to fetch posts for label check")?;

        for post_view in &output.posts {
            let labels = post_view
                .labels
                .as_ref()
                .map(|labels| labels.iter().map(|l| l.val.clone()).collect())
                .unwrap_or_default();

            result.push(FetchedPost {
                uri: post_view.uri.clone(),
                author_did: post_view.author.did.as_str().to_string(),
                labels,
            });
        }
    }

    Ok(result)
}
