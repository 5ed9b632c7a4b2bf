// Public AT Protocol client — unauthenticated XRPC over HTTP.
//
// All the read endpoints the curation engine consults (getProfile,
// getPosts) are public and don't require authentication. This is a thin
// reqwest wrapper with a generic XRPC GET helper; response shapes come
// from atrium-api.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Default public API endpoint for AT Protocol read operations.
pub const DEFAULT_PUBLIC_API_URL: &str = "https://public.api.bsky.app";

/// Unauthenticated HTTP client for public AT Protocol XRPC endpoints.
pub struct PublicAtpClient {
    client: reqwest::Client,
    base_url: String,
}

impl PublicAtpClient {
    /// Create a new public API client pointing at the given base URL.
    ///
    /// Defaults to `https://public.api.bsky.app`; pass a different URL
    /// for testing or alternate PDS instances.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("lukewarm/0.1 (feed-curation)")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Make a GET request to an XRPC endpoint and deserialize the response.
    ///
    /// `nsid` is the XRPC method name (e.g. "app.bsky.actor.getProfile").
    /// `params` are query string key-value pairs. Use repeated keys for
    /// array parameters (e.g. `[("uris", "at://..."), ("uris", "at://...")]`).
    pub async fn xrpc_get<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/xrpc/{}", self.base_url, nsid);

        debug!(nsid = nsid, "XRPC GET request");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("XRPC request failed: {nsid}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("XRPC {nsid} returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize {nsid} response"))
    }
}
