// Firehose ingest loop: subscription stream -> engine -> feed index.
//
// Exactly one commit event is in flight at a time; the engine's output
// diff is applied to the store before the next event is read. The stream
// is at-least-once and ordered; losing a connection just means resuming
// from the stored cursor after a short delay.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::StreamExt;
use rusqlite::Connection;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::db::queries;
use crate::engine::CurationEngine;
use crate::firehose::ops::{self, CommitEvent};

/// How often the stream cursor is persisted, in commit events.
const CURSOR_SAVE_INTERVAL: i64 = 20;

/// Delay before reconnecting after a stream error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Consume the subscription stream forever, feeding each commit event
/// through the engine and applying the resulting diff.
///
/// Stream and persistence errors are logged and answered with a
/// reconnect; nothing here is fatal to the process.
pub async fn run(
    endpoint: &str,
    conn: &Connection,
    engine: &mut CurationEngine,
) -> Result<()> {
    loop {
        match stream_once(endpoint, conn, engine).await {
            Ok(()) => {
                info!("subscription stream closed, reconnecting");
            }
            Err(e) => {
                warn!(error = %e, "subscription stream failed, reconnecting");
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// One connection's worth of stream consumption. Returns Ok on a clean
/// remote close, Err on anything else.
async fn stream_once(
    endpoint: &str,
    conn: &Connection,
    engine: &mut CurationEngine,
) -> Result<()> {
    let cursor = queries::get_cursor(conn, endpoint)?;
    let url = match cursor {
        Some(cursor) => format!("{endpoint}?cursor={cursor}"),
        None => endpoint.to_string(),
    };

    info!(url = %url, "connecting to subscription stream");

    let (mut stream, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {endpoint}"))?;

    while let Some(message) = stream.next().await {
        let message = message.context("Subscription stream read failed")?;

        let text = match message {
            Message::Text(text) => text,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return Ok(()),
            Message::Binary(payload) => {
                debug!(len = payload.len(), "ignoring binary frame");
                continue;
            }
            _ => continue,
        };

        // A malformed frame drops that one event, never the stream
        let event: CommitEvent = match serde_json::from_str(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dropped malformed commit event");
                continue;
            }
        };

        handle_event(&event, conn, engine).await?;

        if event.seq % CURSOR_SAVE_INTERVAL == 0 {
            queries::set_cursor(conn, endpoint, event.seq)?;
        }
    }

    Ok(())
}

/// Run one commit event through the engine and persist the diff.
async fn handle_event(
    event: &CommitEvent,
    conn: &Connection,
    engine: &mut CurationEngine,
) -> Result<()> {
    let batch = ops::batch_from_commit(event);
    let output = engine.apply(&batch, Utc::now()).await;

    if !output.to_delete.is_empty() {
        let deleted = queries::delete_posts(conn, &output.to_delete)?;
        debug!(requested = output.to_delete.len(), deleted, "applied feed deletions");
    }
    if !output.to_insert.is_empty() {
        let inserted = queries::insert_posts(conn, &output.to_insert)?;
        info!(
            inserted,
            tracked = engine.tracked_posts(),
            "applied feed insertions"
        );
    }

    Ok(())
}
