// Database queries — the feed index diff application and cursor state.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust
// interfaces.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::PostRow;

// SQLite's default host-parameter limit is 999; stay well under it when
// building where-in lists.
const DELETE_CHUNK: usize = 500;

// --- Feed index ---

/// Bulk-insert promoted posts with conflict-ignore semantics: a row that
/// already exists (replayed promotion) is silently dropped, never an
/// error. Returns the number of rows actually inserted.
pub fn insert_posts(conn: &Connection, rows: &[PostRow]) -> Result<usize> {
    let mut stmt = conn
        .prepare(
            "INSERT OR IGNORE INTO post (uri, cid, reply_parent, reply_root, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .context("Failed to prepare feed insert")?;

    let mut inserted = 0;
    for row in rows {
        inserted += stmt.execute(params![
            row.uri,
            row.cid,
            row.reply_parent,
            row.reply_root,
            row.indexed_at,
        ])?;
    }
    Ok(inserted)
}

/// Bulk-delete posts from the feed index by URI. Unknown URIs are
/// ignored. Returns the number of rows actually removed.
pub fn delete_posts(conn: &Connection, uris: &[String]) -> Result<usize> {
    let mut deleted = 0;
    for chunk in uris.chunks(DELETE_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("DELETE FROM post WHERE uri IN ({placeholders})");
        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare feed delete")?;
        deleted += stmt.execute(rusqlite::params_from_iter(chunk.iter()))?;
    }
    Ok(deleted)
}

/// Number of posts currently in the feed index.
pub fn post_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM post", [], |row| row.get(0))?;
    Ok(count)
}

/// Read back the newest feed rows (status display, sanity checks).
pub fn recent_posts(conn: &Connection, limit: u32) -> Result<Vec<PostRow>> {
    let mut stmt = conn.prepare(
        "SELECT uri, cid, reply_parent, reply_root, indexed_at
         FROM post
         ORDER BY indexed_at DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        Ok(PostRow {
            uri: row.get(0)?,
            cid: row.get(1)?,
            reply_parent: row.get(2)?,
            reply_root: row.get(3)?,
            indexed_at: row.get(4)?,
        })
    })?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

// --- Subscription cursor ---

/// Get the stored stream cursor for a subscription endpoint.
pub fn get_cursor(conn: &Connection, service: &str) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT cursor FROM sub_state WHERE service = ?1")?;
    let result = stmt
        .query_row(params![service], |row| row.get(0))
        .optional()?;
    Ok(result)
}

/// Store the stream cursor for a subscription endpoint (upsert).
pub fn set_cursor(conn: &Connection, service: &str, cursor: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO sub_state (service, cursor)
         VALUES (?1, ?2)
         ON CONFLICT(service) DO UPDATE SET cursor = ?2",
        params![service, cursor],
    )?;
    Ok(())
}
