// Database schema — table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version`
// table tracks which migrations have run, and each migration is a
// function that executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent, safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- The feed index: one row per promoted post
        CREATE TABLE IF NOT EXISTS post (
            uri TEXT PRIMARY KEY,          -- AT URI of the post record
            cid TEXT NOT NULL,             -- content id at promotion time
            reply_parent TEXT,             -- null for root posts
            reply_root TEXT,
            indexed_at TEXT NOT NULL       -- RFC 3339 promotion timestamp
        );

        -- Subscription cursor, one row per firehose endpoint
        CREATE TABLE IF NOT EXISTS sub_state (
            service TEXT PRIMARY KEY,
            cursor INTEGER NOT NULL
        );

        -- The feed is served newest-first
        CREATE INDEX IF NOT EXISTS idx_post_indexed_at
            ON post(indexed_at DESC);
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
#[allow(dead_code)]
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
