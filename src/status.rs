// System status display — shows DB stats, feed size, and the stream
// cursor.

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;

use crate::db::queries;

/// Display system status to the terminal.
pub fn show(conn: &Connection, db_path: &str, endpoint: &str) -> Result<()> {
    if !Path::new(db_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `lukewarm init` to set up the database.");
        return Ok(());
    }

    // Database file size
    let file_size = std::fs::metadata(db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_path, file_size);

    // Feed index size
    let count = queries::post_count(conn)?;
    println!("Feed index: {} posts", count);

    let recent = queries::recent_posts(conn, 5)?;
    if !recent.is_empty() {
        println!("Most recent promotions:");
        for row in &recent {
            println!("  {} ({})", row.uri, row.indexed_at);
        }
    }

    // Stream position
    match queries::get_cursor(conn, endpoint)? {
        Some(cursor) => println!("Cursor: {} at seq {}", endpoint, cursor),
        None => println!("Cursor: none yet (run `lukewarm run` to start consuming)"),
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
