use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            username            TEXT NOT NULL CHECK (username <> ''),
            email               TEXT NOT NULL UNIQUE CHECK (email <> ''),
            front_side_image    TEXT,
            left_side_image     TEXT,
            right_side_image    TEXT,
            voice_notes         TEXT
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
