use rusqlite::{Connection, Result};

/// Initialise message-store tables. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_messages_table(conn)?;
    create_attachments_table(conn)?;
    create_fts_index(conn)?;
    Ok(())
}

fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            branch_id           INTEGER NOT NULL,
            parent_message_id   INTEGER,
            chosen_next_id      INTEGER,
            text                TEXT NOT NULL,
            type                TEXT NOT NULL,
            cumul_token_count   INTEGER NOT NULL DEFAULT 0,
            model               TEXT,
            created_at          TEXT NOT NULL,
            generation          INTEGER NOT NULL DEFAULT 0,
            indexed             INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_messages_branch
            ON messages(branch_id, id);",
    )
}

fn create_attachments_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS message_attachments (
            message_id  INTEGER NOT NULL,
            ordinal     INTEGER NOT NULL,
            file_name   TEXT NOT NULL,
            mime_type   TEXT NOT NULL,
            hash        TEXT NOT NULL,
            PRIMARY KEY (message_id, ordinal)
        );",
    )
}

/// FTS5 index over message text. content='' external-content table synced
/// manually on write.
fn create_fts_index(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts
            USING fts5(text, content='messages', content_rowid='id');",
    )
}
