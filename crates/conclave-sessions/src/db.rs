use rusqlite::Connection;

use crate::error::Result;

/// Initialise the session-store tables. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id                 TEXT PRIMARY KEY,
            name               TEXT NOT NULL,
            system_prompt      TEXT NOT NULL DEFAULT '',
            workspace_id       TEXT NOT NULL DEFAULT 'default',
            primary_branch_id  INTEGER NOT NULL DEFAULT 0,
            last_updated_at    TEXT NOT NULL,
            archived           INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_workspace
            ON sessions(workspace_id, last_updated_at DESC);

        CREATE TABLE IF NOT EXISTS branches (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id              TEXT NOT NULL,
            parent_branch_id        INTEGER,
            branch_from_message_id  INTEGER,
            pending_confirmation    TEXT,
            created_at              TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_branches_session
            ON branches(session_id);

        CREATE TABLE IF NOT EXISTS session_roots (
            session_id  TEXT NOT NULL,
            path        TEXT NOT NULL,
            PRIMARY KEY (session_id, path)
        );

        CREATE TABLE IF NOT EXISTS workspaces (
            id                     TEXT PRIMARY KEY,
            name                   TEXT NOT NULL,
            default_system_prompt  TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS prompts (
            name        TEXT PRIMARY KEY,
            template    TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS mcp_configs (
            name        TEXT PRIMARY KEY,
            command     TEXT NOT NULL,
            args        TEXT NOT NULL DEFAULT '[]',
            enabled     INTEGER NOT NULL DEFAULT 1,
            updated_at  TEXT NOT NULL
        );

        INSERT OR IGNORE INTO workspaces (id, name, default_system_prompt)
            VALUES ('default', 'Default', '');",
    )?;
    Ok(())
}
