use rusqlite::{Connection, Result};

/// Initialise the `shell_jobs` table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS shell_jobs (
            job_id      TEXT PRIMARY KEY,
            session_id  TEXT NOT NULL,
            command     TEXT NOT NULL,
            status      TEXT NOT NULL,
            exit_code   INTEGER,
            stdout      TEXT,
            stderr      TEXT,
            started_at  TEXT NOT NULL,
            finished_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_shell_jobs_session
            ON shell_jobs(session_id);",
    )
}
