use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::locks::{BranchLockGuard, BranchLocks};
use crate::types::{Branch, McpConfig, PromptTemplate, Session, Workspace};

/// Thread-safe manager for sessions, branches, and their environment (C2a).
///
/// Wraps a single SQLite connection in a `Mutex`. For high-concurrency
/// deployments consider a connection pool, but a Mutex is sufficient for the
/// single-node target.
pub struct SessionManager {
    db: Mutex<Connection>,
    locks: BranchLocks,
}

impl SessionManager {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
            locks: BranchLocks::default(),
        }
    }

    /// Create a new session with an initial branch, returning `(session_id, branch_id)`.
    #[instrument(skip(self, system_prompt))]
    pub fn create_session(&self, system_prompt: &str, workspace_id: &str) -> Result<(String, i64)> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();

        db.execute(
            "INSERT INTO branches (session_id, parent_branch_id, branch_from_message_id, pending_confirmation, created_at)
             VALUES (?1, NULL, NULL, NULL, ?2)",
            params![id, now],
        )?;
        let branch_id = db.last_insert_rowid();

        db.execute(
            "INSERT INTO sessions (id, name, system_prompt, workspace_id, primary_branch_id, last_updated_at, archived)
             VALUES (?1, '', ?2, ?3, ?4, ?5, 0)",
            params![id, system_prompt, workspace_id, branch_id, now],
        )?;

        Ok((id, branch_id))
    }

    #[instrument(skip(self))]
    pub fn get_session(&self, id: &str) -> Result<Session> {
        let db = self.db.lock().unwrap();
        db.query_row("SELECT * FROM sessions WHERE id = ?1", params![id], row_to_session)
            .optional()?
            .ok_or_else(|| SessionError::SessionNotFound(id.to_string()))
    }

    #[instrument(skip(self))]
    pub fn list_sessions(&self, workspace_id: Option<&str>, include_archived: bool) -> Result<Vec<Session>> {
        let db = self.db.lock().unwrap();
        let archived_clause = if include_archived { "" } else { "AND archived = 0" };
        match workspace_id {
            Some(ws) => {
                let sql = format!(
                    "SELECT * FROM sessions WHERE workspace_id = ?1 {archived_clause} ORDER BY last_updated_at DESC"
                );
                let mut stmt = db.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![ws], row_to_session)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            }
            None => {
                let sql = format!("SELECT * FROM sessions WHERE 1=1 {archived_clause} ORDER BY last_updated_at DESC");
                let mut stmt = db.prepare(&sql)?;
                let rows = stmt
                    .query_map([], row_to_session)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            }
        }
    }

    #[instrument(skip(self))]
    pub fn rename_session(&self, id: &str, name: &str) -> Result<()> {
        self.touch_field(id, "name", name)
    }

    #[instrument(skip(self))]
    pub fn set_primary_branch(&self, id: &str, branch_id: i64) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let n = db.execute(
            "UPDATE sessions SET primary_branch_id = ?1, last_updated_at = ?2 WHERE id = ?3",
            params![branch_id, now, id],
        )?;
        if n == 0 {
            return Err(SessionError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn archive_session(&self, id: &str, archived: bool) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE sessions SET archived = ?1 WHERE id = ?2",
            params![archived as i64, id],
        )?;
        if n == 0 {
            return Err(SessionError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn move_workspace(&self, id: &str, workspace_id: &str) -> Result<()> {
        self.touch_field(id, "workspace_id", workspace_id)
    }

    /// Permanently delete a session along with its branches and roots. The
    /// associated message history lives in the message store and must be
    /// cleaned up separately if desired.
    #[instrument(skip(self))]
    pub fn delete_session(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM branches WHERE session_id = ?1", params![id])?;
        db.execute("DELETE FROM session_roots WHERE session_id = ?1", params![id])?;
        let n = db.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(SessionError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    fn touch_field(&self, id: &str, column: &'static str, value: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let sql = format!("UPDATE sessions SET {column} = ?1, last_updated_at = ?2 WHERE id = ?3");
        let n = db.execute(&sql, params![value, now, id])?;
        if n == 0 {
            return Err(SessionError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Create a sibling branch diverging from `from_message_id` in `parent_branch_id`.
    #[instrument(skip(self))]
    pub fn fork_branch(&self, session_id: &str, parent_branch_id: i64, from_message_id: Option<i64>) -> Result<i64> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO branches (session_id, parent_branch_id, branch_from_message_id, pending_confirmation, created_at)
             VALUES (?1, ?2, ?3, NULL, ?4)",
            params![session_id, parent_branch_id, from_message_id, now],
        )?;
        Ok(db.last_insert_rowid())
    }

    #[instrument(skip(self))]
    pub fn get_branch(&self, branch_id: i64) -> Result<Branch> {
        let db = self.db.lock().unwrap();
        db.query_row("SELECT * FROM branches WHERE id = ?1", params![branch_id], row_to_branch)
            .optional()?
            .ok_or(SessionError::BranchNotFound(branch_id))
    }

    /// Set or clear the function call awaiting user confirmation on a branch.
    #[instrument(skip(self, payload))]
    pub fn set_pending_confirmation(&self, branch_id: i64, payload: Option<&str>) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE branches SET pending_confirmation = ?1 WHERE id = ?2",
            params![payload, branch_id],
        )?;
        if n == 0 {
            return Err(SessionError::BranchNotFound(branch_id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn get_session_env(&self, session_id: &str) -> Result<Vec<String>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT path FROM session_roots WHERE session_id = ?1 ORDER BY rowid")?;
        let rows = stmt
            .query_map(params![session_id], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Append `roots` to the session's environment, returning the ones that
    /// were newly added. Callers use the returned set to compose the
    /// `env_changed` message persisted to the message store.
    #[instrument(skip(self, roots))]
    pub fn add_session_env(&self, session_id: &str, roots: &[String]) -> Result<Vec<String>> {
        let db = self.db.lock().unwrap();
        let mut added = Vec::new();
        for root in roots {
            let n = db.execute(
                "INSERT OR IGNORE INTO session_roots (session_id, path) VALUES (?1, ?2)",
                params![session_id, root],
            )?;
            if n > 0 {
                added.push(root.clone());
            }
        }
        Ok(added)
    }

    #[instrument(skip(self))]
    pub fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT id, name, default_system_prompt FROM workspaces")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Workspace {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    default_system_prompt: r.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    #[instrument(skip(self, template))]
    pub fn upsert_prompt(&self, name: &str, template: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO prompts (name, template, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET template = excluded.template, updated_at = excluded.updated_at",
            params![name, template, now],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_prompt(&self, name: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM prompts WHERE name = ?1", params![name])?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn list_prompts(&self) -> Result<Vec<PromptTemplate>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT name, template, updated_at FROM prompts ORDER BY name")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(PromptTemplate {
                    name: r.get(0)?,
                    template: r.get(1)?,
                    updated_at: r.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    #[instrument(skip(self, command, args))]
    pub fn upsert_mcp_config(&self, name: &str, command: &str, args: &[String], enabled: bool) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let args_json = serde_json::to_string(args).unwrap_or_else(|_| "[]".to_string());
        db.execute(
            "INSERT INTO mcp_configs (name, command, args, enabled, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET command = excluded.command, args = excluded.args,
                enabled = excluded.enabled, updated_at = excluded.updated_at",
            params![name, command, args_json, enabled as i64, now],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_mcp_config(&self, name: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM mcp_configs WHERE name = ?1", params![name])?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn list_mcp_configs(&self) -> Result<Vec<McpConfig>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT name, command, args, enabled, updated_at FROM mcp_configs ORDER BY name")?;
        let rows = stmt
            .query_map([], |r| {
                let args_json: String = r.get(2)?;
                let enabled: i64 = r.get(3)?;
                Ok(McpConfig {
                    name: r.get(0)?,
                    command: r.get(1)?,
                    args: serde_json::from_str(&args_json).unwrap_or_default(),
                    enabled: enabled != 0,
                    updated_at: r.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Acquire the per-branch single-writer lock (§5). Fails with a conflict
    /// if another generation is already in flight on this branch.
    pub fn acquire_branch_lock(&self, branch_id: i64) -> Result<BranchLockGuard> {
        self.locks.acquire(branch_id).ok_or(SessionError::BranchBusy(branch_id))
    }
}

fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get("id")?,
        name: row.get("name")?,
        system_prompt: row.get("system_prompt")?,
        workspace_id: row.get("workspace_id")?,
        primary_branch_id: row.get("primary_branch_id")?,
        last_updated_at: row.get("last_updated_at")?,
        archived: row.get::<_, i64>("archived")? != 0,
    })
}

fn row_to_branch(row: &Row) -> rusqlite::Result<Branch> {
    Ok(Branch {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        parent_branch_id: row.get("parent_branch_id")?,
        branch_from_message_id: row.get("branch_from_message_id")?,
        pending_confirmation: row.get("pending_confirmation")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        SessionManager::new(conn)
    }

    #[test]
    fn create_and_get_session() {
        let mgr = manager();
        let (id, branch_id) = mgr.create_session("", "default").unwrap();
        let session = mgr.get_session(&id).unwrap();
        assert_eq!(session.primary_branch_id, branch_id);
        assert!(!session.archived);
    }

    #[test]
    fn fork_branch_creates_sibling() {
        let mgr = manager();
        let (id, branch_id) = mgr.create_session("", "default").unwrap();
        let forked = mgr.fork_branch(&id, branch_id, Some(1)).unwrap();
        assert_ne!(forked, branch_id);
        let branch = mgr.get_branch(forked).unwrap();
        assert_eq!(branch.parent_branch_id, Some(branch_id));
    }

    #[test]
    fn branch_lock_rejects_second_holder() {
        let mgr = manager();
        let (_id, branch_id) = mgr.create_session("", "default").unwrap();
        let guard = mgr.acquire_branch_lock(branch_id).unwrap();
        let err = mgr.acquire_branch_lock(branch_id).unwrap_err();
        assert_eq!(err.code(), "conflict");
        drop(guard);
        assert!(mgr.acquire_branch_lock(branch_id).is_ok());
    }

    #[test]
    fn pending_confirmation_roundtrip() {
        let mgr = manager();
        let (_id, branch_id) = mgr.create_session("", "default").unwrap();
        mgr.set_pending_confirmation(branch_id, Some("{\"name\":\"write_file\"}")).unwrap();
        let branch = mgr.get_branch(branch_id).unwrap();
        assert!(branch.pending_confirmation.is_some());
        mgr.set_pending_confirmation(branch_id, None).unwrap();
        let branch = mgr.get_branch(branch_id).unwrap();
        assert!(branch.pending_confirmation.is_none());
    }

    #[test]
    fn env_roots_add_is_idempotent() {
        let mgr = manager();
        let (id, _branch_id) = mgr.create_session("", "default").unwrap();
        let added = mgr.add_session_env(&id, &["/root/a".to_string()]).unwrap();
        assert_eq!(added, vec!["/root/a".to_string()]);
        let added_again = mgr.add_session_env(&id, &["/root/a".to_string()]).unwrap();
        assert!(added_again.is_empty());
        assert_eq!(mgr.get_session_env(&id).unwrap(), vec!["/root/a".to_string()]);
    }

    #[test]
    fn list_sessions_excludes_archived_by_default() {
        let mgr = manager();
        let (id, _) = mgr.create_session("", "default").unwrap();
        mgr.archive_session(&id, true).unwrap();
        assert!(mgr.list_sessions(Some("default"), false).unwrap().is_empty());
        assert_eq!(mgr.list_sessions(Some("default"), true).unwrap().len(), 1);
    }
}
