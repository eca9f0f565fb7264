//! Refcounted per-session sandbox lifecycle (§5 "Sandbox FS refcounting").
//!
//! `acquire` increments a session's handle count, creating the
//! `SandboxManager` on first use; `release` decrements it, tearing the
//! manager down at zero. Subsessions (`is_subsession_id`) resolve to their
//! main session's sandbox rather than getting one of their own (§6.4).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use conclave_core::{split_session_id, ConclaveError, Result};
use conclave_sandbox::SandboxManager;

struct Entry {
    manager: Arc<SandboxManager>,
    refcount: usize,
}

pub struct SandboxRegistry {
    sandboxes_dir: PathBuf,
    db_path: PathBuf,
    entries: Mutex<HashMap<String, Entry>>,
}

impl SandboxRegistry {
    pub fn new(sandboxes_dir: PathBuf, db_path: PathBuf) -> Self {
        Self { sandboxes_dir, db_path, entries: Mutex::new(HashMap::new()) }
    }

    /// Acquire a handle to `session_id`'s sandbox, creating it with `roots`
    /// on first use. A subsession shares its main session's sandbox.
    pub fn acquire(&self, session_id: &str, roots: &[String]) -> Result<Arc<SandboxManager>> {
        let (main_id, _) = split_session_id(session_id);
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(main_id) {
            entry.refcount += 1;
            return Ok(entry.manager.clone());
        }

        let root = self.sandboxes_dir.join(main_id);
        let conn = rusqlite::Connection::open(&self.db_path).map_err(|e| ConclaveError::Database(e.to_string()))?;
        conclave_sandbox::db::init_db(&conn).map_err(|e| ConclaveError::Database(e.to_string()))?;
        let roots: Vec<PathBuf> = roots.iter().map(PathBuf::from).collect();
        let manager = Arc::new(
            SandboxManager::new(root, roots, conn).map_err(ConclaveError::Io)?,
        );
        entries.insert(main_id.to_string(), Entry { manager: manager.clone(), refcount: 1 });
        Ok(manager)
    }

    pub fn release(&self, session_id: &str) {
        let (main_id, _) = split_session_id(session_id);
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(main_id) {
            entry.refcount = entry.refcount.saturating_sub(1);
            if entry.refcount == 0 {
                entries.remove(main_id);
            }
        }
    }
}
