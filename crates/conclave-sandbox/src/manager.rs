//! `SandboxManager` — owns the filesystem view, PTY sessions, and background
//! jobs for a single session's sandbox.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SandboxError};
use crate::path;
use crate::safety;
use crate::session::PtySession;
use crate::truncate;
use crate::types::{
    BackgroundJob, DirEntry, DirTree, ExecOptions, ExecResult, JobId, JobStatus, SessionId, SessionInfo,
};

/// Manages the sandbox filesystem view (base directory + granted roots), PTY
/// sessions, and background jobs for one session.
pub struct SandboxManager {
    sandbox_root: PathBuf,
    roots: Mutex<Vec<PathBuf>>,
    sessions: Mutex<HashMap<SessionId, PtySession>>,
    jobs: Mutex<HashMap<JobId, Arc<Mutex<BackgroundJob>>>>,
    db: Mutex<Connection>,
}

impl SandboxManager {
    pub fn new(sandbox_root: PathBuf, roots: Vec<PathBuf>, conn: Connection) -> std::io::Result<Self> {
        std::fs::create_dir_all(&sandbox_root)?;
        Ok(Self {
            sandbox_root,
            roots: Mutex::new(roots),
            sessions: Mutex::new(HashMap::new()),
            jobs: Mutex::new(HashMap::new()),
            db: Mutex::new(conn),
        })
    }

    pub fn add_root(&self, root: PathBuf) {
        self.roots.lock().unwrap().push(root);
    }

    fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let roots = self.roots.lock().unwrap();
        path::resolve(&roots, &self.sandbox_root, requested)
    }

    // -----------------------------------------------------------------------
    // Filesystem operations
    // -----------------------------------------------------------------------

    #[instrument(skip(self))]
    pub fn read_file(&self, requested: &str) -> Result<Vec<u8>> {
        let resolved = self.resolve(requested)?;
        Ok(std::fs::read(resolved)?)
    }

    /// Create parent directories as needed; atomically replace an existing
    /// file via write-to-temp-then-rename.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub fn write_file(&self, requested: &str, bytes: &[u8]) -> Result<()> {
        let resolved = self.resolve(requested)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = resolved.with_extension(format!(
            "{}.tmp",
            resolved.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &resolved)?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn list_directory(&self, requested: &str, max_entries: usize) -> Result<DirTree> {
        let resolved = self.resolve(requested)?;
        let name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| requested.to_string());
        let mut remaining = max_entries;
        let root = walk(&resolved, &name, &mut remaining)?;
        Ok(DirTree {
            root,
            truncated: remaining == 0,
        })
    }

    #[instrument(skip(self))]
    pub fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let roots = self.roots.lock().unwrap();
        let mut bases = roots.clone();
        bases.push(self.sandbox_root.clone());
        let mut matches = Vec::new();
        for base in &bases {
            let full_pattern = base.join(pattern);
            if let Some(pattern_str) = full_pattern.to_str() {
                if let Ok(paths) = glob::glob(pattern_str) {
                    for entry in paths.flatten() {
                        matches.push(entry.to_string_lossy().into_owned());
                    }
                }
            }
        }
        Ok(matches)
    }

    // -----------------------------------------------------------------------
    // Interactive PTY sessions
    // -----------------------------------------------------------------------

    pub async fn create_session(&self, shell: Option<&str>, cwd: Option<&str>) -> Result<SessionId> {
        let shell = shell
            .map(str::to_string)
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/bash".to_string());
        let cwd = cwd
            .map(str::to_string)
            .unwrap_or_else(|| self.sandbox_root.to_string_lossy().into_owned());

        let id = SessionId::new();
        let session = PtySession::new(&shell, &cwd)?;
        info!("created interactive session {id} (shell={shell}, cwd={cwd})");
        self.sessions.lock().unwrap().insert(id.clone(), session);
        Ok(id)
    }

    pub async fn write(&self, id: &SessionId, input: &str) -> Result<()> {
        let sessions = self.sessions.lock().unwrap();
        let session = sessions.get(id).ok_or_else(|| SandboxError::SessionNotFound(id.to_string()))?;
        debug!("write {} bytes to session {id}", input.len());
        session.write(input)
    }

    pub async fn read(&self, id: &SessionId) -> Result<String> {
        let sessions = self.sessions.lock().unwrap();
        let session = sessions.get(id).ok_or_else(|| SandboxError::SessionNotFound(id.to_string()))?;
        session.read()
    }

    pub async fn kill(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get(id).ok_or_else(|| SandboxError::SessionNotFound(id.to_string()))?;
        session.kill()?;
        sessions.remove(id);
        info!("killed interactive session {id}");
        Ok(())
    }

    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .map(|(id, s)| SessionInfo {
                id: id.clone(),
                shell: s.shell.clone(),
                cwd: s.cwd.clone(),
                created_at: s.created_at,
                is_alive: s.is_alive(),
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // One-shot execution
    // -----------------------------------------------------------------------

    #[instrument(skip(self, command))]
    pub async fn exec(&self, command: &str, options: ExecOptions) -> Result<ExecResult> {
        if !options.skip_safety {
            safety::check_command(command).map_err(|reason| SandboxError::CommandBlocked { reason })?;
        }

        let timeout_secs = options.effective_timeout_secs();
        let timeout_duration = std::time::Duration::from_secs(timeout_secs);

        let child = AsyncCommand::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.sandbox_root)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| SandboxError::Spawn(format!("spawn failed: {e}")))?;

        let pid = child.id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let _ = tx.send(child.wait_with_output().await);
        });

        match tokio::time::timeout(timeout_duration, rx).await {
            Ok(Ok(Ok(output))) => {
                let exit_code = output.status.code().unwrap_or(-1);
                let stdout = truncate::truncate_output(&strip_text(&output.stdout), options.max_output_chars);
                let stderr = truncate::truncate_output(&strip_text(&output.stderr), options.max_output_chars);
                Ok(ExecResult { exit_code, stdout, stderr })
            }
            Ok(Ok(Err(e))) => Err(SandboxError::Io(e)),
            Ok(Err(_recv_err)) => Err(SandboxError::Spawn("wait task panicked unexpectedly".to_string())),
            Err(_elapsed) => {
                if let Some(raw_pid) = pid {
                    #[cfg(unix)]
                    unsafe {
                        libc::kill(raw_pid as libc::pid_t, libc::SIGKILL);
                    }
                    #[cfg(not(unix))]
                    {
                        let _ = std::process::Command::new("taskkill").args(["/F", "/PID", &raw_pid.to_string()]).output();
                    }
                }
                Err(SandboxError::Timeout { ms: timeout_secs * 1_000 })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Background jobs (persisted in `shell_jobs`)
    // -----------------------------------------------------------------------

    #[instrument(skip(self, command))]
    pub async fn exec_background(&self, session_id: &str, command: &str) -> Result<JobId> {
        safety::check_command(command).map_err(|reason| SandboxError::CommandBlocked { reason })?;

        let id = JobId::new();
        let job = Arc::new(Mutex::new(BackgroundJob::new(id.clone(), session_id, command)));
        self.jobs.lock().unwrap().insert(id.clone(), Arc::clone(&job));
        self.persist_job(&job.lock().unwrap())?;

        let command_owned = command.to_string();
        let job_handle = Arc::clone(&job);
        let cwd = self.sandbox_root.clone();
        let db_path = self.db_path();

        tokio::spawn(async move {
            let spawn_result = AsyncCommand::new("sh")
                .arg("-c")
                .arg(&command_owned)
                .current_dir(&cwd)
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .spawn();

            match spawn_result {
                Err(e) => {
                    let mut guard = job_handle.lock().unwrap();
                    guard.status = JobStatus::Failed;
                    guard.result = Some(ExecResult { exit_code: -1, stdout: String::new(), stderr: format!("spawn failed: {e}") });
                    warn!("background job spawn failed: {e}");
                }
                Ok(child) => match child.wait_with_output().await {
                    Ok(output) => {
                        let exit_code = output.status.code().unwrap_or(-1);
                        let mut guard = job_handle.lock().unwrap();
                        guard.status = JobStatus::Completed;
                        guard.result = Some(ExecResult {
                            exit_code,
                            stdout: strip_text(&output.stdout),
                            stderr: strip_text(&output.stderr),
                        });
                    }
                    Err(e) => {
                        let mut guard = job_handle.lock().unwrap();
                        guard.status = JobStatus::Failed;
                        guard.result = Some(ExecResult { exit_code: -1, stdout: String::new(), stderr: format!("wait failed: {e}") });
                        warn!("background job wait failed: {e}");
                    }
                },
            }
            if let Some(path) = db_path {
                if let Ok(conn) = Connection::open(path) {
                    let guard = job_handle.lock().unwrap();
                    let _ = persist_job_row(&conn, &guard);
                }
            }
        });

        info!("spawned background job {id}: {command}");
        Ok(id)
    }

    pub fn job_status(&self, id: &JobId) -> Result<BackgroundJob> {
        self.jobs
            .lock()
            .unwrap()
            .get(id)
            .map(|arc| arc.lock().unwrap().clone())
            .ok_or_else(|| SandboxError::JobNotFound(id.to_string()))
    }

    pub fn job_kill(&self, id: &JobId) -> Result<()> {
        let jobs = self.jobs.lock().unwrap();
        let arc = jobs.get(id).ok_or_else(|| SandboxError::JobNotFound(id.to_string()))?;
        let mut guard = arc.lock().unwrap();
        if matches!(guard.status, JobStatus::Running) {
            guard.status = JobStatus::TimedOut;
            info!("marked background job {id} as timed out (kill requested)");
        }
        drop(guard);
        let guard = arc.lock().unwrap();
        self.persist_job(&guard)
    }

    fn db_path(&self) -> Option<PathBuf> {
        self.db.lock().unwrap().path().map(PathBuf::from)
    }

    fn persist_job(&self, job: &BackgroundJob) -> Result<()> {
        let db = self.db.lock().unwrap();
        persist_job_row(&db, job)
    }
}

fn persist_job_row(conn: &Connection, job: &BackgroundJob) -> Result<()> {
    let (exit_code, stdout, stderr, finished_at) = match &job.result {
        Some(r) => (Some(r.exit_code), Some(r.stdout.clone()), Some(r.stderr.clone()), Some(chrono::Utc::now().to_rfc3339())),
        None => (None, None, None, None),
    };
    conn.execute(
        "INSERT INTO shell_jobs (job_id, session_id, command, status, exit_code, stdout, stderr, started_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(job_id) DO UPDATE SET
           status = excluded.status, exit_code = excluded.exit_code, stdout = excluded.stdout,
           stderr = excluded.stderr, finished_at = excluded.finished_at",
        params![
            job.id.as_str(),
            job.session_id,
            job.command,
            job.status.as_str(),
            exit_code,
            stdout,
            stderr,
            job.started_at.to_string(),
            finished_at,
        ],
    )?;
    Ok(())
}

fn walk(dir: &Path, name: &str, remaining: &mut usize) -> Result<DirEntry> {
    if *remaining == 0 {
        return Ok(DirEntry { name: name.to_string(), is_dir: dir.is_dir(), size: None, children: Vec::new() });
    }
    *remaining -= 1;
    let metadata = std::fs::symlink_metadata(dir)?;
    if !metadata.is_dir() {
        return Ok(DirEntry {
            name: name.to_string(),
            is_dir: false,
            size: Some(metadata.len()),
            children: Vec::new(),
        });
    }
    let mut children = Vec::new();
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        if *remaining == 0 {
            break;
        }
        let child_name = entry.file_name().to_string_lossy().into_owned();
        children.push(walk(&entry.path(), &child_name, remaining)?);
    }
    Ok(DirEntry { name: name.to_string(), is_dir: true, size: None, children })
}

fn strip_text(raw: &[u8]) -> String {
    let clean = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&clean).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, SandboxManager) {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        let mgr = SandboxManager::new(dir.path().to_path_buf(), Vec::new(), conn).unwrap();
        (dir, mgr)
    }

    #[test]
    fn write_then_read_file_roundtrips() {
        let (_dir, mgr) = manager();
        mgr.write_file("notes.txt", b"hello").unwrap();
        assert_eq!(mgr.read_file("notes.txt").unwrap(), b"hello");
    }

    #[test]
    fn write_file_creates_parent_dirs() {
        let (_dir, mgr) = manager();
        mgr.write_file("nested/dir/file.txt", b"x").unwrap();
        assert_eq!(mgr.read_file("nested/dir/file.txt").unwrap(), b"x");
    }

    #[test]
    fn write_file_atomically_replaces_existing() {
        let (_dir, mgr) = manager();
        mgr.write_file("a.txt", b"first").unwrap();
        mgr.write_file("a.txt", b"second").unwrap();
        assert_eq!(mgr.read_file("a.txt").unwrap(), b"second");
    }

    #[test]
    fn read_file_rejects_traversal() {
        let (_dir, mgr) = manager();
        let err = mgr.read_file("../../etc/passwd").unwrap_err();
        assert_eq!(err.code(), "bad-request");
    }

    #[test]
    fn list_directory_reports_truncation() {
        let (_dir, mgr) = manager();
        for i in 0..5 {
            mgr.write_file(&format!("f{i}.txt"), b"x").unwrap();
        }
        let tree = mgr.list_directory(".", 3).unwrap();
        assert!(tree.truncated);
    }
}
