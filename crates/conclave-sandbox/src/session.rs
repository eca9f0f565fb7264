//! Interactive shell session backed by a real pseudo-terminal (§4.5.2).
//!
//! A `PtySession` is the long-lived counterpart to the one-shot
//! `run_shell_command` tool: it keeps a shell process alive across multiple
//! tool calls so a model can run something interactive (a REPL, `ssh`, a dev
//! server) and poll its output incrementally instead of blocking on a single
//! command's exit.

use crate::error::{Result, SandboxError};
use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Ring-buffer ceiling for accumulated, unread shell output (128 KiB).
const SCROLLBACK_LIMIT_BYTES: usize = 131_072;

const DEFAULT_ROWS: u16 = 24;
const DEFAULT_COLS: u16 = 80;

/// A running shell process attached to a pseudo-terminal.
///
/// Reads off the PTY's master side happen on a dedicated OS thread (PTY I/O
/// is blocking and must not tie up a Tokio worker) and accumulate into a
/// shared buffer that [`PtySession::read`] drains on demand.
pub struct PtySession {
    pub shell: String,
    pub cwd: String,
    pub created_at: u64,

    stdin: Mutex<Box<dyn Write + Send>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    scrollback: Arc<Mutex<String>>,
    running: Arc<AtomicBool>,
}

fn now_unix_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Continuously drain `reader` into `scrollback`, stripping ANSI escapes, and
/// flip `running` to false once the shell side of the pipe closes.
fn spawn_drain_thread(mut reader: Box<dyn Read + Send>, scrollback: Arc<Mutex<String>>, running: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let plain = strip_ansi_escapes::strip(&chunk[..n]);
                    let text = String::from_utf8_lossy(&plain).into_owned();

                    let mut buf = scrollback.lock().unwrap();
                    buf.push_str(&text);
                    if buf.len() > SCROLLBACK_LIMIT_BYTES {
                        let overflow = buf.len() - SCROLLBACK_LIMIT_BYTES;
                        buf.drain(..overflow);
                    }
                }
                Err(e) => {
                    warn!("pty scrollback read failed: {e}");
                    break;
                }
            }
        }
        running.store(false, Ordering::Release);
        debug!("pty drain thread exiting, shell side closed");
    });
}

impl PtySession {
    /// Launch `shell` in `cwd` and start draining its output in the background.
    pub fn new(shell: &str, cwd: &str) -> Result<Self> {
        let system = native_pty_system();
        let pair = system
            .openpty(PtySize { rows: DEFAULT_ROWS, cols: DEFAULT_COLS, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| SandboxError::Spawn(e.to_string()))?;

        let mut command = CommandBuilder::new(shell);
        command.cwd(cwd);
        pair.slave.spawn_command(command).map_err(|e| SandboxError::Spawn(e.to_string()))?;

        let stdin = pair.master.take_writer().map_err(|e| SandboxError::Spawn(e.to_string()))?;
        let reader = pair.master.try_clone_reader().map_err(|e| SandboxError::Spawn(e.to_string()))?;

        let scrollback: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));
        let running = Arc::new(AtomicBool::new(true));
        spawn_drain_thread(reader, Arc::clone(&scrollback), Arc::clone(&running));

        Ok(Self {
            shell: shell.to_string(),
            cwd: cwd.to_string(),
            created_at: now_unix_secs(),
            stdin: Mutex::new(stdin),
            master: Mutex::new(pair.master),
            scrollback,
            running,
        })
    }

    /// Feed raw bytes to the shell's stdin — a command line, a control
    /// character like `"\x03"` (Ctrl-C), or `"\x04"` (Ctrl-D / EOF).
    pub fn write(&self, input: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().unwrap();
        stdin.write_all(input.as_bytes())?;
        stdin.flush()?;
        Ok(())
    }

    /// Take and clear whatever output has accumulated since the last call.
    pub fn read(&self) -> Result<String> {
        let mut buf = self.scrollback.lock().unwrap();
        Ok(std::mem::take(&mut *buf))
    }

    /// Resize the terminal's row/column grid.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let master = self.master.lock().unwrap();
        master.resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 }).map_err(|e| SandboxError::Io(std::io::Error::other(e.to_string())))
    }

    /// `true` while the drain thread is still running, i.e. the shell hasn't exited.
    pub fn is_alive(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request a clean shutdown by sending EOF; does not force-kill the process.
    pub fn kill(&self) -> Result<()> {
        let _ = self.write("\x04");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_runs_a_real_shell_and_reports_alive() {
        let session = PtySession::new("/bin/sh", "/tmp").expect("spawn shell");
        assert!(session.is_alive());
        assert_eq!(session.shell, "/bin/sh");
        assert_eq!(session.cwd, "/tmp");
    }

    #[test]
    fn write_then_read_round_trips_shell_output() {
        let session = PtySession::new("/bin/sh", "/tmp").expect("spawn shell");
        session.write("echo hello_pty\n").expect("write to stdin");
        std::thread::sleep(std::time::Duration::from_millis(300));
        let output = session.read().expect("read output");
        assert!(output.contains("hello_pty"));
    }

    #[test]
    fn read_drains_the_buffer() {
        let session = PtySession::new("/bin/sh", "/tmp").expect("spawn shell");
        session.write("echo once\n").expect("write to stdin");
        std::thread::sleep(std::time::Duration::from_millis(300));
        let _ = session.read().expect("first read");
        let second = session.read().expect("second read");
        assert!(!second.contains("once"));
    }

    #[test]
    fn kill_eventually_stops_the_session() {
        let session = PtySession::new("/bin/sh", "/tmp").expect("spawn shell");
        session.kill().expect("send eof");
        std::thread::sleep(std::time::Duration::from_millis(300));
        assert!(!session.is_alive());
    }
}
