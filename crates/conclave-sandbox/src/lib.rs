//! Per-session sandbox filesystem view and command-execution surface (C3).

pub mod db;
pub mod error;
pub mod manager;
pub mod path;
pub mod safety;
pub mod session;
pub mod truncate;
pub mod types;

pub use error::{Result, SandboxError};
pub use manager::SandboxManager;
pub use types::{
    BackgroundJob, DirEntry, DirTree, ExecOptions, ExecResult, JobId, JobStatus, SessionId, SessionInfo,
};
