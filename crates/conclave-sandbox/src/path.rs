//! Sandbox path resolution: accepts paths under any granted root or the
//! session's anonymous directory, rejects traversal and symlink escapes.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SandboxError};

/// Lexically normalize a path, resolving `.`/`..` components without
/// touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    let mut cur = path;
    loop {
        if cur.exists() {
            return Some(cur.to_path_buf());
        }
        cur = cur.parent()?;
    }
}

/// Resolve `requested` against `roots` (externally granted) and
/// `sandbox_root` (the session's anonymous directory). Absolute paths must
/// fall inside one of these; relative paths are joined against
/// `sandbox_root`. Rejects lexical traversal out of every base and, for
/// paths whose nearest existing ancestor resolves through a symlink,
/// rejects escapes revealed after canonicalization.
pub fn resolve(roots: &[PathBuf], sandbox_root: &Path, requested: &str) -> Result<PathBuf> {
    let candidate = if Path::new(requested).is_absolute() {
        PathBuf::from(requested)
    } else {
        sandbox_root.join(requested)
    };
    let normalized = normalize(&candidate);

    let mut bases: Vec<PathBuf> = roots.to_vec();
    bases.push(sandbox_root.to_path_buf());
    let normalized_bases: Vec<PathBuf> = bases.iter().map(|b| normalize(b)).collect();

    if !normalized_bases.iter().any(|base| normalized.starts_with(base)) {
        return Err(SandboxError::PathEscape(requested.to_string()));
    }

    if let Some(ancestor) = nearest_existing_ancestor(&normalized) {
        if let Ok(real) = ancestor.canonicalize() {
            let real_contained = bases.iter().any(|base| {
                base.canonicalize().map(|b| real.starts_with(&b)).unwrap_or(false)
            });
            if !real_contained {
                return Err(SandboxError::PathEscape(requested.to_string()));
            }
        }
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_resolves_inside_sandbox_root() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve(&[], dir.path(), "notes.txt").unwrap();
        assert_eq!(resolved, dir.path().join("notes.txt"));
    }

    #[test]
    fn traversal_outside_every_base_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(&[], dir.path(), "../../etc/passwd").unwrap_err();
        assert_eq!(err.code(), "bad-request");
    }

    #[test]
    fn absolute_path_inside_a_root_is_allowed() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = tempfile::tempdir().unwrap();
        let inner = root.path().join("project");
        std::fs::create_dir_all(&inner).unwrap();
        let requested = inner.join("main.rs");
        let resolved = resolve(&[root.path().to_path_buf()], sandbox.path(), requested.to_str().unwrap()).unwrap();
        assert_eq!(resolved, requested);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_sandbox_is_rejected() {
        use std::os::unix::fs::symlink;
        let sandbox = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), b"top secret").unwrap();
        let link = sandbox.path().join("escape");
        symlink(outside.path(), &link).unwrap();
        let err = resolve(&[], sandbox.path(), "escape/secret").unwrap_err();
        assert_eq!(err.code(), "bad-request");
    }
}
