use std::sync::Arc;

use dashmap::DashMap;

/// Process-local per-branch single-writer lock (§5). A branch may have at
/// most one in-flight Turn engine operation; a second attempt is rejected
/// with a conflict rather than queued.
#[derive(Default)]
pub struct BranchLocks {
    held: Arc<DashMap<i64, ()>>,
}

#[derive(Debug)]
pub struct BranchLockGuard {
    held: Arc<DashMap<i64, ()>>,
    branch_id: i64,
}

impl Drop for BranchLockGuard {
    fn drop(&mut self) {
        self.held.remove(&self.branch_id);
    }
}

impl BranchLocks {
    pub fn acquire(&self, branch_id: i64) -> Option<BranchLockGuard> {
        match self.held.entry(branch_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(());
                Some(BranchLockGuard {
                    held: self.held.clone(),
                    branch_id,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_guard_dropped() {
        let locks = BranchLocks::default();
        let guard = locks.acquire(1).unwrap();
        assert!(locks.acquire(1).is_none());
        drop(guard);
        assert!(locks.acquire(1).is_some());
    }

    #[test]
    fn distinct_branches_do_not_contend() {
        let locks = BranchLocks::default();
        let _a = locks.acquire(1).unwrap();
        assert!(locks.acquire(2).is_some());
    }
}
