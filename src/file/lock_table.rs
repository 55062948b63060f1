use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Condvar, Mutex};

use super::error::{FileError, FileResult};
use super::{PageId, Permission, TransactionId};

/// Page-granularity two-phase lock table.
///
/// Every acquire/release decision runs under one global mutex; waiters park
/// on a condvar that is broadcast by every release and re-check compatibility
/// from scratch on wake. Deadlocks are detected before a requester blocks by
/// walking the waits-for graph; the requester, never an incumbent holder, is
/// the party that aborts.
pub struct LockTable {
    state: Mutex<LockState>,
    released: Condvar,
}

#[derive(Default)]
struct LockState {
    /// Transactions holding a shared lock, per page. Empty sets are removed.
    shared: HashMap<PageId, HashSet<TransactionId>>,
    /// At most one exclusive holder per page
    exclusive: HashMap<PageId, TransactionId>,
    /// Waiter -> holders it was waiting on when it last blocked.
    /// Populated only while the waiter is blocked; re-waiting overwrites.
    waits_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl LockState {
    fn grantable(&self, pid: PageId, tid: TransactionId, perm: Permission) -> bool {
        match perm {
            Permission::ReadOnly => match self.exclusive.get(&pid) {
                Some(&holder) => holder == tid,
                None => true,
            },
            Permission::ReadWrite => {
                if let Some(&holder) = self.exclusive.get(&pid) {
                    return holder == tid;
                }
                match self.shared.get(&pid) {
                    Some(holders) => holders.len() == 1 && holders.contains(&tid),
                    None => true,
                }
            }
        }
    }

    fn grant(&mut self, pid: PageId, tid: TransactionId, perm: Permission) {
        match perm {
            Permission::ReadOnly => {
                // A current exclusive holder already subsumes the read lock.
                if self.exclusive.get(&pid) != Some(&tid) {
                    self.shared.entry(pid).or_default().insert(tid);
                }
            }
            Permission::ReadWrite => {
                // Upgrade: only this page's shared holders are displaced.
                self.shared.remove(&pid);
                self.exclusive.insert(pid, tid);
            }
        }
    }

    /// Every transaction currently holding any lock on `pid`
    fn holders(&self, pid: PageId) -> HashSet<TransactionId> {
        let mut holders = HashSet::new();
        if let Some(&tid) = self.exclusive.get(&pid) {
            holders.insert(tid);
        }
        if let Some(shared) = self.shared.get(&pid) {
            holders.extend(shared.iter().copied());
        }
        holders
    }

    /// BFS over the waits-for graph from `start`. Any revisit of an
    /// already-seen node closes a cycle; self-edges are skipped.
    fn closes_cycle(&self, start: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            let Some(edges) = self.waits_for.get(&node) else {
                continue;
            };
            for &next in edges {
                if next == node {
                    continue;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                } else {
                    return true;
                }
            }
        }
        false
    }
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    /// Block until `tid` holds `perm` on `pid`, or fail with
    /// `TransactionAborted` when waiting would close a deadlock cycle.
    pub fn acquire(&self, pid: PageId, tid: TransactionId, perm: Permission) -> FileResult<()> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.grantable(pid, tid, perm) {
                state.grant(pid, tid, perm);
                state.waits_for.remove(&tid);
                return Ok(());
            }

            let holders = state.holders(pid);
            state.waits_for.insert(tid, holders);
            if state.closes_cycle(tid) {
                state.waits_for.remove(&tid);
                return Err(FileError::TransactionAborted);
            }

            state = self.released.wait(state).unwrap();
        }
    }

    /// Release whatever lock `tid` holds on `pid`. Idempotent.
    pub fn release(&self, pid: PageId, tid: TransactionId) {
        let mut state = self.state.lock().unwrap();
        if let Some(holders) = state.shared.get_mut(&pid) {
            holders.remove(&tid);
            if holders.is_empty() {
                state.shared.remove(&pid);
            }
        }
        if state.exclusive.get(&pid) == Some(&tid) {
            state.exclusive.remove(&pid);
        }
        state.waits_for.remove(&tid);
        drop(state);
        self.released.notify_all();
    }

    /// Release every lock held by `tid` and clear its waits-for edges
    pub fn release_all(&self, tid: TransactionId) {
        let mut state = self.state.lock().unwrap();
        state.shared.retain(|_, holders| {
            holders.remove(&tid);
            !holders.is_empty()
        });
        state.exclusive.retain(|_, &mut holder| holder != tid);
        state.waits_for.remove(&tid);
        drop(state);
        self.released.notify_all();
    }

    /// Does `tid` hold any lock on `pid`?
    pub fn holds(&self, pid: PageId, tid: TransactionId) -> bool {
        let state = self.state.lock().unwrap();
        state.shared.get(&pid).is_some_and(|s| s.contains(&tid))
            || state.exclusive.get(&pid) == Some(&tid)
    }

    /// Does any transaction hold any lock on `pid`? Eviction must skip such
    /// pages: a re-fetch of the same id would bypass the live lock.
    pub fn page_locked(&self, pid: PageId) -> bool {
        let state = self.state.lock().unwrap();
        state.shared.contains_key(&pid) || state.exclusive.contains_key(&pid)
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}
