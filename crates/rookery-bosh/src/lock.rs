//! Per-user session locking.
//!
//! Serializes concurrent long-poll requests for the same identity. Policy
//! is last-writer-wins: a new request from the same user always takes
//! priority over a stale long-running poll from an earlier request, which
//! must observe `still_locked == false` and stop quietly. This is what
//! prevents two concurrent polls from delivering the same pending stanza.

use dashmap::DashMap;
use tracing::debug;

/// Liveness token handed out by [`SessionLock::acquire`].
///
/// A long-running loop presents its token on every iteration; once a newer
/// request acquires the lock for the same user, older tokens stop
/// validating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockToken(u64);

/// Per-user mutual exclusion with liveness checking.
///
/// There is no explicit release: a token simply stops being live when a
/// newer acquisition supersedes it, so at most one poll loop per user is
/// ever eligible to continue.
pub trait SessionLock: Send + Sync {
    /// Take the lock for `user`, invalidating any previous holder.
    fn acquire(&self, user: &str) -> LockToken;

    /// Whether `token` is still the live holder for `user`.
    fn still_locked(&self, user: &str, token: LockToken) -> bool;
}

/// In-process lock table backed by a generation counter per user.
#[derive(Debug, Default)]
pub struct MemoryLock {
    generations: DashMap<String, u64>,
}

impl MemoryLock {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionLock for MemoryLock {
    fn acquire(&self, user: &str) -> LockToken {
        let mut entry = self.generations.entry(user.to_string()).or_insert(0);
        *entry += 1;
        debug!(user, generation = *entry, "session lock acquired");
        LockToken(*entry)
    }

    fn still_locked(&self, user: &str, token: LockToken) -> bool {
        self.generations
            .get(user)
            .map(|generation| *generation == token.0)
            .unwrap_or(false)
    }
}
