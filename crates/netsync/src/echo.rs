//! # Echo Suppression
//!
//! Applying an inbound change runs the woven member, which calls back into
//! the interceptor. That callback is the echo and must not be published.
//!
//! The table holds tokens per `(object, member)`. The interceptor arms a
//! token before applying and the outbound path consumes one instead of
//! publishing. Tokens remember the thread that armed them and only that
//! thread can consume them, so concurrent inbound and user writes on the
//! same member do not swallow each other. A token that was never consumed
//! is withdrawn once the apply returns.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread::ThreadId;

type Key = (String, String);

#[derive(Debug)]
struct Pending {
    id: u64,
    thread: ThreadId,
}

/// Receipt for an armed token. Hand it back to [`EchoTable::disarm`].
#[derive(Debug)]
#[must_use]
pub struct EchoToken {
    key: Key,
    id: u64,
}

#[derive(Debug, Default)]
pub struct EchoTable {
    pending: Mutex<HashMap<Key, Vec<Pending>>>,
    next_id: AtomicU64,
}

impl EchoTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects one echo for `(object, member)` from the current thread.
    pub fn arm(&self, object: &str, member: &str) -> EchoToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = (object.to_string(), member.to_string());
        let thread = std::thread::current().id();
        self.lock().entry(key.clone()).or_default().push(Pending { id, thread });
        EchoToken { key, id }
    }

    /// Consumes a token armed by the current thread. Returns true when the
    /// caller is looking at an echo and must not publish.
    pub fn consume(&self, object: &str, member: &str) -> bool {
        let mut pending = self.lock();
        let key = (object.to_string(), member.to_string());
        let Some(tokens) = pending.get_mut(&key) else {
            return false;
        };

        let thread = std::thread::current().id();
        let Some(index) = tokens.iter().position(|t| t.thread == thread) else {
            return false;
        };
        tokens.remove(index);
        if tokens.is_empty() {
            pending.remove(&key);
        }
        true
    }

    /// Withdraws the token if it is still pending. Returns true if it was.
    pub fn disarm(&self, token: EchoToken) -> bool {
        let mut pending = self.lock();
        let Some(tokens) = pending.get_mut(&token.key) else {
            return false;
        };
        let Some(index) = tokens.iter().position(|t| t.id == token.id) else {
            return false;
        };
        tokens.remove(index);
        if tokens.is_empty() {
            pending.remove(&token.key);
        }
        true
    }

    /// Tokens outstanding for one member.
    pub fn pending(&self, object: &str, member: &str) -> usize {
        self.lock()
            .get(&(object.to_string(), member.to_string()))
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// True when no tokens are outstanding at all.
    pub fn is_quiet(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Key, Vec<Pending>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
