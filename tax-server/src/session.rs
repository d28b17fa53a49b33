//! Per-session result caches.
//!
//! Clients opt into caching by sending an `X-Session-Id` header; each id gets
//! its own [`ComputationCache`]. A cache is dropped once its session has been
//! idle for longer than [`SessionLimits::idle_timeout`], and the least
//! recently used session makes room when [`SessionLimits::max_sessions`] is
//! reached.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::{Duration, Instant};

use regex::Regex;
use tax_core::ComputationCache;
use thiserror::Error;
use tracing::debug;

pub const SESSION_HEADER: &str = "x-session-id";

// Constant pattern; compiling it cannot fail.
static SESSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("session id pattern is a valid regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
#[error("session id must be 1-64 characters of letters, digits, '-' or '_'")]
pub struct InvalidSessionId;

/// A validated session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, InvalidSessionId> {
        if SESSION_PATTERN.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidSessionId)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How long session caches live and how many are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub idle_timeout: Duration,
    pub max_sessions: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
            max_sessions: 10_000,
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    cache: Arc<ComputationCache>,
    last_seen: Instant,
}

#[derive(Debug, Default)]
pub struct SessionCaches {
    limits: SessionLimits,
    entries: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SessionLimits) -> Self {
        Self {
            limits,
            entries: Mutex::default(),
        }
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// The cache for `session`, created on first use or after the previous
    /// one expired. Each call counts as activity on the session.
    pub fn cache_for(
        &self,
        session: &SessionId,
    ) -> Arc<ComputationCache> {
        self.cache_at(session, Instant::now())
    }

    fn cache_at(
        &self,
        session: &SessionId,
        now: Instant,
    ) -> Arc<ComputationCache> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get_mut(session) {
            if self.is_live(entry, now) {
                entry.last_seen = now;
                return Arc::clone(&entry.cache);
            }
        }

        self.evict(&mut entries, now);
        debug!(session = %session, sessions = entries.len() + 1, "new session cache");
        let cache = Arc::new(ComputationCache::new());
        entries.insert(
            session.clone(),
            SessionEntry {
                cache: Arc::clone(&cache),
                last_seen: now,
            },
        );
        cache
    }

    fn is_live(
        &self,
        entry: &SessionEntry,
        now: Instant,
    ) -> bool {
        now.saturating_duration_since(entry.last_seen) <= self.limits.idle_timeout
    }

    /// Drops idle sessions, then the least recently used ones until a new
    /// session fits.
    fn evict(
        &self,
        entries: &mut HashMap<SessionId, SessionEntry>,
        now: Instant,
    ) {
        let before = entries.len();
        entries.retain(|_, entry| self.is_live(entry, now));
        if entries.len() < before {
            debug!(expired = before - entries.len(), "dropped idle session caches");
        }

        while !entries.is_empty() && entries.len() >= self.limits.max_sessions {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| id.clone());
            let Some(oldest) = oldest else {
                break;
            };
            debug!(session = %oldest, "session limit reached; dropping least recent");
            entries.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
