//! The session store: one windowed history per chat id.
//!
//! Every lookup, insert, activity refresh and removal happens under the
//! single `sessions` lock. Each history additionally sits behind its own
//! lock so a caller can hold a [`SessionHandle`] without pinning the map.
//! Lock order is always map first, then history.

use crate::clock::{Clock, SystemClock};
use crate::turn::{Role, Turn};
use crate::window::TurnWindow;
use cb_core::SessionConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type SharedHistory = Arc<Mutex<TurnWindow>>;

struct SessionEntry {
    history: SharedHistory,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl SessionEntry {
    fn new(window: usize, now: DateTime<Utc>) -> Self {
        Self {
            history: Arc::new(Mutex::new(TurnWindow::new(window))),
            created_at: now,
            last_activity: now,
        }
    }

    /// A stamp in the future (clock stepped back) never counts as idle.
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.last_activity)
            .to_std()
            .map(|idle| idle > ttl)
            .unwrap_or(false)
    }
}

/// Handle to a live session's history.
///
/// Clones share the same underlying window, so turns appended through
/// [`SessionStore::append_turns`] show up in every handle for the same
/// session. Writes go through the store so an evicted session is never
/// written to.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    history: SharedHistory,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Copy of the retained turns. The history lock is released on return.
    pub fn turns(&self) -> Vec<Turn> {
        self.history.lock().to_vec()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }

    /// True when both handles point at the same session instance.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.history, &other.history)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}

/// Read-only view of a session for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub turns: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    window: usize,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(window: usize) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    pub fn with_clock(window: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            window: window.max(1),
            clock,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.history_window)
    }

    /// History capacity given to new sessions.
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Return the session for `id`, creating it on first use. Either way
    /// the session's activity stamp becomes now.
    pub fn get_or_create(&self, id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock();
        let now = self.clock.now();
        let entry = match sessions.entry(id.to_string()) {
            Entry::Occupied(occupied) => {
                tracing::info!(chat_id = %id, "Reusing existing conversation memory");
                let entry = occupied.into_mut();
                entry.last_activity = now;
                entry
            }
            Entry::Vacant(vacant) => {
                tracing::info!(chat_id = %id, window = self.window, "Creating conversation memory");
                vacant.insert(SessionEntry::new(self.window, now))
            }
        };
        SessionHandle {
            id: id.to_string(),
            history: Arc::clone(&entry.history),
        }
    }

    /// Append one turn. Returns `false` if the session no longer exists.
    pub fn append_turn(&self, id: &str, role: Role, text: impl Into<String>) -> bool {
        self.append_turns(id, [Turn::new(role, text)])
    }

    /// Append several turns as one unit: either all land or, when the
    /// session is gone, none do. Does not refresh the activity stamp.
    pub fn append_turns(&self, id: &str, turns: impl IntoIterator<Item = Turn>) -> bool {
        let sessions = self.sessions.lock();
        let Some(entry) = sessions.get(id) else {
            tracing::warn!(chat_id = %id, "Dropping turns for a session that no longer exists");
            return false;
        };
        let dropped = entry.history.lock().extend(turns);
        if dropped > 0 {
            tracing::debug!(chat_id = %id, dropped, "Trimmed oldest turns from history");
        }
        true
    }

    /// Remove every session idle for longer than `ttl` as of `now`.
    /// Idle times are computed while the lock is held, so a session
    /// refreshed just before the scan is never removed. Returns the
    /// removed ids.
    pub fn prune_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<String> {
        let mut sessions = self.sessions.lock();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, ttl))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
            tracing::info!(chat_id = %id, "Conversation memory expired and removed");
        }
        expired
    }

    /// [`prune_expired`](Self::prune_expired) at the store clock's now.
    pub fn sweep(&self, ttl: Duration) -> Vec<String> {
        let now = self.clock.now();
        self.prune_expired(now, ttl)
    }

    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        self.sessions.is_locked()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.lock().contains_key(id)
    }

    /// Copy of a session's turns without touching its activity stamp.
    pub fn snapshot(&self, id: &str) -> Option<Vec<Turn>> {
        let sessions = self.sessions.lock();
        sessions.get(id).map(|entry| entry.history.lock().to_vec())
    }

    pub fn last_activity(&self, id: &str) -> Option<DateTime<Utc>> {
        self.sessions.lock().get(id).map(|entry| entry.last_activity)
    }

    /// All sessions, most recently active first.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.lock();
        let mut out: Vec<SessionSummary> = sessions
            .iter()
            .map(|(id, entry)| SessionSummary {
                id: id.clone(),
                turns: entry.history.lock().len(),
                created_at: entry.created_at,
                last_activity: entry.last_activity,
            })
            .collect();
        out.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        out
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}
