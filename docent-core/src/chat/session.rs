//! In-memory conversation sessions with idle expiry.

use super::history::{merge_client_history, HistoryMessage, Turn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Stored turns of one conversation.
#[derive(Debug, Default)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The most recent `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    pub fn merge_client_history(&mut self, client: &[HistoryMessage], max_history: usize) -> usize {
        merge_client_history(&mut self.turns, client, max_history)
    }

    pub fn history(&self) -> Vec<HistoryMessage> {
        self.turns.iter().map(HistoryMessage::from).collect()
    }
}

struct Entry {
    session: Arc<tokio::sync::Mutex<Session>>,
    last_active: Instant,
}

/// Sessions keyed by id.
///
/// The map lock is held only for lookup, insert and sweep. Each session has
/// its own async mutex which a turn holds for its whole duration, so turns
/// of one session are serialized while distinct sessions run concurrently.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Entry>>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up or creates the session, marks it active at `now`, then drops
    /// every session idle for longer than the timeout.
    pub fn checkout(&self, id: &str, now: Instant) -> Arc<tokio::sync::Mutex<Session>> {
        let mut sessions = self.map();

        let entry = sessions.entry(id.to_string()).or_insert_with(|| {
            debug!(session = id, "Creating session");
            Entry {
                session: Arc::new(tokio::sync::Mutex::new(Session::default())),
                last_active: now,
            }
        });
        entry.last_active = now;
        let session = Arc::clone(&entry.session);

        Self::sweep(&mut sessions, now, self.timeout);
        session
    }

    /// Removes every session idle for longer than the timeout at `now`.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        Self::sweep(&mut self.map(), now, self.timeout)
    }

    fn sweep(sessions: &mut HashMap<String, Entry>, now: Instant, timeout: Duration) -> usize {
        let before = sessions.len();
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_active) <= timeout);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, remaining = sessions.len(), "Expired idle sessions");
        }
        removed
    }

    /// Forgets a session. Unknown ids are ignored.
    pub fn reset(&self, id: &str) -> bool {
        self.map().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.map().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Stored history of a session; empty if the session does not exist.
    pub async fn history(&self, id: &str) -> Vec<HistoryMessage> {
        let session = self.map().get(id).map(|entry| Arc::clone(&entry.session));
        match session {
            Some(session) => session.lock().await.history(),
            None => Vec::new(),
        }
    }
}
