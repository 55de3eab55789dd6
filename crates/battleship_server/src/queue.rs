//! Ordered matchmaking queue. Positions 0 and 1 are the active pair;
//! positions >= 2 are spectators. The whole collection lives behind a
//! single mutex; iteration is always done against a snapshot captured
//! under the lock.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::session::Session;

pub struct Queue {
    sessions: Mutex<Vec<Arc<Session>>>,
}

impl Queue {
    pub fn new() -> Self {
        Queue {
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub async fn push(&self, session: Arc<Session>) {
        self.sessions.lock().await.push(session);
    }

    /// Inserts `session` at `index`, shifting later entries back. Used by
    /// the reconnect path to restore a returning player to their
    /// original slot.
    pub async fn insert_at(&self, index: usize, session: Arc<Session>) {
        let mut guard = self.sessions.lock().await;
        let index = index.min(guard.len());
        guard.insert(index, session);
    }

    pub async fn remove_username(&self, username: &str) {
        let mut guard = self.sessions.lock().await;
        guard.retain(|s| s.username() != Some(username));
    }

    /// A point-in-time copy of the queue, safe to iterate without holding
    /// the lock.
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().await.clone()
    }

    pub async fn position(&self, username: &str) -> Option<usize> {
        self.sessions
            .lock()
            .await
            .iter()
            .position(|s| s.username() == Some(username))
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns the front two sessions if both are present, authenticated
    /// and still connected.
    pub async fn front_pair(&self) -> Option<(Arc<Session>, Arc<Session>)> {
        let guard = self.sessions.lock().await;
        if guard.len() < 2 {
            return None;
        }
        let a = &guard[0];
        let b = &guard[1];
        if a.username().is_some() && a.is_connected() && b.username().is_some() && b.is_connected()
        {
            Some((a.clone(), b.clone()))
        } else {
            None
        }
    }

    /// Post-match rotation: winner moves to the head, loser to the tail.
    pub async fn rotate_after_match(&self, winner: &str, loser: &str) {
        let mut guard = self.sessions.lock().await;
        let winner_session = remove_by_name(&mut guard, winner);
        let loser_session = remove_by_name(&mut guard, loser);
        if let Some(w) = winner_session {
            guard.insert(0, w);
        }
        if let Some(l) = loser_session {
            guard.push(l);
        }
    }
}

fn remove_by_name(sessions: &mut Vec<Arc<Session>>, username: &str) -> Option<Arc<Session>> {
    let idx = sessions.iter().position(|s| s.username() == Some(username))?;
    Some(sessions.remove(idx))
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}
