//! In-memory username -> PIN credential store. Lifecycle is process
//! lifetime; no persistent storage.

use std::collections::HashMap;

use tokio::sync::Mutex;

pub struct CredentialStore {
    pins: Mutex<HashMap<String, String>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        CredentialStore {
            pins: Mutex::new(HashMap::new()),
        }
    }

    pub async fn exists(&self, username: &str) -> bool {
        self.pins.lock().await.contains_key(username)
    }

    /// Registers `username` with `pin`. Caller must have already checked
    /// `exists`; this overwrites silently.
    pub async fn register(&self, username: &str, pin: &str) {
        self.pins
            .lock()
            .await
            .insert(username.to_string(), pin.to_string());
    }

    pub async fn check_pin(&self, username: &str, pin: &str) -> bool {
        match self.pins.lock().await.get(username) {
            Some(stored) => stored == pin,
            None => false,
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_username_does_not_exist() {
        let store = CredentialStore::new();
        assert!(!store.exists("alice").await);
    }

    #[tokio::test]
    async fn register_then_check_pin() {
        let store = CredentialStore::new();
        store.register("alice", "1234").await;
        assert!(store.exists("alice").await);
        assert!(store.check_pin("alice", "1234").await);
        assert!(!store.check_pin("alice", "0000").await);
    }

    #[tokio::test]
    async fn check_pin_for_unknown_user_fails() {
        let store = CredentialStore::new();
        assert!(!store.check_pin("ghost", "1234").await);
    }
}
