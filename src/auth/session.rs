//! In-memory bearer sessions.

use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Session {
    user_id: i32,
    expires_at: Instant,
}

/// Token → user mapping with a fixed time-to-live.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Open a session and return its token (64 hex chars).
    pub fn create(&self, user_id: i32) -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        self.sessions.insert(
            token.clone(),
            Session {
                user_id,
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// User behind a live token. Expired tokens are dropped on lookup.
    pub fn resolve(&self, token: &str) -> Option<i32> {
        let session = *self.sessions.get(token)?;
        if session.expires_at <= Instant::now() {
            self.sessions.remove(token);
            return None;
        }
        Some(session.user_id)
    }

    /// Returns whether the token existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drop every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_resolve_revoke() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(7);
        assert_eq!(token.len(), 64);
        assert_eq!(store.resolve(&token), Some(7));
        assert!(store.revoke(&token));
        assert_eq!(store.resolve(&token), None);
        assert!(!store.revoke(&token));
    }

    #[test]
    fn test_expired_session() {
        let store = SessionStore::new(Duration::from_millis(0));
        let token = store.create(1);
        assert_eq!(store.resolve(&token), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge() {
        let store = SessionStore::new(Duration::from_millis(0));
        store.create(1);
        store.create(2);
        assert_eq!(store.purge_expired(), 2);
    }

    #[test]
    fn test_bearer_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }
}
