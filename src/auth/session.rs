use std::sync::{Arc, Mutex};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use log::{debug, info};
use uuid::Uuid;

use crate::auth::jwt::{Claims, JwtValidator};

pub const MAX_CONNECTIONS: usize = 1000;

// Connection tracking; `email` is set only for token-authenticated sockets
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub session_id: String,
    pub email: Option<String>,
    pub peer_addr: String,
    pub connected_at: Instant,
}

#[derive(Debug, Default, PartialEq)]
pub struct SessionStats {
    pub total: usize,
    pub authenticated: usize,
    pub oldest: Option<Duration>,
}

#[derive(Clone)]
pub struct SessionManager {
    active_sessions: Arc<Mutex<HashMap<String, ConnectionInfo>>>,
    jwt_validator: Arc<JwtValidator>,
    max_connections: usize,
}

impl SessionManager {
    pub fn new(jwt_secret: &str) -> Self {
        Self::with_limit(jwt_secret, MAX_CONNECTIONS)
    }

    pub fn with_limit(jwt_secret: &str, max_connections: usize) -> Self {
        Self {
            active_sessions: Arc::new(Mutex::new(HashMap::new())),
            jwt_validator: Arc::new(JwtValidator::new(jwt_secret)),
            max_connections,
        }
    }

    pub fn validate_jwt(&self, token: &str) -> Result<Claims, String> {
        self.jwt_validator.validate_token(token)
    }

    /// Register a live connection and hand back its session id.
    pub fn try_acquire_session(&self, peer_addr: &str, claims: Option<&Claims>) -> Result<String, String> {
        let mut sessions = self.active_sessions.lock()
            .map_err(|_| "Session lock poisoned".to_string())?;

        if sessions.len() >= self.max_connections {
            return Err("Maximum connections reached".to_string());
        }

        // Several tabs may share one token, so the token's jti is only a prefix
        let session_id = match claims {
            Some(claims) => format!("{}-{}", claims.jti, Uuid::new_v4().simple()),
            None => Uuid::new_v4().to_string(),
        };

        sessions.insert(session_id.clone(), ConnectionInfo {
            session_id: session_id.clone(),
            email: claims.map(|c| c.sub.clone()),
            peer_addr: peer_addr.to_string(),
            connected_at: Instant::now(),
        });

        Ok(session_id)
    }

    pub fn release_session(&self, session_id: &str) -> Result<(), String> {
        let mut sessions = self.active_sessions.lock()
            .map_err(|_| "Session lock poisoned".to_string())?;
        sessions.remove(session_id);
        Ok(())
    }

    pub fn get_session_count(&self) -> usize {
        self.active_sessions.lock()
            .map(|sessions| sessions.len())
            .unwrap_or(0)
    }

    pub fn session_stats(&self) -> SessionStats {
        let sessions = match self.active_sessions.lock() {
            Ok(sessions) => sessions,
            Err(_) => return SessionStats::default(),
        };

        SessionStats {
            total: sessions.len(),
            authenticated: sessions.values().filter(|info| info.email.is_some()).count(),
            oldest: sessions.values().map(|info| info.connected_at.elapsed()).max(),
        }
    }

    pub fn log_session_stats(&self) {
        let stats = self.session_stats();
        info!("Active connections: {}/{} ({} authenticated)",
              stats.total, self.max_connections, stats.authenticated);
        if let Some(oldest) = stats.oldest {
            info!("Oldest connection open for {}s", oldest.as_secs());
        }

        if let Ok(sessions) = self.active_sessions.lock() {
            for info in sessions.values() {
                debug!("  {} {} {} ({}s)",
                       info.session_id,
                       info.peer_addr,
                       info.email.as_deref().unwrap_or("anonymous"),
                       info.connected_at.elapsed().as_secs());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn claims(email: &str) -> Claims {
        Claims {
            sub: email.to_string(),
            jti: "token-id".to_string(),
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn test_session_manager_creation() {
        let manager = SessionManager::new(SECRET);
        assert_eq!(manager.get_session_count(), 0);
    }

    #[test]
    fn test_acquire_and_release() {
        let manager = SessionManager::new(SECRET);
        let anon = manager.try_acquire_session("127.0.0.1:1", None).unwrap();
        let first = manager.try_acquire_session("127.0.0.1:2", Some(&claims("a@b.c"))).unwrap();
        let second = manager.try_acquire_session("127.0.0.1:3", Some(&claims("a@b.c"))).unwrap();

        assert_ne!(first, second);
        assert_eq!(manager.get_session_count(), 3);

        let stats = manager.session_stats();
        assert_eq!((stats.total, stats.authenticated), (3, 2));
        assert!(stats.oldest.is_some());

        manager.release_session(&anon).unwrap();
        manager.release_session(&first).unwrap();
        assert_eq!(manager.get_session_count(), 1);
    }

    #[test]
    fn test_stats_when_idle() {
        let manager = SessionManager::new(SECRET);
        assert_eq!(manager.session_stats(), SessionStats::default());
        manager.log_session_stats();
    }

    #[test]
    fn test_connection_limit() {
        let manager = SessionManager::with_limit(SECRET, 1);
        manager.try_acquire_session("127.0.0.1:1", None).unwrap();
        let err = manager.try_acquire_session("127.0.0.1:2", None).unwrap_err();
        assert_eq!(err, "Maximum connections reached");
    }
}
