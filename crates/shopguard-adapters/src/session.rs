use async_trait::async_trait;
use chrono::{Duration, Utc};
use shopguard_core::collaborators::{Session, SessionManager};
use shopguard_core::error::SessionError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Sessions keyed by opaque random tokens, kept in process memory.
#[derive(Debug)]
pub struct InMemorySessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl InMemorySessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Live session behind `token`. Expired sessions are dropped on lookup.
    pub async fn lookup(&self, token: &str) -> Option<Session> {
        {
            let sessions = self.sessions.read().await;
            let session = sessions.get(token)?;
            if Utc::now() - session.established_at < self.ttl {
                return Some(session.clone());
            }
        }
        self.sessions.write().await.remove(token);
        None
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for InMemorySessionManager {
    fn default() -> Self {
        Self::new(Duration::hours(12))
    }
}

#[async_trait]
impl SessionManager for InMemorySessionManager {
    async fn establish(&self, identity: &str) -> Result<Session, SessionError> {
        if identity.trim().is_empty() {
            return Err(SessionError::Establish("identity is required".to_string()));
        }

        let now = Utc::now();
        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            identity: identity.to_string(),
            established_at: now,
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, existing| now - existing.established_at < self.ttl);
        let swept = before - sessions.len();
        if swept > 0 {
            debug!(swept, "Expired sessions swept");
        }
        sessions.insert(session.token.clone(), session.clone());
        drop(sessions);

        info!(identity, "Session established");
        Ok(session)
    }

    async fn end(&self, token: &str) -> bool {
        let removed = self.sessions.write().await.remove(token);
        if let Some(session) = &removed {
            info!(identity = %session.identity, "Session ended");
        }
        removed.is_some()
    }
}
