//! Server-side records behind the session cookie.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store;
use tower_sessions::SessionStore;
use tracing::debug;

/// Cookie session records kept in process memory.
///
/// Expired records are never returned and are swept whenever a record is saved, so the map
/// only holds sessions that are still live.
#[derive(Debug, Clone, Default)]
pub struct CookieSessionStore {
    records: Arc<RwLock<HashMap<Id, Record>>>,
}

impl CookieSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn is_live(record: &Record, now: OffsetDateTime) -> bool {
    record.expiry_date > now
}

#[async_trait]
impl SessionStore for CookieSessionStore {
    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let now = OffsetDateTime::now_utc();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, existing| is_live(existing, now));
        let swept = before - records.len();
        if swept > 0 {
            debug!(swept, "Expired cookie sessions swept");
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, id: &Id) -> session_store::Result<Option<Record>> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .records
            .read()
            .await
            .get(id)
            .filter(|record| is_live(record, now))
            .cloned())
    }

    async fn delete(&self, id: &Id) -> session_store::Result<()> {
        self.records.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn record(expires_in: Duration) -> Record {
        Record {
            id: Id::default(),
            data: HashMap::new(),
            expiry_date: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[tokio::test]
    async fn live_records_round_trip_and_delete() {
        let store = CookieSessionStore::new();
        let live = record(Duration::minutes(5));

        store.save(&live).await.unwrap();
        assert!(store.load(&live.id).await.unwrap().is_some());

        store.delete(&live.id).await.unwrap();
        assert!(store.load(&live.id).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn expired_records_are_hidden_and_swept() {
        let store = CookieSessionStore::new();
        for _ in 0..100 {
            let expired = record(Duration::seconds(-1));
            store.save(&expired).await.unwrap();
            assert!(store.load(&expired.id).await.unwrap().is_none());
        }

        store.save(&record(Duration::minutes(5))).await.unwrap();
        assert_eq!(store.len().await, 1);
    }
}
