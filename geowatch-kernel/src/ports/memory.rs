/**
 * PORTS MÉMOIRE - Implémentations volatiles des collaborateurs
 *
 * RÔLE :
 * Base d'incidents, journal, file et cache tenus en mémoire derrière des
 * `parking_lot::Mutex`. Sert aux tests et au mode sans persistance ; la base
 * d'incidents mémoire reçoit aussi le seed JSON du mode fichier.
 *
 * FILE :
 * Le pop est fait sous le verrou (atomicité entre consommateurs concurrents) ;
 * un `tokio::sync::Notify` réveille les consommateurs bloqués à chaque push.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use super::{CacheStore, CheckLogStore, IncidentStore, QueueStore, StoreError};
use crate::geo;
use crate::models::{HazardCheckLog, Incident, Position};

/// Base d'incidents en mémoire, alimentée par la couche CRUD (ou le seed)
#[derive(Default)]
pub struct MemoryIncidentStore {
    incidents: Mutex<HashMap<Uuid, Incident>>,
}

impl MemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insère ou remplace un incident (par id)
    pub fn upsert(&self, incident: Incident) {
        self.incidents.lock().insert(incident.id, incident);
    }

    /// Suppression logique : l'incident reste stocké avec `is_active = false`
    pub fn soft_delete(&self, id: Uuid) -> bool {
        let mut incidents = self.incidents.lock();
        match incidents.get_mut(&id) {
            Some(incident) if incident.is_active => {
                incident.is_active = false;
                incident.updated_at = OffsetDateTime::now_utc();
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.incidents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn find_nearby(&self, point: Position, max_distance_m: f64) -> Result<Vec<Incident>, StoreError> {
        let incidents = self.incidents.lock();
        let mut nearby: Vec<(f64, Incident)> = incidents
            .values()
            .filter(|incident| incident.is_live())
            .map(|incident| (geo::distance(&point, &incident.center), incident))
            .filter(|(distance, _)| *distance <= max_distance_m)
            .map(|(distance, incident)| (distance, incident.clone()))
            .collect();

        nearby.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(nearby.into_iter().map(|(_, incident)| incident).collect())
    }

    async fn active_incidents(&self) -> Result<Vec<Incident>, StoreError> {
        let incidents = self.incidents.lock();
        let mut active: Vec<Incident> = incidents.values().filter(|i| i.is_live()).cloned().collect();
        // plus récents d'abord
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }
}

/// Journal des vérifications en mémoire
#[derive(Default)]
pub struct MemoryCheckLogStore {
    rows: Mutex<Vec<HazardCheckLog>>,
}

impl MemoryCheckLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copie de toutes les lignes (assertions de tests)
    pub fn rows(&self) -> Vec<HazardCheckLog> {
        self.rows.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CheckLogStore for MemoryCheckLogStore {
    async fn append(&self, entry: HazardCheckLog) -> Result<(), StoreError> {
        self.rows.lock().push(entry);
        Ok(())
    }

    async fn hazardous_since(&self, since: OffsetDateTime) -> Result<Vec<HazardCheckLog>, StoreError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|row| row.has_danger && row.created_at >= since)
            .cloned()
            .collect())
    }
}

/// Listes FIFO en mémoire
#[derive(Default)]
pub struct MemoryQueueStore {
    lists: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    pushed: Notify,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, key: &str) -> usize {
        self.lists.lock().get(key).map_or(0, VecDeque::len)
    }

    fn try_pop(&self, key: &str) -> Option<Vec<u8>> {
        self.lists.lock().get_mut(key).and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn push(&self, key: &str, blob: Vec<u8>) -> Result<(), StoreError> {
        self.lists.lock().entry(key.to_string()).or_default().push_back(blob);
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop_blocking(&self, key: &str, timeout: Duration) -> Result<Option<Vec<u8>>, StoreError> {
        wait_for_item(&self.pushed, timeout, || Ok(self.try_pop(key))).await
    }
}

/// Boucle d'attente commune aux files : le `Notified` est créé avant de
/// regarder la liste pour ne pas rater un push concurrent.
pub(crate) async fn wait_for_item<F>(
    pushed: &Notify,
    timeout: Duration,
    mut try_pop: F,
) -> Result<Option<Vec<u8>>, StoreError>
where
    F: FnMut() -> Result<Option<Vec<u8>>, StoreError>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let notified = pushed.notified();
        if let Some(item) = try_pop()? {
            return Ok(Some(item));
        }
        if tokio::time::timeout_at(deadline, notified).await.is_err() {
            return Ok(None);
        }
    }
}

/// Cache en mémoire avec expiration paresseuse (au get)
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((blob, _)) => Ok(Some(blob.clone())),
            None => Ok(None),
        }
    }

    async fn set_with_expiry(&self, key: &str, blob: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), (blob, Instant::now() + ttl));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IncidentStatus, Severity};
    use std::sync::Arc;

    fn incident_at(title: &str, latitude: f64, longitude: f64, radius: f64) -> Incident {
        let now = OffsetDateTime::now_utc();
        Incident {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            center: Position::new(latitude, longitude),
            radius,
            severity: Severity::Medium,
            status: IncidentStatus::Active,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_find_nearby_orders_by_distance_and_skips_far() {
        let store = MemoryIncidentStore::new();
        store.upsert(incident_at("far", 0.05, 0.0, 100.0)); // ~5.5 km
        store.upsert(incident_at("near", 0.01, 0.0, 100.0)); // ~1.1 km
        store.upsert(incident_at("outside", 0.2, 0.0, 100.0)); // ~22 km

        let found = store.find_nearby(Position::new(0.0, 0.0), 10_000.0).await.unwrap();
        let titles: Vec<&str> = found.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["near", "far"]);
    }

    #[tokio::test]
    async fn test_resolved_and_tombstoned_are_invisible() {
        let store = MemoryIncidentStore::new();
        let mut resolved = incident_at("resolved", 0.0, 0.0, 100.0);
        resolved.status = IncidentStatus::Resolved;
        let deleted = incident_at("deleted", 0.0, 0.0, 100.0);
        let deleted_id = deleted.id;
        store.upsert(resolved);
        store.upsert(deleted);

        assert!(store.soft_delete(deleted_id));
        assert!(!store.soft_delete(deleted_id), "second delete finds nothing live");
        assert_eq!(store.len(), 2, "soft delete keeps the row");

        assert!(store.find_nearby(Position::new(0.0, 0.0), 10_000.0).await.unwrap().is_empty());
        assert!(store.active_incidents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_log_filters_hazard_and_window() {
        let logs = MemoryCheckLogStore::new();
        let mut old = HazardCheckLog::new("old", Position::new(0.0, 0.0), true);
        old.created_at -= time::Duration::hours(2);
        logs.append(old).await.unwrap();
        logs.append(HazardCheckLog::new("safe", Position::new(0.0, 0.0), false)).await.unwrap();
        logs.append(HazardCheckLog::new("hit", Position::new(0.0, 0.0), true)).await.unwrap();

        let since = OffsetDateTime::now_utc() - time::Duration::hours(1);
        let rows = logs.hazardous_since(since).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "hit");
        assert_eq!(logs.len(), 3);
    }

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let queue = MemoryQueueStore::new();
        for blob in [b"a", b"b", b"c"] {
            queue.push("q", blob.to_vec()).await.unwrap();
        }
        let timeout = Duration::from_millis(10);
        assert_eq!(queue.pop_blocking("q", timeout).await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(queue.pop_blocking("q", timeout).await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(queue.pop_blocking("q", timeout).await.unwrap(), Some(b"c".to_vec()));
        assert_eq!(queue.pop_blocking("q", timeout).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blocking_pop_wakes_on_push() {
        let queue = Arc::new(MemoryQueueStore::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop_blocking("q", Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push("q", b"late".to_vec()).await.unwrap();

        let popped = consumer.await.unwrap().unwrap();
        assert_eq!(popped, Some(b"late".to_vec()));
    }

    #[tokio::test]
    async fn test_competing_consumers_never_share_an_item() {
        let queue = Arc::new(MemoryQueueStore::new());
        for i in 0..50u8 {
            queue.push("q", vec![i]).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Some(item) = queue.pop_blocking("q", Duration::from_millis(20)).await.unwrap() {
                    got.push(item[0]);
                }
                got
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..50u8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_cache_expires() {
        let cache = MemoryCacheStore::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set_with_expiry("k", b"v".to_vec(), Duration::from_millis(30)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
