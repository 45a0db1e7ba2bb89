/**
 * PORTS COLLABORATEURS - Contrats des stockages externes consommés par le kernel
 *
 * RÔLE :
 * Le cœur GeoWatch ne connaît que ces traits. Base d'incidents, journal des
 * vérifications, file de notifications et cache sont des collaborateurs
 * injectés une seule fois au démarrage (`Stores`), jamais des singletons.
 *
 * FONCTIONNEMENT :
 * - IncidentStore = recherche par rayon + liste des incidents actifs
 * - CheckLogStore = journal append-only des vérifications
 * - QueueStore = listes FIFO de blobs opaques avec pop bloquant atomique
 * - CacheStore = get / set avec expiration
 *
 * IMPLÉMENTATIONS :
 * - `memory` : tout en mémoire (tests, mode volatile)
 * - `file` : file et journal persistés sur disque, incidents chargés d'un seed JSON
 */

pub mod file;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

use crate::config::StorageConf;
use crate::models::{HazardCheckLog, Incident, Position};

/// Erreurs possibles lors des opérations sur les collaborateurs
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lecture de l'ensemble persistant des incidents
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Incidents vivants (actifs, non supprimés) dont le centre est à moins de
    /// `max_distance_m` du point, triés par distance croissante.
    /// Ne doit omettre aucun incident vivant dans le rayon.
    async fn find_nearby(&self, point: Position, max_distance_m: f64) -> Result<Vec<Incident>, StoreError>;

    /// Tous les incidents vivants
    async fn active_incidents(&self) -> Result<Vec<Incident>, StoreError>;
}

/// Journal append-only des vérifications de position
#[async_trait]
pub trait CheckLogStore: Send + Sync {
    async fn append(&self, entry: HazardCheckLog) -> Result<(), StoreError>;

    /// Lignes avec `has_danger = true` et `created_at >= since`
    async fn hazardous_since(&self, since: OffsetDateTime) -> Result<Vec<HazardCheckLog>, StoreError>;
}

/// Listes FIFO nommées de blobs opaques
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Ajoute en queue de liste
    async fn push(&self, key: &str, blob: Vec<u8>) -> Result<(), StoreError>;

    /// Retire la tête de liste en attendant au plus `timeout`.
    /// `Ok(None)` = rien à consommer, ce n'est pas une erreur.
    /// Le retrait est atomique : deux consommateurs ne reçoivent jamais le même élément.
    async fn pop_blocking(&self, key: &str, timeout: Duration) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Cache clé/valeur avec expiration
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` si absent ou expiré
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set_with_expiry(&self, key: &str, blob: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;
}

/// Poignées partagées vers les collaborateurs, construites une fois au démarrage
#[derive(Clone)]
pub struct Stores {
    pub incidents: Arc<dyn IncidentStore>,
    pub check_logs: Arc<dyn CheckLogStore>,
    pub queue: Arc<dyn QueueStore>,
    pub cache: Arc<dyn CacheStore>,
}

impl Stores {
    /// Jeu entièrement volatile : rien ne survit au redémarrage
    pub fn in_memory() -> Self {
        Self {
            incidents: Arc::new(memory::MemoryIncidentStore::new()),
            check_logs: Arc::new(memory::MemoryCheckLogStore::new()),
            queue: Arc::new(memory::MemoryQueueStore::new()),
            cache: Arc::new(memory::MemoryCacheStore::new()),
        }
    }

    /// Jeu persistant : file et journal sous `data_dir`, incidents depuis le seed
    pub fn open(conf: &StorageConf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&conf.data_dir)?;

        let incidents = memory::MemoryIncidentStore::new();
        if let Some(seed) = &conf.incidents_file {
            let loaded = file::load_incident_seed(seed)?;
            tracing::info!(count = loaded.len(), path = %seed.display(), "incident seed loaded");
            for incident in loaded {
                incidents.upsert(incident);
            }
        }

        let queue = file::FileQueueStore::open(conf.data_dir.join("queue.json"))?;
        let check_logs = file::JsonlCheckLogStore::open(conf.data_dir.join("checks.jsonl"))?;

        Ok(Self {
            incidents: Arc::new(incidents),
            check_logs: Arc::new(check_logs),
            queue: Arc::new(queue),
            cache: Arc::new(memory::MemoryCacheStore::new()),
        })
    }
}
