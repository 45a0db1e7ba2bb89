/**
 * PORTS FICHIER - Collaborateurs persistants sur disque local
 *
 * RÔLE :
 * - FileQueueStore : file de notifications durable, l'état complet des listes
 *   est réécrit (fichier temporaire + rename) après chaque push et chaque pop
 * - JsonlCheckLogStore : journal append-only, une ligne JSON par vérification
 * - load_incident_seed : chargement d'un tableau JSON d'incidents au démarrage
 *
 * LIMITES :
 * Pas d'acquittement : un élément retiré de la file l'est aussi du disque,
 * un crash avant livraison le perd (livraison au plus une fois).
 * Chaque push/pop réécrit tout le fichier en E/S bloquantes, verrou tenu :
 * coût O(longueur de la file) sur le thread du runtime. Adapté à un
 * déploiement mono-nœud à faible débit, pas à une file volumineuse.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Notify;

use super::memory::wait_for_item;
use super::{CheckLogStore, QueueStore, StoreError};
use crate::models::{HazardCheckLog, Incident};

type Lists = HashMap<String, VecDeque<Vec<u8>>>;

/// File FIFO durable, persistée en JSON
pub struct FileQueueStore {
    storage_path: PathBuf,
    lists: Mutex<Lists>,
    pushed: Notify,
}

impl FileQueueStore {
    /// Ouvre (ou crée) la file et recharge les éléments non consommés
    pub fn open<P: Into<PathBuf>>(storage_path: P) -> Result<Self, StoreError> {
        let path = storage_path.into();
        if !path.exists() {
            fs::write(&path, "{}")?;
        }

        let content = fs::read_to_string(&path)?;
        let lists: Lists = if content.trim().is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(&content)?
        };

        let pending: usize = lists.values().map(VecDeque::len).sum();
        tracing::info!(path = %path.display(), pending, "file queue opened");

        Ok(Self {
            storage_path: path,
            lists: Mutex::new(lists),
            pushed: Notify::new(),
        })
    }

    pub fn len(&self, key: &str) -> usize {
        self.lists.lock().get(key).map_or(0, VecDeque::len)
    }

    /// Réécrit l'état complet, verrou tenu : disque et mémoire restent alignés.
    /// E/S synchrones, bloque le worker tokio le temps de l'écriture.
    fn save_locked(&self, lists: &Lists) -> Result<(), StoreError> {
        let json = serde_json::to_vec(lists)?;
        let tmp = self.storage_path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.storage_path)?;
        Ok(())
    }

    fn try_pop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut lists = self.lists.lock();
        let Some(item) = lists.get_mut(key).and_then(VecDeque::pop_front) else {
            return Ok(None);
        };

        if let Err(e) = self.save_locked(&lists) {
            // on remet l'élément en tête : rien n'a été consommé
            lists.entry(key.to_string()).or_default().push_front(item);
            return Err(e);
        }
        Ok(Some(item))
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn push(&self, key: &str, blob: Vec<u8>) -> Result<(), StoreError> {
        {
            let mut lists = self.lists.lock();
            lists.entry(key.to_string()).or_default().push_back(blob);
            if let Err(e) = self.save_locked(&lists) {
                if let Some(list) = lists.get_mut(key) {
                    list.pop_back();
                }
                return Err(e);
            }
        }
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop_blocking(&self, key: &str, timeout: Duration) -> Result<Option<Vec<u8>>, StoreError> {
        wait_for_item(&self.pushed, timeout, || self.try_pop(key)).await
    }
}

/// Journal des vérifications au format JSON Lines
pub struct JsonlCheckLogStore {
    storage_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlCheckLogStore {
    pub fn open<P: Into<PathBuf>>(storage_path: P) -> Result<Self, StoreError> {
        let path = storage_path.into();
        // crée le fichier s'il n'existe pas
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            storage_path: path,
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl CheckLogStore for JsonlCheckLogStore {
    async fn append(&self, entry: HazardCheckLog) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().append(true).open(&self.storage_path)?;
        file.write_all(&line)?;
        Ok(())
    }

    async fn hazardous_since(&self, since: OffsetDateTime) -> Result<Vec<HazardCheckLog>, StoreError> {
        let content = {
            let _guard = self.write_lock.lock();
            fs::read_to_string(&self.storage_path)?
        };

        let mut rows = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HazardCheckLog>(line) {
                Ok(row) if row.has_danger && row.created_at >= since => rows.push(row),
                Ok(_) => {}
                Err(e) => tracing::warn!(line = n + 1, error = %e, "skipping malformed check log line"),
            }
        }
        Ok(rows)
    }
}

/// Charge un tableau JSON d'incidents ; les entrées géométriquement invalides sont ignorées
pub fn load_incident_seed(path: &Path) -> Result<Vec<Incident>, StoreError> {
    let content = fs::read_to_string(path)?;
    let incidents: Vec<Incident> = serde_json::from_str(&content)?;

    Ok(incidents
        .into_iter()
        .filter(|incident| {
            let ok = incident.is_well_formed();
            if !ok {
                tracing::warn!(id = %incident.id, title = %incident.title, "ignoring malformed incident in seed");
            }
            ok
        })
        .collect())
}
