//! Cache de l'ensemble des incidents actifs
//!
//! Instantané JSON stocké sous une clé unique avec expiration. Aucune
//! invalidation sur les écritures CRUD : l'obsolescence est bornée par le ttl.
//! Un miss (absence, expiration, entrée illisible) n'est pas une erreur.

use std::sync::Arc;
use std::time::Duration;

use crate::models::Incident;
use crate::ports::{CacheStore, IncidentStore, StoreError};

pub const ACTIVE_INCIDENTS_KEY: &str = "incidents:active";

#[derive(Clone)]
pub struct ActiveIncidentCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ActiveIncidentCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn put(&self, incidents: &[Incident], ttl: Duration) -> Result<(), StoreError> {
        let blob = serde_json::to_vec(incidents)?;
        self.store.set_with_expiry(ACTIVE_INCIDENTS_KEY, blob, ttl).await
    }

    /// `Ok(None)` = miss, à recalculer depuis la source de vérité
    pub async fn get(&self) -> Result<Option<Vec<Incident>>, StoreError> {
        let Some(blob) = self.store.get(ACTIVE_INCIDENTS_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&blob) {
            Ok(incidents) => Ok(Some(incidents)),
            Err(e) => {
                tracing::warn!(error = %e, "undecodable active-incident snapshot, treating as miss");
                Ok(None)
            }
        }
    }

    /// Instantané en cache, ou rechargement depuis la base sur miss.
    /// Un échec d'écriture du cache n'empêche pas de servir la valeur fraîche.
    pub async fn get_or_refresh(&self, source: &dyn IncidentStore) -> Result<Vec<Incident>, StoreError> {
        if let Some(cached) = self.get().await? {
            return Ok(cached);
        }

        let fresh = source.active_incidents().await?;
        if let Err(e) = self.put(&fresh, self.ttl).await {
            tracing::warn!(error = %e, "failed to cache active incidents");
        }
        Ok(fresh)
    }
}
