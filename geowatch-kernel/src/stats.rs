//! Statistiques par zone : utilisateurs distincts vus en danger récemment
//!
//! Pour chaque incident vivant, compte les `user_id` distincts parmi les
//! vérifications dangereuses de la fenêtre dont la position tombe dans le
//! rayon de l'incident. Zones à zéro omises, tri par effectif décroissant
//! (puis titre, puis id). `total` additionne les effectifs : un utilisateur
//! présent dans deux zones qui se chevauchent compte deux fois.

use std::collections::HashSet;
use std::sync::Arc;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

use crate::cache::ActiveIncidentCache;
use crate::geo;
use crate::models::{HazardCheckLog, Incident, StatsResponse, ZoneStat};
use crate::ports::{CheckLogStore, IncidentStore, StoreError};

#[derive(Clone)]
pub struct ZoneStatsAggregator {
    check_logs: Arc<dyn CheckLogStore>,
    incidents: Arc<dyn IncidentStore>,
    cache: ActiveIncidentCache,
    window: Duration,
}

impl ZoneStatsAggregator {
    pub fn new(
        check_logs: Arc<dyn CheckLogStore>,
        incidents: Arc<dyn IncidentStore>,
        cache: ActiveIncidentCache,
        window_minutes: u32,
    ) -> Self {
        if window_minutes == 0 {
            tracing::warn!("zone stats window is zero minutes, stats will always be empty");
        }
        Self {
            check_logs,
            incidents,
            cache,
            window: Duration::minutes(i64::from(window_minutes)),
        }
    }

    pub async fn compute(&self) -> Result<StatsResponse, StoreError> {
        self.compute_at(OffsetDateTime::now_utc()).await
    }

    pub async fn compute_at(&self, now: OffsetDateTime) -> Result<StatsResponse, StoreError> {
        let incidents = self.cache.get_or_refresh(self.incidents.as_ref()).await?;
        // borne basse saturée pour les fenêtres démesurées
        let since = now
            .checked_sub(self.window)
            .unwrap_or_else(|| PrimitiveDateTime::MIN.assume_utc());
        let rows = self.check_logs.hazardous_since(since).await?;
        let stats = aggregate(&incidents, &rows);
        tracing::debug!(zones = stats.zones.len(), total = stats.total, "zone stats computed");
        Ok(stats)
    }
}

/// Agrégation pure, sans accès aux stockages
pub fn aggregate(incidents: &[Incident], rows: &[HazardCheckLog]) -> StatsResponse {
    let mut zones: Vec<ZoneStat> = incidents
        .iter()
        .filter(|incident| incident.is_live())
        .filter_map(|incident| {
            let users: HashSet<&str> = rows
                .iter()
                .filter(|row| row.has_danger && geo::distance(&row.position, &incident.center) <= incident.radius)
                .map(|row| row.user_id.as_str())
                .collect();
            (!users.is_empty()).then(|| ZoneStat {
                incident_id: incident.id,
                title: incident.title.clone(),
                user_count: users.len(),
            })
        })
        .collect();

    zones.sort_by(|a, b| {
        b.user_count
            .cmp(&a.user_count)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.incident_id.cmp(&b.incident_id))
    });

    let total = zones.iter().map(|z| z.user_count).sum();
    StatsResponse { zones, total }
}
