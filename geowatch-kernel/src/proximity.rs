//! Recherche de proximité en deux étages
//!
//! 1. Préfiltre grossier : la base d'incidents renvoie les incidents vivants
//!    dans un rayon global fixe (10 km par défaut), triés par distance.
//! 2. Filtre fin : chaque candidat n'est retenu que si la position est dans
//!    son propre rayon (borne incluse).

use std::sync::Arc;

use crate::geo;
use crate::models::{Incident, MatchedIncident, Position};
use crate::ports::{IncidentStore, StoreError};

/// Rayon du préfiltre grossier en mètres
pub const DEFAULT_COARSE_RADIUS_M: f64 = 10_000.0;

#[derive(Clone)]
pub struct ProximitySearch {
    store: Arc<dyn IncidentStore>,
    coarse_radius_m: f64,
}

impl ProximitySearch {
    pub fn new(store: Arc<dyn IncidentStore>, coarse_radius_m: f64) -> Self {
        Self { store, coarse_radius_m }
    }

    /// Candidats du préfiltre ; ne décide pas à lui seul du danger
    pub async fn candidates(&self, point: Position) -> Result<Vec<Incident>, StoreError> {
        let candidates = self.store.find_nearby(point, self.coarse_radius_m).await?;
        tracing::debug!(
            lat = point.latitude,
            lon = point.longitude,
            count = candidates.len(),
            "proximity prefilter"
        );
        Ok(candidates)
    }

    /// Préfiltre puis filtre fin
    pub async fn hazards_at(&self, point: Position) -> Result<Vec<MatchedIncident>, StoreError> {
        let candidates = self.candidates(point).await?;
        Ok(match_zones(point, &candidates))
    }
}

/// Garde les incidents dont le rayon couvre le point, dans l'ordre reçu
pub fn match_zones(point: Position, candidates: &[Incident]) -> Vec<MatchedIncident> {
    candidates
        .iter()
        .filter_map(|incident| {
            let distance = geo::distance(&point, &incident.center);
            (distance <= incident.radius).then(|| MatchedIncident::from_incident(incident, distance))
        })
        .collect()
}
