/**
 * CONTRÔLE DE POSITION - Orchestrateur du verdict de danger
 *
 * RÔLE :
 * Transforme (user_id, latitude, longitude) en verdict synchrone :
 * incidents dont la zone couvre la position + drapeau `has_danger`.
 *
 * FONCTIONNEMENT :
 * 1. Validation des bornes : rejet immédiat, aucun effet de bord
 * 2. Préfiltre grossier puis filtre fin (ProximitySearch)
 * 3. Soumission détachée : journal toujours, notification si danger
 *
 * La réponse est correcte que les effets de bord réussissent ou non ;
 * la latence ne dépend que de la recherche et du calcul de distance.
 */

use std::sync::Arc;
use time::OffsetDateTime;

use crate::effects::{EffectSink, SideEffect};
use crate::models::{HazardCheckLog, LocationCheckRequest, LocationCheckResponse, NotificationPayload, Position};
use crate::ports::StoreError;
use crate::proximity::ProximitySearch;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid latitude {0}: must be between -90 and 90")]
    Latitude(f64),
    #[error("invalid longitude {0}: must be between -180 and 180")]
    Longitude(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Faute client
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Faute serveur, pas de résultat partiel
    #[error("failed to find nearby incidents: {0}")]
    Search(#[from] StoreError),
}

/// Valide une position ; NaN et infinis sont hors bornes
pub fn validate_position(latitude: f64, longitude: f64) -> Result<Position, ValidationError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::Latitude(latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::Longitude(longitude));
    }
    Ok(Position::new(latitude, longitude))
}

#[derive(Clone)]
pub struct LocationChecker {
    search: ProximitySearch,
    effects: Arc<dyn EffectSink>,
}

impl LocationChecker {
    pub fn new(search: ProximitySearch, effects: Arc<dyn EffectSink>) -> Self {
        Self { search, effects }
    }

    pub async fn check(&self, req: &LocationCheckRequest) -> Result<LocationCheckResponse, CheckError> {
        let position = validate_position(req.latitude, req.longitude)?;

        let nearby_incidents = self.search.hazards_at(position).await?;
        let has_danger = !nearby_incidents.is_empty();

        tracing::debug!(
            user_id = %req.user_id,
            has_danger,
            matched = nearby_incidents.len(),
            "location checked"
        );

        self.effects
            .submit(SideEffect::RecordCheck(HazardCheckLog::new(&req.user_id, position, has_danger)));

        if has_danger {
            self.effects.submit(SideEffect::Notify(NotificationPayload {
                user_id: req.user_id.clone(),
                position,
                timestamp: OffsetDateTime::now_utc(),
                incidents: nearby_incidents.clone(),
            }));
        }

        Ok(LocationCheckResponse {
            nearby_incidents,
            has_danger,
        })
    }
}
