/*!
Fixtures d'incidents et helpers géographiques pour les tests
*/

use geowatch_kernel::geo::EARTH_RADIUS_M;
use geowatch_kernel::models::{Incident, IncidentStatus, Position, Severity};
use time::OffsetDateTime;
use uuid::Uuid;

/// Construit un incident actif valide, ajustable champ par champ
pub struct IncidentBuilder {
    incident: Incident,
}

impl IncidentBuilder {
    pub fn new(title: &str, center: Position, radius: f64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            incident: Incident {
                id: Uuid::new_v4(),
                title: title.to_string(),
                description: format!("{title} (fixture)"),
                center,
                radius,
                severity: Severity::High,
                status: IncidentStatus::Active,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn resolved(mut self) -> Self {
        self.incident.status = IncidentStatus::Resolved;
        self
    }

    /// Suppression logique
    pub fn tombstoned(mut self) -> Self {
        self.incident.is_active = false;
        self
    }

    pub fn build(self) -> Incident {
        self.incident
    }
}

/// Point situé `meters` plus au nord sur le même méridien
pub fn offset_north(from: Position, meters: f64) -> Position {
    let degrees = (meters / EARTH_RADIUS_M).to_degrees();
    Position::new(from.latitude + degrees, from.longitude)
}
