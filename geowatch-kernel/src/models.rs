/**
 * MODÈLES GEOWATCH - Formes de données partagées par tout le kernel
 *
 * RÔLE :
 * Incidents (zones de danger), journaux de vérification, payloads webhook
 * et statistiques de zones. Les formes JSON sont celles exposées sur l'API
 * et poussées dans la file de notifications.
 *
 * CONVENTION :
 * Les positions sont aplaties (`latitude`/`longitude` au premier niveau du JSON)
 * et les horodatages sont sérialisés en RFC 3339.
 */

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Point géographique en degrés décimaux
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Active,
    Resolved,
}

/// Zone de danger géolocalisée (lecture seule pour le kernel)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(flatten)]
    pub center: Position,
    /// Rayon de la zone en mètres
    pub radius: f64,
    pub severity: Severity,
    pub status: IncidentStatus,
    /// Tombstone : false = supprimé logiquement par la couche CRUD
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Incident {
    /// Vrai si l'incident participe aux recherches : statut actif et non supprimé
    pub fn is_live(&self) -> bool {
        self.is_active && self.status == IncidentStatus::Active
    }

    /// Vérifie l'invariant géométrique (coordonnées dans les bornes, rayon > 0)
    pub fn is_well_formed(&self) -> bool {
        (-90.0..=90.0).contains(&self.center.latitude)
            && (-180.0..=180.0).contains(&self.center.longitude)
            && self.radius.is_finite()
            && self.radius > 0.0
    }
}

/// Incident retenu par une vérification, avec sa distance calculée
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedIncident {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(flatten)]
    pub position: Position,
    pub radius: f64,
    pub severity: Severity,
    /// Distance utilisateur → centre de la zone, en mètres
    pub distance: f64,
}

impl MatchedIncident {
    pub fn from_incident(incident: &Incident, distance: f64) -> Self {
        Self {
            id: incident.id,
            title: incident.title.clone(),
            description: incident.description.clone(),
            position: incident.center,
            radius: incident.radius,
            severity: incident.severity,
            distance,
        }
    }
}

/// Ligne append-only écrite à chaque vérification valide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardCheckLog {
    pub id: Uuid,
    pub user_id: String,
    #[serde(flatten)]
    pub position: Position,
    pub has_danger: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl HazardCheckLog {
    pub fn new(user_id: &str, position: Position, has_danger: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            position,
            has_danger,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Message poussé dans la file puis livré au consommateur webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub user_id: String,
    #[serde(flatten)]
    pub position: Position,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub incidents: Vec<MatchedIncident>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationCheckRequest {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCheckResponse {
    pub nearby_incidents: Vec<MatchedIncident>,
    pub has_danger: bool,
}

/// Occupation d'une zone sur la fenêtre glissante (jamais persistée)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStat {
    pub incident_id: Uuid,
    pub title: String,
    pub user_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub zones: Vec<ZoneStat>,
    /// Somme des user_count : un utilisateur présent dans deux zones compte deux fois
    pub total: usize,
}
