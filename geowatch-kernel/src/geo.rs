//! Distance géodésique (formule de haversine)

use crate::models::Position;

/// Rayon terrestre moyen en mètres
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance grand-cercle en mètres entre deux points.
/// Les coordonnées sont supposées déjà validées par l'appelant.
pub fn distance(a: &Position, b: &Position) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}
