//! GeoWatch kernel : surveillance de zones de danger géolocalisées
//!
//! Vérification synchrone de position contre les incidents actifs, effets de
//! bord détachés (journal, file de notifications), livraison webhook avec
//! retry et statistiques de présence par zone.

pub mod cache;
pub mod check;
pub mod config;
pub mod dispatcher;
pub mod effects;
pub mod geo;
pub mod http;
pub mod kernel;
pub mod models;
pub mod ports;
pub mod proximity;
pub mod queue;
pub mod stats;

pub use kernel::Kernel;
pub use ports::Stores;
