/*!
# GeoWatch DevKit - Stubs et utilitaires de test

- Stub webhook HTTP (succès, pannes simulées) pour exercer le dispatcher
- Fixtures d'incidents et helpers géographiques
- Harness qui démarre un kernel complet sur un port éphémère
*/

pub mod fixtures;
pub mod test_utils;
pub mod webhook_stub;

pub use fixtures::{offset_north, IncidentBuilder};
pub use test_utils::TestHarness;
pub use webhook_stub::{StubBehavior, StubWebhookServer};
