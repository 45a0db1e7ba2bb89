//! Configuration du kernel GeoWatch
//!
//! Fichier YAML (`GEOWATCH_CONFIG`, défaut `kernel.yaml`) puis surcharges
//! d'environnement. Fichier absent ou vide : défauts. Fichier invalide :
//! message d'erreur et défauts, le service démarre quand même.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::proximity::DEFAULT_COARSE_RADIUS_M;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    pub server: ServerConf,
    pub search: SearchConf,
    pub webhook: WebhookConf,
    pub stats: StatsConf,
    pub cache: CacheConf,
    pub storage: StorageConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConf {
    pub bind: String,
}

impl Default for ServerConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".into() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConf {
    /// Rayon du préfiltre, en mètres
    pub coarse_radius_m: f64,
}

impl Default for SearchConf {
    fn default() -> Self {
        Self {
            coarse_radius_m: DEFAULT_COARSE_RADIUS_M,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WebhookConf {
    pub url: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub dequeue_timeout_secs: u64,
    pub idle_sleep_ms: u64,
    pub workers: usize,
}

impl Default for WebhookConf {
    fn default() -> Self {
        Self {
            url: "http://localhost:9090/webhook".into(),
            timeout_secs: 10,
            retry_attempts: 3,
            retry_delay_ms: 2_000,
            dequeue_timeout_secs: 5,
            idle_sleep_ms: 1_000,
            workers: 1,
        }
    }
}

impl WebhookConf {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_secs(self.dequeue_timeout_secs)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StatsConf {
    /// Non signé : une fenêtre négative est rejetée au chargement
    pub time_window_minutes: u32,
}

impl Default for StatsConf {
    fn default() -> Self {
        Self { time_window_minutes: 60 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CacheConf {
    pub ttl_secs: u64,
}

impl Default for CacheConf {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl CacheConf {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConf {
    pub data_dir: PathBuf,
    /// Seed JSON optionnel (tableau d'incidents)
    pub incidents_file: Option<PathBuf>,
}

impl Default for StorageConf {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            incidents_file: None,
        }
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("GEOWATCH_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    let mut cfg = load_config_from(Path::new(&path)).await;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    cfg
}

pub async fn load_config_from(path: &Path) -> KernelConfig {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return KernelConfig::default();
    }
    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "unreadable config, using defaults");
            return KernelConfig::default();
        }
    };
    if txt.trim().is_empty() {
        return KernelConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        tracing::error!(path = %path.display(), error = %e, "invalid config, using defaults");
        KernelConfig::default()
    })
}

/// `lookup` abstrait l'environnement pour rester testable sans `set_var`
pub fn apply_env_overrides(cfg: &mut KernelConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(bind) = lookup("GEOWATCH_BIND").filter(|v| !v.trim().is_empty()) {
        cfg.server.bind = bind;
    }
    if let Some(url) = lookup("GEOWATCH_WEBHOOK_URL").filter(|v| !v.trim().is_empty()) {
        cfg.webhook.url = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("nope.yaml")).await;
        assert_eq!(cfg, KernelConfig::default());
        assert_eq!(cfg.webhook.retry_attempts, 3);
        assert_eq!(cfg.webhook.retry_delay(), Duration::from_secs(2));
        assert_eq!(cfg.stats.time_window_minutes, 60);
    }

    #[tokio::test]
    async fn test_partial_yaml_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.yaml");
        std::fs::write(
            &path,
            "webhook:\n  url: http://hooks.local/in\n  retry_attempts: 5\nstats:\n  time_window_minutes: 15\n",
        )
        .unwrap();

        let cfg = load_config_from(&path).await;
        assert_eq!(cfg.webhook.url, "http://hooks.local/in");
        assert_eq!(cfg.webhook.retry_attempts, 5);
        assert_eq!(cfg.webhook.timeout_secs, 10);
        assert_eq!(cfg.stats.time_window_minutes, 15);
        assert_eq!(cfg.server, ServerConf::default());
    }

    #[tokio::test]
    async fn test_invalid_yaml_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.yaml");
        std::fs::write(&path, "webhook: [not, a, map").unwrap();
        assert_eq!(load_config_from(&path).await, KernelConfig::default());
    }

    #[tokio::test]
    async fn test_negative_window_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.yaml");
        std::fs::write(&path, "stats:\n  time_window_minutes: -30\n").unwrap();
        assert_eq!(load_config_from(&path).await.stats, StatsConf::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("GEOWATCH_BIND", "127.0.0.1:9999"), ("GEOWATCH_WEBHOOK_URL", "  ")].into();
        let mut cfg = KernelConfig::default();
        apply_env_overrides(&mut cfg, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.server.bind, "127.0.0.1:9999");
        // valeur vide ignorée
        assert_eq!(cfg.webhook.url, WebhookConf::default().url);
    }
}
