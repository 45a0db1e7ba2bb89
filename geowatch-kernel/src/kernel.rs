/**
 * ASSEMBLAGE DU KERNEL - Câblage des composants autour des stockages
 *
 * RÔLE :
 * Construit une fois, au démarrage, tout ce qui partage les collaborateurs :
 * recherche de proximité, cache, contrôleur de position (branché sur un
 * worker d'effets), agrégateur de stats, file de notifications et pool de
 * dispatchers webhook.
 *
 * CYCLE DE VIE :
 * - start() doit être appelé dans un runtime tokio (tâches lancées)
 * - router() fournit l'application axum
 * - shutdown() annule et attend les dispatchers ; la file n'est pas vidée
 */

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::ActiveIncidentCache;
use crate::check::LocationChecker;
use crate::config::KernelConfig;
use crate::dispatcher::{WebhookDispatcher, WebhookSink};
use crate::effects::EffectWorker;
use crate::http::{build_router, AppState};
use crate::ports::Stores;
use crate::proximity::ProximitySearch;
use crate::queue::NotificationQueue;
use crate::stats::ZoneStatsAggregator;

pub struct Kernel {
    app_state: AppState,
    cancel: CancellationToken,
    dispatchers: Vec<JoinHandle<()>>,
}

impl Kernel {
    pub fn start(config: &KernelConfig, stores: Stores, sink: Arc<dyn WebhookSink>) -> Self {
        let queue = NotificationQueue::new(stores.queue.clone());
        let cache = ActiveIncidentCache::new(stores.cache.clone(), config.cache.ttl());
        let search = ProximitySearch::new(stores.incidents.clone(), config.search.coarse_radius_m);

        let (effects, _worker) = EffectWorker::spawn(stores.check_logs.clone(), queue.clone());
        let checker = LocationChecker::new(search, effects);
        let stats = ZoneStatsAggregator::new(
            stores.check_logs.clone(),
            stores.incidents.clone(),
            cache,
            config.stats.time_window_minutes,
        );

        let cancel = CancellationToken::new();
        let workers = config.webhook.workers.max(1);
        let dispatcher = WebhookDispatcher::new(queue.clone(), sink, &config.webhook);
        let dispatchers = (0..workers)
            .map(|_| dispatcher.clone().spawn(cancel.child_token()))
            .collect();

        tracing::info!(
            workers,
            webhook = %config.webhook.url,
            coarse_radius_m = config.search.coarse_radius_m,
            "kernel started"
        );

        Self {
            app_state: AppState {
                checker: Arc::new(checker),
                stats: Arc::new(stats),
            },
            cancel,
            dispatchers,
        }
    }

    pub fn router(&self) -> axum::Router {
        build_router(self.app_state.clone())
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.dispatchers {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "webhook dispatcher task failed");
            }
        }
        tracing::info!("kernel stopped");
    }
}
