/**
 * EFFETS DE BORD - Travail "fire-and-forget" du chemin de vérification
 *
 * RÔLE :
 * Le contrôleur de position soumet ses effets (écriture du journal, mise en
 * file du webhook) sans jamais les attendre. `EffectSink::submit` ne renvoie
 * rien : aucun échec ne remonte à l'appelant, il est seulement journalisé.
 *
 * FONCTIONNEMENT :
 * - canal mpsc non borné : submit ne bloque jamais la requête
 * - une tâche worker consomme le canal et lance chaque effet dans sa propre
 *   tâche détachée (pas d'ordre garanti, pas d'annulation propagée)
 */

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::{HazardCheckLog, NotificationPayload};
use crate::ports::CheckLogStore;
use crate::queue::NotificationQueue;

#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Ligne de journal, écrite pour chaque vérification valide
    RecordCheck(HazardCheckLog),
    /// Notification à livrer, uniquement si danger
    Notify(NotificationPayload),
}

/// Point de soumission des effets ; aucune poignée de résultat
pub trait EffectSink: Send + Sync {
    fn submit(&self, effect: SideEffect);
}

/// Worker de fond qui exécute les effets soumis
pub struct EffectWorker {
    tx: mpsc::UnboundedSender<SideEffect>,
}

impl EffectWorker {
    /// Démarre le worker ; il vit tant qu'un émetteur existe
    pub fn spawn(check_logs: Arc<dyn CheckLogStore>, queue: NotificationQueue) -> (Arc<Self>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<SideEffect>();

        let handle = tokio::spawn(async move {
            while let Some(effect) = rx.recv().await {
                let check_logs = check_logs.clone();
                let queue = queue.clone();
                tokio::spawn(async move { run_effect(effect, check_logs.as_ref(), &queue).await });
            }
            tracing::debug!("effect worker stopped");
        });

        (Arc::new(Self { tx }), handle)
    }
}

impl EffectSink for EffectWorker {
    fn submit(&self, effect: SideEffect) {
        if self.tx.send(effect).is_err() {
            tracing::warn!("effect worker is gone, side effect discarded");
        }
    }
}

async fn run_effect(effect: SideEffect, check_logs: &dyn CheckLogStore, queue: &NotificationQueue) {
    match effect {
        SideEffect::RecordCheck(entry) => {
            let user_id = entry.user_id.clone();
            if let Err(e) = check_logs.append(entry).await {
                tracing::warn!(%user_id, error = %e, "failed to save location check");
            }
        }
        SideEffect::Notify(payload) => {
            if let Err(e) = queue.enqueue(&payload).await {
                tracing::warn!(user_id = %payload.user_id, error = %e, "failed to enqueue webhook");
            }
        }
    }
}
