/**
 * FILE DE NOTIFICATIONS - Transport FIFO des payloads webhook
 *
 * RÔLE :
 * Encode les NotificationPayload en JSON et les pousse dans la liste
 * `webhook:queue` du QueueStore ; le dispatcher les retire un par un.
 *
 * SÉMANTIQUE :
 * - dequeue(timeout) bloque au plus `timeout` et renvoie `None` si rien n'arrive
 * - la propriété passe à l'appelant au moment du retrait : pas d'acquittement,
 *   pas de délai de visibilité, donc livraison au plus une fois
 */

use std::sync::Arc;
use std::time::Duration;

use crate::models::NotificationPayload;
use crate::ports::{QueueStore, StoreError};

pub const WEBHOOK_QUEUE_KEY: &str = "webhook:queue";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to encode webhook payload: {0}")]
    Encode(#[source] serde_json::Error),
    /// L'élément illisible a déjà été retiré de la file
    #[error("failed to decode webhook payload: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Clone)]
pub struct NotificationQueue {
    store: Arc<dyn QueueStore>,
    key: String,
}

impl NotificationQueue {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self::with_key(store, WEBHOOK_QUEUE_KEY)
    }

    pub fn with_key(store: Arc<dyn QueueStore>, key: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
        }
    }

    pub async fn enqueue(&self, payload: &NotificationPayload) -> Result<(), QueueError> {
        let blob = serde_json::to_vec(payload).map_err(QueueError::Encode)?;
        self.store.push(&self.key, blob).await?;
        tracing::debug!(user_id = %payload.user_id, incidents = payload.incidents.len(), "webhook payload enqueued");
        Ok(())
    }

    /// `Ok(None)` sur timeout : c'est l'état de repos normal
    pub async fn dequeue(&self, timeout: Duration) -> Result<Option<NotificationPayload>, QueueError> {
        let Some(blob) = self.store.pop_blocking(&self.key, timeout).await? else {
            return Ok(None);
        };
        let payload = serde_json::from_slice(&blob).map_err(QueueError::Decode)?;
        Ok(Some(payload))
    }
}
