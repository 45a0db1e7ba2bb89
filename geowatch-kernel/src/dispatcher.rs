/**
 * DISPATCHER WEBHOOK - Consommateur de la file de notifications
 *
 * RÔLE :
 * Boucle longue durée qui retire les payloads de `webhook:queue` et les
 * livre par HTTP POST au webhook configuré, avec retry linéaire.
 *
 * FONCTIONNEMENT :
 * - dequeue avec timeout court ; rien ou erreur => pause puis on reboucle
 * - livraison : jusqu'à `max_attempts` essais, pause `essai × délai` entre
 *   deux échecs (jamais après le dernier), puis abandon journalisé
 * - l'annulation est observée pendant l'attente de la file et la pause ;
 *   un payload déjà retiré termine sa séquence de livraison
 *
 * Plusieurs dispatchers peuvent se partager la même file : seul le pop
 * atomique du QueueStore les départage.
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WebhookConf;
use crate::models::NotificationPayload;
use crate::queue::NotificationQueue;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("webhook returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("webhook transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Destination d'une livraison ; un essai = un appel
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError>;
}

/// POST JSON vers une URL fixe
pub struct HttpWebhookSink {
    client: reqwest::Client,
    url: String,
}

impl HttpWebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }

    pub fn from_conf(conf: &WebhookConf) -> Result<Self, DeliveryError> {
        Self::new(conf.url.clone(), conf.timeout())
    }
}

#[async_trait]
impl WebhookSink for HttpWebhookSink {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        let resp = self.client.post(&self.url).json(payload).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        // corps best-effort, utile au diagnostic
        let body = resp.text().await.unwrap_or_default();
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    retry_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` est ramené à 1 au minimum
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause après l'échec de l'essai `attempt` (numéroté à partir de 1)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Dropped { attempts: u32, last_error: DeliveryError },
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    queue: NotificationQueue,
    sink: Arc<dyn WebhookSink>,
    policy: RetryPolicy,
    dequeue_timeout: Duration,
    idle_sleep: Duration,
}

impl WebhookDispatcher {
    pub fn new(queue: NotificationQueue, sink: Arc<dyn WebhookSink>, conf: &WebhookConf) -> Self {
        Self {
            queue,
            sink,
            policy: RetryPolicy::new(conf.retry_attempts, conf.retry_delay()),
            dequeue_timeout: conf.dequeue_timeout(),
            idle_sleep: conf.idle_sleep(),
        }
    }

    pub async fn deliver_with_retry(&self, payload: &NotificationPayload) -> DeliveryOutcome {
        let mut attempt = 1;
        loop {
            match self.sink.deliver(payload).await {
                Ok(()) => {
                    tracing::info!(user_id = %payload.user_id, attempt, "webhook delivered");
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(e) if attempt < self.policy.max_attempts => {
                    let pause = self.policy.backoff(attempt);
                    tracing::warn!(user_id = %payload.user_id, attempt, error = %e, ?pause, "webhook attempt failed");
                    tokio::time::sleep(pause).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        user_id = %payload.user_id,
                        attempts = attempt,
                        error = %e,
                        "webhook delivery failed, payload dropped"
                    );
                    return DeliveryOutcome::Dropped {
                        attempts: attempt,
                        last_error: e,
                    };
                }
            }
        }
    }

    /// Boucle jusqu'à annulation du jeton
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("webhook dispatcher started");
        loop {
            // l'annulation passe avant tout nouveau retrait
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = self.queue.dequeue(self.dequeue_timeout) => next,
            };

            match next {
                Ok(Some(payload)) => {
                    self.deliver_with_retry(&payload).await;
                    continue;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "failed to dequeue webhook payload"),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.idle_sleep) => {}
            }
        }
        tracing::info!("webhook dispatcher stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
