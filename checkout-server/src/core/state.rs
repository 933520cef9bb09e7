//! Application state
//!
//! One [`ServerState`] is built at startup and cloned into every
//! request handler. All stores are in-process and shared through the
//! orchestrator handles.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::inventory::{HttpInventoryClient, InventoryClient};
use crate::ledger::IdempotencyLedger;
use crate::notify::{HttpNotificationDispatcher, NotificationDispatcher};
use crate::orchestrator::{Orchestrator, RetryPolicy};
use crate::orders::OrderStore;
use crate::payment::{AttemptStore, HttpPaymentGateway, PaymentGateway};
use crate::webhook::WebhookIngress;

#[derive(Clone)]
pub struct ServerState {
    config: Arc<Config>,
    orchestrator: Orchestrator,
    ingress: WebhookIngress,
    tasks: Arc<Mutex<BackgroundTasks>>,
}

impl ServerState {
    /// Build state with HTTP collaborator clients from configuration
    pub fn initialize(config: &Config) -> Self {
        let timeout = config.request_timeout();
        Self::with_collaborators(
            config,
            Arc::new(HttpPaymentGateway::new(
                config.payment_base_url.clone(),
                timeout,
            )),
            Arc::new(HttpInventoryClient::new(
                config.inventory_base_url.clone(),
                timeout,
            )),
            Arc::new(HttpNotificationDispatcher::new(
                config.notification_base_url.clone(),
                timeout,
            )),
        )
    }

    /// Build state around explicit collaborators, for tests
    pub fn with_collaborators(
        config: &Config,
        gateway: Arc<dyn PaymentGateway>,
        inventory: Arc<dyn InventoryClient>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let ledger = IdempotencyLedger::new(config.ledger_retention(), config.ledger_wait());
        let orchestrator = Orchestrator::new(
            Arc::new(OrderStore::new()),
            Arc::new(AttemptStore::new()),
            ledger,
            gateway,
            inventory,
            notifier,
            RetryPolicy {
                max_attempts: config.payment_retry_max_attempts,
                base_delay: config.retry_base_delay(),
            },
            config.webhook_timeout(),
        );
        let ingress = WebhookIngress::new(orchestrator.clone());

        Self {
            config: Arc::new(config.clone()),
            orchestrator,
            ingress,
            tasks: Arc::new(Mutex::new(BackgroundTasks::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn ingress(&self) -> &WebhookIngress {
        &self.ingress
    }

    /// Register and start the background tasks
    pub fn start_background_tasks(&self) {
        let mut tasks = self.tasks.lock();
        let token = tasks.shutdown_token();

        let ledger = self.orchestrator.ledger().clone();
        let interval = self.config.ledger_retention() / 10;
        tasks.spawn("ledger_purge", TaskKind::Periodic, async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let purged = ledger.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, "Expired idempotency records purged");
                        }
                    }
                }
            }
        });
    }

    /// Stop background tasks and wait for them to finish
    pub async fn shutdown(&self) {
        let tasks = {
            let mut guard = self.tasks.lock();
            guard.take_all()
        };
        tasks.shutdown().await;
    }
}
