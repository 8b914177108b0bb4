use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::manager::{Inner, TaskManager};
use super::registry::Registry;
use super::runner::Runner;
use crate::config::Config;
use crate::events::Bus;
use crate::store::{RetryStore, StoreRef};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::transport::Transport;

/// Builder for a [`TaskManager`].
pub struct TaskManagerBuilder {
    cfg: Config,
    registry: Registry,
    store: StoreRef,
    transport: Option<Arc<dyn Transport>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl TaskManagerBuilder {
    pub(crate) fn new(registry: Registry, store: StoreRef) -> Self {
        Self {
            cfg: Config::default(),
            registry,
            store,
            transport: None,
            subscribers: Vec::new(),
        }
    }

    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the dispatcher used by `schedule`.
    pub fn with_transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the manager.
    ///
    /// - seals the registry
    /// - wraps the store in a [`RetryStore`] when `store_attempts > 1`
    /// - starts the subscriber listener
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> TaskManager {
        self.registry.seal();

        let store: StoreRef = if self.cfg.retries_store() {
            Arc::new(RetryStore::new(
                self.store,
                self.cfg.store_retry,
                self.cfg.store_attempts,
            ))
        } else {
            self.store
        };

        let cfg = Arc::new(self.cfg);
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let runner = Runner::new(
            self.registry.clone(),
            Arc::clone(&store),
            bus.clone(),
            Arc::clone(&cfg),
        );

        let stop = CancellationToken::new();
        let listener = tokio::spawn(super::manager::subscriber_listener(
            bus.subscribe(),
            subs,
            stop.clone(),
        ));

        TaskManager::from_inner(Inner::new(
            cfg,
            self.registry,
            store,
            self.transport,
            bus,
            runner,
            stop,
            listener,
        ))
    }
}

