//! Composition root: wires router, sink, dispatcher, backend and scheduler.

use std::sync::Arc;

use crate::backend::{BackendConfig, LocalJobBackend};
use crate::clock::{Clock, SystemClock};
use crate::dispatcher::{DispatcherConfig, NotificationDispatcher};
use crate::error::{NotificationError, Result};
use crate::link::LinkResolver;
use crate::router::{RouteTable, Router};
use crate::scheduler::{ReminderScheduler, SchedulerConfig};
use crate::sinks::NotificationSink;

/// A fully wired reminder system
pub struct ReminderStack {
    pub resolver: LinkResolver,
    pub dispatcher: NotificationDispatcher,
    pub backend: Arc<LocalJobBackend>,
    pub scheduler: Arc<ReminderScheduler>,
}

impl ReminderStack {
    pub fn builder() -> ReminderStackBuilder {
        ReminderStackBuilder::default()
    }

    /// Stop pending timers; live notifications are left alone.
    pub fn shutdown(&self) {
        self.backend.shutdown();
    }
}

#[derive(Default)]
pub struct ReminderStackBuilder {
    router: Option<Arc<dyn Router>>,
    sink: Option<Arc<dyn NotificationSink>>,
    clock: Option<Arc<dyn Clock>>,
    scheduler: SchedulerConfig,
    dispatcher: DispatcherConfig,
    backend: BackendConfig,
}

impl ReminderStackBuilder {
    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    pub fn with_dispatcher_config(mut self, config: DispatcherConfig) -> Self {
        self.dispatcher = config;
        self
    }

    pub fn with_backend_config(mut self, config: BackendConfig) -> Self {
        self.backend = config;
        self
    }

    /// Build the stack on the current tokio runtime.
    pub fn build(self) -> Result<ReminderStack> {
        let sink = self
            .sink
            .ok_or_else(|| NotificationError::InvalidConfig("a notification sink is required".into()))?;
        if self.scheduler.interval_secs == 0 {
            return Err(NotificationError::InvalidConfig(
                "scheduler interval must be greater than zero".into(),
            ));
        }

        let router = self
            .router
            .unwrap_or_else(|| Arc::new(RouteTable::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        // Fails cleanly without a tokio runtime, before anything is spawned
        let backend = Arc::new(LocalJobBackend::with_clock(self.backend, clock.clone())?);
        let resolver = LinkResolver::new(router);
        let dispatcher = NotificationDispatcher::spawn(sink, resolver.clone(), &self.dispatcher);
        let scheduler = ReminderScheduler::new(
            backend.clone(),
            dispatcher.clone(),
            clock,
            &self.scheduler,
        );

        Ok(ReminderStack {
            resolver,
            dispatcher,
            backend,
            scheduler,
        })
    }
}
