pub mod open;
pub mod remind;
pub mod routes;
pub mod send;

use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_cli::config::{AppConfig, SinkKind};
use beacon_notifications::{
    LogSink, NotificationSink, ReminderStack, SchedulerConfig, TraySink, WebhookSink,
};

pub fn build_sink(config: &AppConfig) -> Result<Arc<dyn NotificationSink>> {
    let sink: Arc<dyn NotificationSink> = match config.sink.kind {
        SinkKind::Log => Arc::new(LogSink::new()),
        SinkKind::Tray => Arc::new(TraySink::new()),
        SinkKind::Webhook => {
            let webhook = config
                .sink
                .webhook
                .clone()
                .context("sink.webhook is not configured")?;
            Arc::new(WebhookSink::new(webhook).context("creating webhook sink")?)
        }
    };
    Ok(sink)
}

pub fn build_stack(config: &AppConfig, scheduler: SchedulerConfig) -> Result<ReminderStack> {
    let stack = ReminderStack::builder()
        .with_router(Arc::new(config.route_table()?))
        .with_sink(build_sink(config)?)
        .with_scheduler_config(scheduler)
        .with_dispatcher_config(config.notifications.clone())
        .with_backend_config(config.backend.clone())
        .build()
        .context("building reminder stack")?;
    Ok(stack)
}
