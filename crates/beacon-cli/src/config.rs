use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use beacon_notifications::{
    BackendConfig, DestinationKind, DestinationRef, DispatcherConfig, RouteTable,
    SchedulerConfig, WebhookConfig,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "beacon.toml";
pub const ENV_PREFIX: &str = "BEACON";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notifications: DispatcherConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            notifications: DispatcherConfig::default(),
            backend: BackendConfig::default(),
            sink: SinkConfig::default(),
            logging: LoggingConfig::default(),
            routes: default_routes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Log,
    Tray,
    Webhook,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub kind: SinkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub path: String,
    pub destination: String,
    #[serde(default = "default_destination_kind")]
    pub kind: DestinationKind,
}

fn default_destination_kind() -> DestinationKind {
    DestinationKind::Screen
}

fn default_routes() -> Vec<RouteConfig> {
    [("/app/main", "MainScreen"), ("/app/second", "SecondScreen")]
        .into_iter()
        .map(|(path, destination)| RouteConfig {
            path: path.to_string(),
            destination: destination.to_string(),
            kind: DestinationKind::Screen,
        })
        .collect()
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.interval_secs == 0 {
            bail!("scheduler.interval_secs must be > 0");
        }
        if self.notifications.queue_capacity == 0 {
            bail!("notifications.queue_capacity must be > 0");
        }
        if self.backend.max_jobs == 0 {
            bail!("backend.max_jobs must be > 0");
        }

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            bail!("logging.level must be one of {valid_levels:?}");
        }

        if self.sink.kind == SinkKind::Webhook
            && self
                .sink
                .webhook
                .as_ref()
                .is_none_or(|webhook| webhook.url.trim().is_empty())
        {
            bail!("sink.kind=webhook requires sink.webhook.url");
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            if route.path.trim().is_empty() {
                bail!("routes: path must not be empty");
            }
            if route.destination.trim().is_empty() {
                bail!("routes: destination for {} must not be empty", route.path);
            }
            if !seen.insert(route.path.as_str()) {
                bail!("routes: duplicate path {}", route.path);
            }
        }
        Ok(())
    }

    pub fn route_table(&self) -> Result<RouteTable> {
        let table = RouteTable::from_routes(self.routes.iter().map(|route| {
            let destination = DestinationRef {
                name: route.destination.clone(),
                kind: route.kind,
            };
            (route.path.clone(), destination)
        }))
        .context("building route table")?;
        Ok(table)
    }

    /// Copy safe to print: webhook secret masked
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(secret) = config
            .sink
            .webhook
            .as_mut()
            .and_then(|webhook| webhook.secret.as_mut())
        {
            *secret = "********".to_string();
        }
        config
    }
}

/// Resolve the configuration file: explicit path, else `beacon.toml` when present.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            default_path.exists().then_some(default_path)
        }
    }
}

/// Load configuration from an optional TOML file layered under
/// `BEACON__SECTION__KEY` environment overrides, then validate it.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = Config::builder();
    if let Some(path) = resolve_config_path(path) {
        if !path.exists() {
            bail!("config file {} not found", path.display());
        }
        builder = builder.add_source(File::from(path));
    }
    // e.g. BEACON__SCHEDULER__INTERVAL_SECS=30
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .try_parsing(true)
            .separator("__"),
    );

    let merged: AppConfig = builder
        .build()
        .context("config build error")?
        .try_deserialize()
        .context("config deserialize error")?;
    merged.validate()?;
    Ok(merged)
}
