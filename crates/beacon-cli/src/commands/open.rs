use anyhow::{Context, Result};
use beacon_cli::config::AppConfig;
use beacon_notifications::LinkResolver;
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::output::print_target;

pub fn open(config: &AppConfig, link: &str, format: OutputFormat) -> Result<()> {
    let resolver = LinkResolver::new(Arc::new(config.route_table()?));
    let target = resolver
        .open(link)
        .with_context(|| format!("cannot open {link}"))?;
    print_target(&target, format)
}
