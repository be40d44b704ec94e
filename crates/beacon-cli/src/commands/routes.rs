use anyhow::Result;
use beacon_cli::config::AppConfig;
use beacon_notifications::DestinationKind;

use crate::cli::OutputFormat;
use crate::output::{print_json, print_table};

pub fn list(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let table = config.route_table()?;
    let routes = table.routes();

    if matches!(format, OutputFormat::Json) {
        return print_json(&routes);
    }
    print_table(
        ["Path", "Destination", "Kind"],
        routes.into_iter().map(|(path, destination)| {
            let kind = match destination.kind {
                DestinationKind::Screen => "screen",
                DestinationKind::Service => "service",
            };
            [path, destination.name, kind.to_string()]
        }),
    );
    Ok(())
}
