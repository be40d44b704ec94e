use beacon_notifications::{ClickAction, LaunchableTarget, NotificationRecord};
use colored::Colorize;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("{}: {}", label.cyan(), value);
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_record(record: &NotificationRecord, format: OutputFormat) -> anyhow::Result<()> {
    if matches!(format, OutputFormat::Json) {
        return print_json(record);
    }
    print_field("Notification", format!("#{}", record.notify_id));
    print_field("Title", &record.title);
    if !record.content.is_empty() {
        print_field("Content", &record.content);
    }
    let click = match &record.click_action {
        Some(ClickAction::Launch(target)) => format!("open {}", target.destination.name),
        Some(ClickAction::Broadcast { link, .. }) => format!("resolve {link} on click"),
        None => "none".dimmed().to_string(),
    };
    print_field("On click", click);
    Ok(())
}

pub fn print_target(target: &LaunchableTarget, format: OutputFormat) -> anyhow::Result<()> {
    if matches!(format, OutputFormat::Json) {
        return print_json(target);
    }
    print_field("Destination", &target.destination.name);
    print_field("Request code", target.request_code);
    if target.params.is_empty() {
        return Ok(());
    }
    let mut builder = Builder::default();
    builder.push_record(["Param", "Value"]);
    for (key, value) in &target.params {
        builder.push_record([key.as_str(), value.as_str()]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

pub fn print_table<I, R>(header: [&str; 3], rows: I)
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let mut builder = Builder::default();
    builder.push_record(header);
    let mut count = 0;
    for row in rows {
        builder.push_record(row);
        count += 1;
    }
    if count == 0 {
        println!("Nothing to show.");
        return;
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}
