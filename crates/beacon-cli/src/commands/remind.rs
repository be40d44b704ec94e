use std::time::Duration;

use anyhow::Result;
use beacon_cli::config::AppConfig;
use beacon_notifications::{Clock, ReminderEvent, ReminderRequest, SystemClock};
use colored::Colorize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::broadcast::error::RecvError;

use super::build_stack;
use crate::cli::{OutputFormat, RemindArgs};
use crate::output::{print_json, print_success, print_warning};

pub async fn remind(config: &AppConfig, args: &RemindArgs, format: OutputFormat) -> Result<()> {
    let mut scheduler = config.scheduler.clone();
    if let Some(interval) = args.interval {
        scheduler.interval_secs = interval;
    }
    let stack = build_stack(config, scheduler)?;
    let mut events = stack.scheduler.subscribe();

    let delay_millis = i64::try_from(args.delay.saturating_mul(1_000)).unwrap_or(i64::MAX);
    let fire_at = SystemClock.now_millis().saturating_add(delay_millis);
    stack.scheduler.schedule(ReminderRequest::new(
        args.id,
        &args.title,
        &args.content,
        &args.link,
        fire_at,
    ))?;
    print_success(&format!(
        "Reminder {} scheduled, first at {}, then every {}s",
        args.id,
        format_millis(fire_at),
        stack.scheduler.interval().as_secs()
    ));

    let cancel_after = async {
        match args.cancel_after {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(cancel_after);

    let mut fired = 0u32;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    report(&event, format)?;
                    match event {
                        ReminderEvent::Fired { .. } => {
                            fired += 1;
                            if args.cycles.is_some_and(|cycles| fired >= cycles) {
                                stack.scheduler.cancel_work(args.id);
                                print_success(&format!("Stopped after {fired} notification(s)"));
                                break;
                            }
                        }
                        ReminderEvent::Stopped { .. } => break,
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    print_warning(&format!("Missed {skipped} reminder event(s)"));
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut cancel_after => {
                stack.scheduler.cancel_work(args.id);
                print_success(&format!("Reminder {} cancelled", args.id));
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                stack.scheduler.cancel_work(args.id);
                print_warning("Interrupted, reminder cancelled");
                break;
            }
        }
    }

    stack.shutdown();
    Ok(())
}

fn report(event: &ReminderEvent, format: OutputFormat) -> Result<()> {
    if matches!(format, OutputFormat::Json) {
        return print_json(event);
    }
    match event {
        ReminderEvent::Scheduled { .. } | ReminderEvent::Cancelled { .. } => {}
        ReminderEvent::Fired {
            reminder_id,
            notify_id: Some(notify_id),
            ..
        } => println!(
            "{} reminder {reminder_id} posted notification #{notify_id}",
            "fired".green()
        ),
        ReminderEvent::Fired {
            reminder_id, error, ..
        } => println!(
            "{} reminder {reminder_id}: {}",
            "failed".red(),
            error.as_deref().unwrap_or("delivery failed")
        ),
        ReminderEvent::Rearmed {
            reminder_id,
            fire_at_epoch_millis,
        } => println!(
            "{} reminder {reminder_id} for {}",
            "next".cyan(),
            format_millis(*fire_at_epoch_millis)
        ),
        ReminderEvent::Superseded { reminder_id } => println!(
            "{} reminder {reminder_id} was rescheduled while firing",
            "replaced".cyan()
        ),
        ReminderEvent::Stopped {
            reminder_id,
            reason,
        } => println!("{} reminder {reminder_id}: {reason}", "stopped".yellow()),
    }
    Ok(())
}

fn format_millis(epoch_millis: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(epoch_millis) * 1_000_000)
        .ok()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| epoch_millis.to_string())
}
