use anyhow::Result;
use beacon_cli::config::AppConfig;
use beacon_notifications::route_link;

use super::build_stack;
use crate::cli::{OutputFormat, SendArgs};
use crate::output::{print_record, print_success, print_target, print_warning};

pub async fn send(config: &AppConfig, args: &SendArgs, format: OutputFormat) -> Result<()> {
    let stack = build_stack(config, config.scheduler.clone())?;
    let link = route_link(&args.link);

    let record = if args.broadcast {
        stack
            .dispatcher
            .send_broadcast(&args.title, &args.content, &link)
            .await?
    } else {
        let target = stack.resolver.build_launch_target(&link, 0);
        if target.is_none() {
            print_warning(&format!(
                "No screen for {}; notification will not be clickable",
                args.link
            ));
        }
        stack
            .dispatcher
            .send(&args.title, &args.content, target)
            .await?
    };
    print_record(&record, format)?;

    if args.click {
        match &record.click_action {
            Some(action) => {
                let target = stack
                    .dispatcher
                    .handle_click(record.notify_id, action)
                    .await?;
                print_success(&format!("Clicked notification #{}", record.notify_id));
                print_target(&target, format)?;
            }
            None => print_warning("Notification has no click action"),
        }
    }

    stack.shutdown();
    Ok(())
}
