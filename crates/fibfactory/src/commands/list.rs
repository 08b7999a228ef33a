use crate::utils;
use colored::Colorize;
use fibfactory_core::{AutomationEngine, Lifecycle, ListOutcome, StackSummary};

pub async fn handle<E: AutomationEngine>(
    lifecycle: &Lifecycle<E>,
    json: bool,
) -> anyhow::Result<()> {
    let outcome = lifecycle.list().await?;

    if json {
        return utils::print_json(&outcome);
    }

    match &outcome {
        ListOutcome::NoEnvironments => {
            println!("{}", "No active environments found.".yellow());
        }
        ListOutcome::Environments(stacks) => {
            println!("{}", "Active environments:".bold());
            for stack in stacks {
                println!("  - {}{}", stack.name.cyan(), details(stack).dimmed());
            }
        }
    }
    Ok(())
}

/// Trailing details of a listed stack, empty when the engine reported none
fn details(stack: &StackSummary) -> String {
    let mut parts = Vec::new();
    if stack.update_in_progress {
        parts.push("updating".to_string());
    }
    if let Some(count) = stack.resource_count {
        parts.push(format!("{} resources", count));
    }
    if let Some(time) = stack.last_update {
        parts.push(format!("updated {}", time.format("%Y-%m-%d %H:%M UTC")));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}
