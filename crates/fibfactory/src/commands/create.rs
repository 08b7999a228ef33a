use crate::utils;
use colored::Colorize;
use fibfactory_core::{AutomationEngine, Lifecycle};

pub async fn handle<E: AutomationEngine>(
    lifecycle: &Lifecycle<E>,
    env_id: &str,
    json: bool,
) -> anyhow::Result<()> {
    if !json {
        println!("{}", "Creating environment...".blue());
        println!("Environment: {}", env_id.cyan());
    }

    let outcome = lifecycle.create(env_id).await?;

    if json {
        return utils::print_json(&outcome);
    }

    println!();
    println!("{}", "✓ Environment is ready".green().bold());
    println!("  Stack: {}", outcome.stack.as_str().cyan());
    if let Some(summary) = &outcome.summary {
        println!("  Resources: {}", summary);
    }
    if let Some(url) = outcome.service_url() {
        println!("  URL: {}", url.cyan().bold());
    }
    Ok(())
}
