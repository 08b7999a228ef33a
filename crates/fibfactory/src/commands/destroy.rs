use crate::utils;
use colored::Colorize;
use fibfactory_core::{AutomationEngine, Lifecycle};

pub async fn handle<E: AutomationEngine>(
    lifecycle: &Lifecycle<E>,
    env_id: &str,
    json: bool,
) -> anyhow::Result<()> {
    if !json {
        println!("{}", "Destroying environment...".yellow());
        println!("Environment: {}", env_id.cyan());
    }

    let outcome = lifecycle.destroy(env_id).await?;

    if json {
        return utils::print_json(&outcome);
    }

    println!();
    println!(
        "{}",
        format!("✓ Stack {} destroyed and removed", outcome.stack)
            .green()
            .bold()
    );
    if let Some(summary) = outcome.summary.as_ref().filter(|s| !s.is_empty()) {
        println!("  Resources: {}", summary);
    }
    Ok(())
}
