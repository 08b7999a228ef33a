use colored::Colorize;
use fibfactory_config::ConfigError;
use fibfactory_core::LifecycleError;
use serde::Serialize;
use std::path::Path;

/// Exit code for bad input or a missing environment
pub const EXIT_USER_ERROR: i32 = 2;

/// Exit code for a failed operation
pub const EXIT_FAILURE: i32 = 1;

/// Map an error to the process exit code
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(e) = error.downcast_ref::<LifecycleError>() {
        return if e.kind().is_user_error() {
            EXIT_USER_ERROR
        } else {
            EXIT_FAILURE
        };
    }
    if error.downcast_ref::<ConfigError>().is_some() {
        return EXIT_USER_ERROR;
    }
    EXIT_FAILURE
}

pub fn print_error(error: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);
    for cause in causes(error) {
        eprintln!("  {} {}", "caused by:".dimmed(), cause);
    }

    if let Some(LifecycleError::NotFound { .. }) = error.downcast_ref::<LifecycleError>() {
        eprintln!();
        eprintln!(
            "{}",
            "Hint: run `fibfactory list` to see the active environments".yellow()
        );
    }
}

/// Messages of the error's sources, skipping any already shown by the error above it
fn causes(error: &anyhow::Error) -> Vec<String> {
    let mut shown = error.to_string();
    let mut causes = Vec::new();
    for cause in error.chain().skip(1) {
        let message = cause.to_string();
        if !shown.contains(&message) {
            causes.push(message.clone());
        }
        shown = message;
    }
    causes
}

/// Show which settings file was used
pub fn print_loaded_settings(path: Option<&Path>) {
    match path {
        Some(path) => println!("📄 Settings: {}", path.display().to_string().cyan()),
        None => println!("📄 Settings: {}", "(defaults)".dimmed()),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
