use std::path::Path;
use std::process;

use serde_json::Value;
use tracing::Level;

use crate::ServiceConfig;

/// Exits the program with an error message
pub fn exit_with_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exits the program with an error message and usage information
pub fn exit_with_usage_error(message: &str, usage: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("{}", usage);
    process::exit(1);
}

/// Installs a stderr `tracing` subscriber; `verbose` lowers the level to DEBUG.
///
/// Logs go to stderr so that JSON written to stdout stays machine-readable.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads and parses a JSON file or exits with error
pub fn read_json_or_exit(path: impl AsRef<Path>, context: &str) -> Value {
    let path = path.as_ref();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => exit_with_error(&format!(
            "Failed to read {} file {}: {}",
            context,
            path.display(),
            e
        )),
    };
    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => exit_with_error(&format!(
            "Failed to parse {} file {}: {}",
            context,
            path.display(),
            e
        )),
    }
}

/// Loads the service configuration, or the defaults when `path` is empty
pub fn load_config_or_exit(path: &str) -> ServiceConfig {
    if path.is_empty() {
        return ServiceConfig::default();
    }
    match ServiceConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => exit_with_error(&e),
    }
}

/// Prints formatted JSON with proper indentation
pub fn print_json<T>(value: &T) -> Result<(), serde_json::Error>
where
    T: serde::Serialize,
{
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints a formatted JSON value or exits with error
pub fn print_json_or_exit<T>(value: &T, context: &str)
where
    T: serde::Serialize,
{
    if let Err(e) = print_json(value) {
        exit_with_error(&format!("Failed to format {} JSON: {}", context, e));
    }
}
