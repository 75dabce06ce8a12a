//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::InvexConfig;
use crate::config::secret_string;
use crate::domain::errors::InvexError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into InvexConfig
/// 4. Applies environment variable overrides (INVEX_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails validation.
///
/// # Examples
///
/// ```no_run
/// use invex::config::loader::load_config;
///
/// let config = load_config("invex.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<InvexConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(InvexError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        InvexError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: InvexConfig = toml::from_str(&contents)
        .map_err(|e| InvexError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        InvexError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied untouched.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| InvexError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(InvexError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using INVEX_* prefix
///
/// Environment variables follow the pattern: INVEX_<SECTION>_<KEY>
/// For example: INVEX_EXPORT_MODE, INVEX_SOURCE_CONNECTION_STRING
///
/// Unparseable values are ignored and the file value is kept.
fn apply_env_overrides(config: &mut InvexConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("INVEX_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Source overrides
    if let Ok(val) = std::env::var("INVEX_SOURCE_CONNECTION_STRING") {
        config.source.connection_string = secret_string(val);
    }
    if let Ok(val) = std::env::var("INVEX_SOURCE_TABLE") {
        config.source.table = val;
    }
    if let Ok(val) = std::env::var("INVEX_SOURCE_MAX_CONNECTIONS") {
        if let Ok(max) = val.parse() {
            config.source.max_connections = max;
        }
    }

    // Export overrides
    if let Ok(val) = std::env::var("INVEX_EXPORT_MODE") {
        if let Ok(mode) = val.parse() {
            config.export.mode = mode;
        }
    }
    if let Ok(val) = std::env::var("INVEX_EXPORT_DRY_RUN") {
        config.export.dry_run = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("INVEX_EXPORT_OUTPUT_DIR") {
        config.export.output_dir = val;
    }
    if let Ok(val) = std::env::var("INVEX_EXPORT_THREADS") {
        if let Ok(threads) = val.parse() {
            config.export.threads = threads;
        }
    }
    if let Ok(val) = std::env::var("INVEX_EXPORT_COMPRESS") {
        config.export.compress = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("INVEX_EXPORT_SAFETY_WINDOW_SECONDS") {
        if let Ok(window) = val.parse() {
            config.export.safety_window_seconds = window;
        }
    }

    // State overrides
    if let Ok(val) = std::env::var("INVEX_STATE_CHECKPOINT_PATH") {
        config.state.checkpoint_path = val;
    }
    if let Ok(val) = std::env::var("INVEX_STATE_LOCK_PATH") {
        config.state.lock_path = val;
    }

    // Preflight overrides
    if let Ok(val) = std::env::var("INVEX_PREFLIGHT_MIN_FREE_SPACE_MB") {
        if let Ok(mb) = val.parse() {
            config.preflight.min_free_space_mb = mb;
        }
    }

    // Logging overrides
    if let Ok(val) = std::env::var("INVEX_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("INVEX_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}
