//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Invex configuration file.

use crate::cli::{EXIT_CONFIG, EXIT_OK};
use crate::config::{load_config, InvexConfig};
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as part of loading
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(EXIT_CONFIG);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        print_config_summary(&config);
        Ok(EXIT_OK)
    }
}

fn print_config_summary(config: &InvexConfig) {
    println!("Configuration Summary:");
    println!("  Log Level: {}", config.application.log_level);
    println!(
        "  Source: {}",
        mask_dsn(config.source.connection_string.expose_secret().as_str())
    );
    println!("  Source Table: {}", config.source.table);
    println!("  Max Connections: {}", config.source.max_connections);
    println!("  Export Mode: {}", config.export.mode);
    println!("  Dry Run: {}", config.export.dry_run);
    println!("  Output Directory: {}", config.export.output_dir);
    println!("  Threads: {}", config.export.threads);
    println!("  Compress: {}", config.export.compress);
    if let Some(tenant) = config.export.tenant_id {
        println!("  Tenant Filter: {tenant}");
    }
    println!(
        "  Safety Window: {}s",
        config.export.safety_window_seconds
    );
    println!("  Checkpoint Store: {}", config.state.checkpoint_path);
    println!("  Lock: {}", config.state.lock_path);
    println!(
        "  Failed Watermark Policy: {:?}",
        config.state.failed_watermark_policy
    );
    println!();
}

/// Keep only the host part of a DSN for display
fn mask_dsn(dsn: &str) -> String {
    match dsn.rsplit_once('@') {
        Some((_, host)) => format!("***@{host}"),
        None => dsn.split("://").next().map_or_else(
            || "***".to_string(),
            |scheme| format!("{scheme}://***"),
        ),
    }
}
