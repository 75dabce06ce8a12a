//! Export command implementation
//!
//! This module implements the `export` command, which runs a full or
//! incremental export against the configured PostgreSQL source.

use crate::adapters::PostgresSource;
use crate::cli::{exit_code_for, EXIT_CONFIG, EXIT_INTERRUPTED, EXIT_OK};
use crate::config::{load_config, ExportMode, InvexConfig};
use crate::core::export::{ExportCoordinator, ExportSummary};
use crate::log_error_with_context;
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the export command
#[derive(Args, Debug, Default)]
pub struct ExportArgs {
    /// Override export mode (full or incremental)
    #[arg(long)]
    pub mode: Option<ExportMode>,

    /// Dry run mode - derive paths and log, write no files and no checkpoints
    #[arg(long)]
    pub dry_run: bool,

    /// Restrict the run to one tenant
    #[arg(long)]
    pub tenant_id: Option<i64>,

    /// Concurrent file writes in full mode
    #[arg(long)]
    pub threads: Option<usize>,

    /// Gzip exported payloads
    #[arg(long)]
    pub compress: bool,

    /// Maximum (tenant, country) groups to export in full mode
    #[arg(long)]
    pub limit: Option<usize>,

    /// Override the output root
    #[arg(long)]
    pub output_dir: Option<String>,
}

impl ExportArgs {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut InvexConfig) {
        if let Some(mode) = self.mode {
            tracing::info!(mode = %mode, "Overriding export mode from CLI");
            config.export.mode = mode;
        }
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.export.dry_run = true;
        }
        if let Some(tenant_id) = self.tenant_id {
            config.export.tenant_id = Some(tenant_id);
        }
        if let Some(threads) = self.threads {
            config.export.threads = threads;
        }
        if self.compress {
            config.export.compress = true;
        }
        if let Some(limit) = self.limit {
            config.export.limit = Some(limit);
        }
        if let Some(output_dir) = &self.output_dir {
            config.export.output_dir = output_dir.clone();
        }
    }

    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                log_error_with_context!(&e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG);
        }

        tracing::info!(
            mode = %config.export.mode,
            output_dir = %config.export.output_dir,
            "Export configuration loaded"
        );

        if config.export.dry_run {
            println!("🔍 DRY RUN MODE - no files or checkpoints will be written");
            println!();
        }

        let source = match PostgresSource::new(&config.source) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                log_error_with_context!(&e, "Failed to create source");
                eprintln!("Failed to initialize source: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let coordinator = match ExportCoordinator::new(&config, source, shutdown_signal) {
            Ok(c) => c,
            Err(e) => {
                log_error_with_context!(&e, "Failed to create export coordinator");
                eprintln!("Failed to initialize export: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("🚀 Starting {} export...", config.export.mode);
        println!();

        let summary = match coordinator.execute_export().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, phase = %coordinator.phase(), "Export failed");
                eprintln!("Export failed: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        print_summary(&summary);

        let exit_code = if summary.interrupted {
            println!("⚠️  Export interrupted. Tenants finished before the signal are checkpointed;");
            println!("   the interrupted tenant will be re-scanned on the next run.");
            EXIT_INTERRUPTED
        } else if summary.is_successful() {
            println!("✅ Export completed successfully!");
            EXIT_OK
        } else {
            println!("⚠️  Export completed with failures (see errors above)");
            EXIT_OK
        };

        Ok(exit_code)
    }
}

fn print_summary(summary: &ExportSummary) {
    println!("📊 Export Summary:");
    println!("  Mode: {}", summary.mode);
    if let Some(boundary) = summary.boundary {
        println!("  Boundary: {boundary}");
    }
    if summary.mode == ExportMode::Incremental {
        println!("  Tenants processed: {}", summary.tenants_processed);
        println!("  Tenants failed: {}", summary.tenants_failed);
    }
    println!("  Records seen: {}", summary.records_seen);
    println!("  Records exported: {}", summary.records_exported);
    println!("  Records failed: {}", summary.records_failed);
    println!("  Records skipped: {}", summary.records_skipped);
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    if !summary.errors.is_empty() {
        println!("⚠️  Errors encountered:");
        for error in summary.errors.iter().take(20) {
            println!("  - {:?}: {}", error.error_type, error.message);
            if let Some(context) = &error.context {
                println!("    Context: {context}");
            }
        }
        let shown = summary.errors.len().min(20) as u64;
        if summary.error_count() > shown {
            println!("  ... and {} more", summary.error_count() - shown);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        secret_string, ApplicationConfig, ExportConfig, LoggingConfig,
        PreflightConfig, SourceConfig, StateConfig,
    };
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ExportArgs,
    }

    fn config() -> InvexConfig {
        InvexConfig {
            application: ApplicationConfig::default(),
            source: SourceConfig {
                connection_string: secret_string("postgresql://localhost/billing".to_string()),
                table: "t_invoice".to_string(),
                max_connections: 1,
                connection_timeout_seconds: 1,
                statement_timeout_seconds: 1,
            },
            export: ExportConfig::default(),
            state: StateConfig::default(),
            preflight: PreflightConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_export_args_defaults() {
        let args = Harness::parse_from(["export"]).args;
        assert!(args.mode.is_none());
        assert!(!args.dry_run);
        assert!(args.tenant_id.is_none());
    }

    #[test]
    fn test_export_args_parse() {
        let args = Harness::parse_from([
            "export",
            "--mode",
            "full",
            "--dry-run",
            "--tenant-id",
            "7",
            "--threads",
            "8",
            "--compress",
        ])
        .args;
        assert_eq!(args.mode, Some(ExportMode::Full));
        assert!(args.dry_run);
        assert_eq!(args.tenant_id, Some(7));
        assert_eq!(args.threads, Some(8));
        assert!(args.compress);
    }

    #[test]
    fn test_apply_overrides() {
        let mut cfg = config();
        let args = ExportArgs {
            mode: Some(ExportMode::Full),
            dry_run: true,
            limit: Some(5),
            output_dir: Some("/tmp/elsewhere".to_string()),
            ..ExportArgs::default()
        };

        args.apply_overrides(&mut cfg);

        assert_eq!(cfg.export.mode, ExportMode::Full);
        assert!(cfg.export.dry_run);
        assert_eq!(cfg.export.limit, Some(5));
        assert_eq!(cfg.export.output_dir, "/tmp/elsewhere");
        assert!(!cfg.export.compress);
    }

    #[test]
    fn test_overrides_leave_config_untouched_by_default() {
        let mut cfg = config();
        cfg.export.dry_run = true;
        ExportArgs::default().apply_overrides(&mut cfg);
        assert!(cfg.export.dry_run);
        assert_eq!(cfg.export.mode, ExportMode::Incremental);
    }
}
