//! Status command implementation
//!
//! This module implements the `status` command for displaying per-tenant
//! checkpoints and whether an incremental run currently holds the lock.

use crate::cli::{EXIT_CONFIG, EXIT_FATAL, EXIT_OK};
use crate::config::load_config;
use crate::core::lock::DirectoryLock;
use crate::core::state::{Checkpoint, FileCheckpointStore, StateManager};
use clap::Args;
use std::sync::Arc;

/// Arguments for the status command
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Filter by tenant ID
    #[arg(long)]
    pub tenant_id: Option<i64>,

    /// Only show tenants whose last run failed
    #[arg(long)]
    pub failed_only: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking export status");

        println!("📊 Export Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let lock = DirectoryLock::new(&config.state.lock_path);
        if lock.is_locked() {
            println!("🔒 Export lock is held: {}", lock.path().display());
            if let Some(owner) = lock.owner() {
                for line in owner.lines() {
                    println!("   {line}");
                }
            }
        } else {
            println!("🔓 No export is running");
        }
        println!();

        let store = Arc::new(FileCheckpointStore::new(&config.state.checkpoint_path));
        let state = StateManager::new(store, true);

        let checkpoints = match state.all_checkpoints().await {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to read checkpoint store");
                println!("   Error: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        if checkpoints.is_empty() {
            println!("No export history found.");
            println!("Run 'invex export' to start exporting data.");
            return Ok(EXIT_OK);
        }

        let filtered = self.filter(&checkpoints);
        if filtered.is_empty() {
            println!("No checkpoints match the specified filters.");
            return Ok(EXIT_OK);
        }

        println!("Found {} checkpoint(s):", filtered.len());
        println!();
        println!(
            "{:<15} {:<22} {:<12} {:<10}",
            "Tenant", "Last Export", "Status", "Count"
        );
        println!("{}", "-".repeat(60));

        for checkpoint in filtered {
            let status = if checkpoint.is_failed() {
                "❌ Failed"
            } else {
                "✅ Success"
            };
            println!(
                "{:<15} {:<22} {:<12} {:<10}",
                checkpoint.tenant_id.to_string(),
                checkpoint.last_export_time.format("%Y-%m-%d %H:%M:%S").to_string(),
                status,
                checkpoint.record_count
            );
        }

        println!();
        Ok(EXIT_OK)
    }

    fn filter<'a>(&self, checkpoints: &'a [Checkpoint]) -> Vec<&'a Checkpoint> {
        checkpoints
            .iter()
            .filter(|c| self.tenant_id.map_or(true, |t| c.tenant_id.get() == t))
            .filter(|c| !self.failed_only || c.is_failed())
            .collect()
    }
}
