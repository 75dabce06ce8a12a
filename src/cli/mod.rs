//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Invex using clap.

pub mod commands;

use crate::domain::InvexError;
use clap::{Parser, Subcommand};

/// Success, including runs where some tenants or records failed
pub const EXIT_OK: i32 = 0;
/// Configuration could not be loaded or is invalid
pub const EXIT_CONFIG: i32 = 2;
/// Another incremental export holds the lock
pub const EXIT_LOCKED: i32 = 3;
/// Preflight check or source connection failed
pub const EXIT_PREFLIGHT: i32 = 4;
/// Anything else that stopped the run
pub const EXIT_FATAL: i32 = 5;
/// Stopped by SIGINT/SIGTERM
pub const EXIT_INTERRUPTED: i32 = 130;

/// Map a run-level error to the process exit code
pub fn exit_code_for(error: &InvexError) -> i32 {
    match error {
        InvexError::Configuration(_) => EXIT_CONFIG,
        InvexError::LockContention { .. } => EXIT_LOCKED,
        InvexError::Preflight(_) | InvexError::Source(_) => EXIT_PREFLIGHT,
        _ => EXIT_FATAL,
    }
}

/// Invex - incremental invoice exporter
#[derive(Parser, Debug)]
#[command(name = "invex")]
#[command(version, about, long_about = None)]
#[command(author = "Invex Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "invex.toml", env = "INVEX_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "INVEX_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export invoices into the output tree
    Export(commands::export::ExportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show per-tenant checkpoints and lock state
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
