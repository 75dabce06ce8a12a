//! Integration tests for dry-run mode
//!
//! These tests verify that a dry run derives the same work as a real run
//! but writes no files and leaves the checkpoint store untouched.

use chrono::{NaiveDate, NaiveDateTime};
use invex::adapters::MemorySource;
use invex::config::{
    secret_string, ApplicationConfig, ExportConfig, ExportMode, InvexConfig,
    LoggingConfig, PreflightConfig, SourceConfig, StateConfig,
};
use invex::core::boundary::FixedClock;
use invex::core::export::ExportCoordinator;
use invex::domain::{InvexError, InvoiceRecord, TenantId};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

const STORE: &str = "7|2024-01-01 00:00:00|3|SUCCESS\n9|2024-01-01 00:00:00|1|FAILED\n";

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn invoice(t: i64, no: &str, updated_at: NaiveDateTime) -> InvoiceRecord {
    InvoiceRecord::new(
        TenantId::new(t).unwrap(),
        Some("DE".to_string()),
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        no,
        "{}",
        updated_at,
    )
}

fn config(dir: &TempDir, mode: ExportMode) -> InvexConfig {
    InvexConfig {
        application: ApplicationConfig::default(),
        source: SourceConfig {
            connection_string: secret_string("postgresql://localhost/billing".to_string()),
            table: "t_invoice".to_string(),
            max_connections: 1,
            connection_timeout_seconds: 1,
            statement_timeout_seconds: 1,
        },
        export: ExportConfig {
            mode,
            dry_run: true,
            output_dir: dir.path().join("out").display().to_string(),
            ..ExportConfig::default()
        },
        state: StateConfig {
            checkpoint_path: dir.path().join("state/checkpoints.dat").display().to_string(),
            lock_path: dir.path().join("state/export.lock").display().to_string(),
            ..StateConfig::default()
        },
        preflight: PreflightConfig {
            min_free_space_mb: 0,
            check_source: true,
        },
        logging: LoggingConfig::default(),
    }
}

fn seed_store(dir: &TempDir) {
    std::fs::create_dir_all(dir.path().join("state")).unwrap();
    std::fs::write(dir.path().join("state/checkpoints.dat"), STORE).unwrap();
}

fn state_entries(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path().join("state"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

fn source() -> Arc<MemorySource> {
    Arc::new(MemorySource::new(vec![
        invoice(7, "A", at(9, 0)),
        invoice(7, "B", at(9, 30)),
        invoice(9, "C", at(9, 45)),
    ]))
}

#[tokio::test]
async fn test_incremental_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    seed_store(&dir);
    let (_tx, rx) = watch::channel(false);

    let summary = ExportCoordinator::new(&config(&dir, ExportMode::Incremental), source(), rx)
        .unwrap()
        .with_clock(Arc::new(FixedClock(at(10, 10))))
        .execute_export()
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.records_exported, 3);
    assert_eq!(summary.tenants_processed, 2);

    // Same checkpoints that a real run would write, reported but not stored
    let seven = summary.tenant_results[0].checkpoint.as_ref().unwrap();
    assert_eq!(seven.to_line(), "7|2024-03-01 10:05:00|2|SUCCESS");

    assert!(!dir.path().join("out").exists());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("state/checkpoints.dat")).unwrap(),
        STORE
    );
    // No backup, no quarantine, lock released
    assert_eq!(state_entries(&dir), vec!["checkpoints.dat"]);
}

#[tokio::test]
async fn test_dry_run_leaves_corrupt_store_alone() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("state")).unwrap();
    std::fs::write(dir.path().join("state/checkpoints.dat"), "7|bad-format\n").unwrap();
    let (_tx, rx) = watch::channel(false);

    ExportCoordinator::new(&config(&dir, ExportMode::Incremental), source(), rx)
        .unwrap()
        .with_clock(Arc::new(FixedClock(at(10, 10))))
        .execute_export()
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("state/checkpoints.dat")).unwrap(),
        "7|bad-format\n"
    );
    assert_eq!(state_entries(&dir), vec!["checkpoints.dat"]);
}

#[tokio::test]
async fn test_dry_run_still_takes_the_lock() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("state/export.lock")).unwrap();
    let (_tx, rx) = watch::channel(false);

    let err = ExportCoordinator::new(&config(&dir, ExportMode::Incremental), source(), rx)
        .unwrap()
        .execute_export()
        .await
        .unwrap_err();

    assert!(matches!(err, InvexError::LockContention { .. }));
}

#[tokio::test]
async fn test_full_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let (_tx, rx) = watch::channel(false);

    let summary = ExportCoordinator::new(&config(&dir, ExportMode::Full), source(), rx)
        .unwrap()
        .execute_export()
        .await
        .unwrap();

    assert_eq!(summary.records_seen, 3);
    assert_eq!(summary.records_exported, 3);
    assert!(!dir.path().join("out").exists());
    assert!(!dir.path().join("state").exists());
}
