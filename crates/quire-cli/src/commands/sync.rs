use std::path::Path;
use std::time::Duration;

use quire_core::client::HttpDeltaClient;
use quire_core::sync::{self, SyncOptions, SyncReport};

use crate::commands::common::open_database;
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_sync(full: bool, db_path: &Path) -> Result<(), CliError> {
    let config = CliConfig::load()
        .map_err(CliError::Config)?
        .with_env_overrides();
    let settings = config.sync_settings().ok_or(CliError::SyncNotConfigured)?;

    let client = HttpDeltaClient::with_timeout(
        settings.endpoint,
        settings.api_key,
        Duration::from_secs(settings.timeout_secs),
    )?;
    let db = open_database(db_path).await?;
    tracing::debug!(
        "Syncing {} with {} (full: {full})",
        db_path.display(),
        client.endpoint()
    );

    let report = sync::sync(&db, &client, SyncOptions { full }).await?;
    for line in format_sync_report(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!("Sync completed ({})", report.mode)];

    let merged = &report.merged;
    if merged.books + merged.notes > 0 {
        lines.push(format!(
            "  pulled {} books and {} notes",
            merged.books, merged.notes
        ));
    }
    if merged.expunged_books + merged.expunged_notes > 0 {
        lines.push(format!(
            "  removed {} books and {} notes deleted on the server",
            merged.expunged_books, merged.expunged_notes
        ));
    }
    if report.tombstones.books + report.tombstones.notes > 0 {
        lines.push(format!(
            "  dropped {} books and {} notes unknown to the server",
            report.tombstones.books, report.tombstones.notes
        ));
    }
    if merged.renamed_books > 0 {
        lines.push(format!(
            "  renamed {} local books to avoid label clashes",
            merged.renamed_books
        ));
    }
    if report.pushed_books + report.pushed_notes > 0 {
        lines.push(format!(
            "  pushed {} books and {} notes",
            report.pushed_books, report.pushed_notes
        ));
    }
    if report.caught_up {
        lines.push("  pulled changes from another writer mid-sync".to_string());
    }
    if merged.conflicts > 0 {
        lines.push(format!(
            "  {} notes have conflicts to resolve by hand",
            merged.conflicts
        ));
    }

    lines
}
