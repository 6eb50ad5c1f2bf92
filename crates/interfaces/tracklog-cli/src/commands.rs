use anyhow::{Context, Result};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracklog_app_core::{
    open_orchestrator, open_store, pending_summary, sync_scope, AppSettings, PendingSummary,
    SyncCycleReport,
};

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Ok(pb)
}

pub async fn cmd_sync(
    settings: &AppSettings,
    from: Option<NaiveDate>,
    days: Option<u32>,
) -> Result<SyncCycleReport> {
    let scope = sync_scope(settings, from, days)?;
    println!(":: Synchronizing...");
    println!("   Remote: {}", settings.remote_url);
    if let Some(window) = scope.window {
        println!("   Window: {} .. {}", window.start(), window.end());
    }

    let mut orchestrator = open_orchestrator(settings)?;
    let pb = spinner("Pushing local changes and pulling updates...")?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let result = orchestrator.sync_with_cancel(&scope, &cancel).await;
    ctrl_c.abort();

    match result {
        Ok(report) => {
            pb.finish_with_message("Sync complete.");
            print_cycle_report(&report);
            Ok(report)
        }
        Err(e) => {
            pb.abandon_with_message("Sync failed.");
            Err(e).context("Sync cycle failed")
        }
    }
}

fn print_cycle_report(report: &SyncCycleReport) {
    println!("\n:: Push");
    for push in &report.pushes {
        if push.is_noop() {
            continue;
        }
        println!(
            "   {:<13} created {:>4}  updated {:>4}  deleted {:>4}  failed {:>4}  waiting {:>4}",
            push.kind.as_str(),
            push.created,
            push.updated,
            push.deleted,
            push.failed,
            push.skipped
        );
    }

    println!("\n:: Pull");
    for pull in &report.pulls {
        println!(
            "   {:<13} new {:>4}  updated {:>4}  kept {:>4}  removed {:>4}",
            pull.kind.as_str(),
            pull.inserted,
            pull.updated,
            pull.protected,
            pull.pruned
        );
        if !pull.orphaned.is_empty() {
            println!(
                "   {:<13} {} edited record(s) no longer exist upstream: {:?}",
                "",
                pull.orphaned.len(),
                pull.orphaned
            );
        }
    }

    if report.failed() > 0 {
        println!(
            "\n   {} record(s) failed to sync and will be retried (run `pending`)",
            report.failed()
        );
    }
}

pub fn cmd_pending(settings: &AppSettings) -> Result<Vec<PendingSummary>> {
    let store = open_store(settings)?;
    let summary = pending_summary(&store).context("Failed to read local store")?;

    println!(":: Local changes");
    println!(
        "   {:<13} {:>7} {:>7} {:>7} {:>7} {:>9}",
        "kind", "synced", "local", "syncing", "failed", "to delete"
    );
    for row in &summary {
        println!(
            "   {:<13} {:>7} {:>7} {:>7} {:>7} {:>9}",
            row.kind.as_str(),
            row.synced,
            row.local,
            row.syncing,
            row.failed,
            row.to_delete
        );
    }

    let pending: usize = summary.iter().map(PendingSummary::pending).sum();
    if pending == 0 {
        println!("\n   Status: Up to date");
    } else {
        println!("\n   Status: {pending} record(s) waiting (run `sync`)");
    }
    Ok(summary)
}
