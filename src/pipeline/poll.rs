// src/pipeline/poll.rs

//! Pipeline entry points wiring configuration to a poller.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Announcement, Config, parse_entries};
use crate::services::{
    AnnouncementListener, AnnouncementStore, ConsoleNotifier, DiscordNotifier, source,
};
use crate::storage::{AnnouncementStorage, LocalStorage};

use super::poller::{CycleReport, Poller};

/// Assemble a poller from configuration.
///
/// Restores the store from the state file when one is configured; an
/// unreadable state file is an error rather than a silent fresh start,
/// which would re-post every announcement in the feed.
pub async fn build_poller(config: &Config, dry_run: bool) -> Result<Poller> {
    let source = source::from_config(&config.source)?;
    let interval = config
        .poller
        .interval_minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| AppError::validation("poller.interval_minutes is too large"))?;
    let mut poller = Poller::new(source, interval);

    if let Some(path) = &config.storage.state_file {
        let storage = Arc::new(LocalStorage::new(path));
        if let Some(snapshot) = storage.load().await? {
            let store = AnnouncementStore::from_snapshot(snapshot);
            log::info!(
                "Restored {} announcements from {}",
                store.len(),
                path.display()
            );
            poller = poller.with_store(store);
        }
        poller = poller.with_storage(storage);
    }

    let listener: Arc<dyn AnnouncementListener> = if dry_run {
        Arc::new(ConsoleNotifier::new())
    } else {
        Arc::new(DiscordNotifier::new(&config.discord)?)
    };
    log::info!("Delivering announcements via {}", listener.name());
    poller.add_listener(listener);

    Ok(poller)
}

/// Poll on the configured schedule until the process is killed.
pub async fn run_poller(config: &Config, dry_run: bool) -> Result<()> {
    let mut poller = build_poller(config, dry_run).await?;
    poller.run().await;
    Ok(())
}

/// Run a single cycle and wait for every listener to finish.
pub async fn run_once(config: &Config, dry_run: bool) -> Result<usize> {
    let mut poller = build_poller(config, dry_run).await?;
    let report: CycleReport = poller.run_cycle().await?;
    let delivered = report.delivered.len();

    log::info!(
        "{} entries fetched, {} new, {} delivered",
        report.fetched,
        report.inserted,
        delivered
    );
    report.wait_for_delivery().await;

    Ok(delivered)
}

/// Parse a saved payload into the announcements a fresh store would keep.
pub async fn run_parse(path: &Path) -> Result<Vec<Announcement>> {
    let payload = tokio::fs::read_to_string(path).await?;
    let entries = parse_entries(&payload)?;

    let mut store = AnnouncementStore::new();
    let inserted = store.ingest(&entries);
    log::info!(
        "{} entries in {}, {} stored",
        entries.len(),
        path.display(),
        inserted
    );

    Ok(store.get_unread())
}
