//! Scheduled archive runs
//!
//! Enumerates worlds and archives each one, then sleeps for the configured
//! interval. Worlds are archived one after another, so two runs for the same
//! world never overlap within a scheduler. A failing world is recorded in the
//! report and never stops the batch.

use std::{future::Future, time::Duration};

use charge_core::{Environment, SnapshotId, WorldId};

use crate::{
    archiver::{ArchiveOutcome, SnapshotArchiver},
    room_service::RoomService,
    storage::{Storage, StorageError},
};

/// Summary of one pass over all worlds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Worlds that produced a snapshot, with its id and size in bytes
    pub archived: Vec<(WorldId, SnapshotId, usize)>,
    /// Worlds whose room has no storage yet
    pub skipped: Vec<WorldId>,
    /// Worlds whose run failed, with the error text
    pub failed: Vec<(WorldId, String)>,
}

impl ArchiveReport {
    /// Number of worlds visited.
    pub fn total(&self) -> usize {
        self.archived.len() + self.skipped.len() + self.failed.len()
    }
}

/// Runs the archiver over every world on a fixed cadence.
pub struct ArchiveScheduler<S, R, E> {
    storage: S,
    archiver: SnapshotArchiver<S, R, E>,
    env: E,
    interval: Duration,
}

impl<S: Storage, R: RoomService, E: Environment> ArchiveScheduler<S, R, E> {
    /// Create a scheduler running `archiver` every `interval`.
    pub fn new(storage: S, archiver: SnapshotArchiver<S, R, E>, env: E, interval: Duration) -> Self {
        Self { storage, archiver, env, interval }
    }

    /// Archive every world once.
    ///
    /// Only listing the worlds can fail the pass as a whole.
    pub async fn run_once(&self) -> Result<ArchiveReport, StorageError> {
        let worlds = self.storage.list_worlds()?;
        let mut report = ArchiveReport::default();

        for world in &worlds {
            match self.archiver.archive_world_snapshot(world).await {
                Ok(ArchiveOutcome::Archived { snapshot_id, size, .. }) => {
                    report.archived.push((world.id.clone(), snapshot_id, size));
                },
                Ok(ArchiveOutcome::Skipped) => report.skipped.push(world.id.clone()),
                Err(e) => {
                    tracing::error!(world_id = %world.id, error = %e, "world archive failed");
                    report.failed.push((world.id.clone(), e.to_string()));
                },
            }
        }

        tracing::info!(
            worlds = report.total(),
            archived = report.archived.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "archive pass complete"
        );

        Ok(report)
    }

    /// Run `cycles` passes, sleeping for the interval after each.
    ///
    /// A pass that cannot list worlds is logged and counted as empty.
    pub async fn run_cycles(&self, cycles: usize) -> Vec<ArchiveReport> {
        let mut reports = Vec::with_capacity(cycles);

        for _ in 0..cycles {
            reports.push(self.cycle().await);
        }

        reports
    }

    /// Run passes until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        tracing::info!(interval_secs = self.interval.as_secs(), "archive scheduler started");

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = self.cycle() => {},
            }
        }

        tracing::info!("archive scheduler stopped");
    }

    async fn cycle(&self) -> ArchiveReport {
        let report = match self.run_once().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "could not list worlds for archive pass");
                ArchiveReport::default()
            },
        };

        self.env.sleep(self.interval).await;

        report
    }
}
