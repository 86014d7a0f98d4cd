use log::warn;
use rusqlite::Connection;

use crate::model::AttendanceBatch;
use crate::remote::RemoteStore;
use crate::store;

/// Whether the device currently believes it can reach the school server.
/// This is a hint, never ground truth: a write attempted while "online"
/// can still fail, and the submission path must fall back to the queue
/// rather than drop the batch.
pub trait Connectivity {
    fn is_online(&self) -> bool;
}

/// The host UI forwards the runtime's online/offline signal; the daemon
/// just stores the latest value.
pub struct HostReported(pub bool);

impl Connectivity for HostReported {
    fn is_online(&self) -> bool {
        self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Confirmed committed to the remote store.
    Delivered,
    /// Accepted into the pending queue for a later sync pass.
    Queued,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    AlreadyRunning,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    pub success: bool,
    pub delivered: usize,
    pub remaining: usize,
    pub message: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SyncPass {
    Skipped(SkipReason),
    Completed(SyncOutcome),
}

/// Guards against overlapping sync passes. A second trigger while a pass
/// is in flight (connectivity event racing a manual "sync now") is
/// answered with `Skipped(AlreadyRunning)` instead of a duplicate pass.
#[derive(Default)]
pub struct SyncLock {
    in_flight: bool,
}

impl SyncLock {
    pub fn try_begin(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn end(&mut self) {
        self.in_flight = false;
    }
}

/// Submission-time decision: write directly when the runtime looks
/// online, queue otherwise. A direct write that fails is treated the same
/// as being offline. Returns an error only when the queue itself cannot
/// be persisted, since that is the one case where data would be lost.
pub fn submit_batch(
    conn: &Connection,
    remote: &mut dyn RemoteStore,
    connectivity: &dyn Connectivity,
    batch: &AttendanceBatch,
) -> anyhow::Result<SubmitOutcome> {
    if connectivity.is_online() {
        match remote.write_batch(batch) {
            Ok(()) => return Ok(SubmitOutcome::Delivered),
            Err(e) => {
                warn!(
                    "direct write failed for ({}, {}), queueing: {e:#}",
                    batch.class_id, batch.date
                );
            }
        }
    }
    store::enqueue(conn, batch)?;
    Ok(SubmitOutcome::Queued)
}

/// One attempt to drain the pending queue, oldest entry first. A failing
/// entry stays queued (attempts bumped) and does not block the entries
/// behind it. Redelivery is safe because the remote write replaces by
/// `(class_id, date)`.
pub fn run_sync_pass(
    conn: &Connection,
    remote: &mut dyn RemoteStore,
    connectivity: &dyn Connectivity,
    lock: &mut SyncLock,
) -> anyhow::Result<SyncPass> {
    if !connectivity.is_online() {
        return Ok(SyncPass::Skipped(SkipReason::Offline));
    }
    if !lock.try_begin() {
        return Ok(SyncPass::Skipped(SkipReason::AlreadyRunning));
    }
    let result = drain_queue(conn, remote);
    lock.end();
    result.map(SyncPass::Completed)
}

fn drain_queue(conn: &Connection, remote: &mut dyn RemoteStore) -> anyhow::Result<SyncOutcome> {
    let snapshot = store::list_pending(conn)?;
    let mut delivered = 0usize;
    let mut remaining = 0usize;
    for entry in &snapshot {
        match remote.write_batch(&entry.batch) {
            Ok(()) => {
                // Removal failure leaves the entry for redelivery, which
                // the replace-by-key write absorbs.
                if let Err(e) = store::remove_pending(conn, &entry.id) {
                    warn!("delivered entry {} could not be dequeued: {e:#}", entry.id);
                }
                delivered += 1;
            }
            Err(e) => {
                warn!(
                    "sync failed for ({}, {}): {e:#}",
                    entry.batch.class_id, entry.batch.date
                );
                if let Err(e) = store::bump_attempts(conn, &entry.id) {
                    warn!("could not record attempt for {}: {e:#}", entry.id);
                }
                remaining += 1;
            }
        }
    }
    let success = remaining == 0;
    Ok(SyncOutcome {
        success,
        delivered,
        remaining,
        message: outcome_message(delivered, remaining),
    })
}

/// Human-readable outcome shown by the UI's notification channel.
pub fn outcome_message(delivered: usize, remaining: usize) -> String {
    if remaining > 0 {
        return "falha ao sincronizar".to_string();
    }
    match delivered {
        1 => "1 chamada sincronizada".to_string(),
        n => format!("{n} chamadas sincronizadas"),
    }
}
