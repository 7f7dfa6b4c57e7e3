//! Usage journal: feeds session transitions into the daily log
//!
//! The engine submits operations and moves on. In queued mode a single
//! writer task applies them in submission order, so writes for the same
//! day never race.

use chrono::{DateTime, Local};
use lounge_api::LogEntry;
use lounge_store::{DailyLog, PatchOutcome};
use lounge_util::{DeviceId, MemberId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// One change to the daily log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalOp {
    /// New open entry
    CheckIn(LogEntry),
    /// Close the open entry of a session
    CheckOut {
        identity: MemberId,
        device: DeviceId,
        checked_in_at: DateTime<Local>,
        checked_out_at: DateTime<Local>,
    },
    /// Move the open queue entry of a session onto its new device
    Assign {
        identity: MemberId,
        checked_in_at: DateTime<Local>,
        device: DeviceId,
    },
}

enum Message {
    Op(JournalOp),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone)]
enum Mode {
    Inline(Arc<DailyLog>),
    Queued(mpsc::UnboundedSender<Message>),
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Op(op) => f.debug_tuple("Op").field(op).finish(),
            Message::Flush(_) => f.write_str("Flush"),
        }
    }
}

/// Handle for submitting journal operations
#[derive(Debug, Clone)]
pub struct Journal {
    mode: Mode,
}

impl Journal {
    /// Apply every operation synchronously, before `submit` returns
    pub fn inline(log: Arc<DailyLog>) -> Self {
        Self {
            mode: Mode::Inline(log),
        }
    }

    /// Start the writer task. Must be called inside a tokio runtime.
    ///
    /// The task ends once every `Journal` handle has been dropped and the
    /// remaining operations are written.
    pub fn spawn(log: Arc<DailyLog>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(log, rx));
        (
            Self {
                mode: Mode::Queued(tx),
            },
            handle,
        )
    }

    /// Hand an operation to the log. Failures are logged, never returned.
    pub fn submit(&self, op: JournalOp) {
        match &self.mode {
            Mode::Inline(log) => apply(log, op),
            Mode::Queued(tx) => {
                if let Err(mpsc::error::SendError(Message::Op(op))) = tx.send(Message::Op(op)) {
                    error!(op = ?op, "Journal writer gone, log operation lost");
                }
            }
        }
    }

    /// Wait until every operation submitted so far has been applied
    pub async fn flush(&self) {
        if let Mode::Queued(tx) = &self.mode {
            let (done_tx, done_rx) = oneshot::channel();
            if tx.send(Message::Flush(done_tx)).is_ok() {
                let _ = done_rx.await;
            }
        }
    }
}

async fn run_writer(log: Arc<DailyLog>, mut rx: mpsc::UnboundedReceiver<Message>) {
    debug!("Journal writer started");

    while let Some(message) = rx.recv().await {
        match message {
            Message::Op(op) => {
                let log = log.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || apply(&log, op)).await {
                    error!(error = %e, "Journal write task failed");
                }
            }
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("Journal writer stopped");
}

/// Apply one operation to the log
fn apply(log: &DailyLog, op: JournalOp) {
    match op {
        JournalOp::CheckIn(entry) => {
            let identity = entry.identity.clone();
            if let Err(e) = log.append(entry) {
                warn!(identity = %identity, error = %e, "Failed to append log entry");
            }
        }

        JournalOp::CheckOut {
            identity,
            device,
            checked_in_at,
            checked_out_at,
        } => match log.close_entry(&identity, device, checked_in_at, checked_out_at) {
            Ok(PatchOutcome::Patched { index }) => {
                debug!(identity = %identity, device = %device, index, "Log entry closed");
            }
            Ok(PatchOutcome::NoMatch) => {
                warn!(
                    identity = %identity,
                    device = %device,
                    checked_in_at = %checked_in_at,
                    "No open log entry to close; log and sessions disagree"
                );
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to close log entry");
            }
        },

        JournalOp::Assign {
            identity,
            checked_in_at,
            device,
        } => match log.assign_entry(&identity, checked_in_at, device) {
            Ok(PatchOutcome::Patched { index }) => {
                debug!(identity = %identity, device = %device, index, "Log entry assigned");
            }
            Ok(PatchOutcome::NoMatch) => {
                warn!(
                    identity = %identity,
                    checked_in_at = %checked_in_at,
                    "No open queue entry to assign; log and sessions disagree"
                );
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to patch log entry");
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 1, h, m, 0).unwrap()
    }

    fn open_entry(identity: &str, device: u32, checked_in_at: DateTime<Local>) -> LogEntry {
        LogEntry {
            name: identity.to_lowercase(),
            identity: MemberId::new(identity),
            device: DeviceId::new(device),
            checked_in_at,
            checked_out_at: None,
            usage: None,
        }
    }

    #[test]
    fn inline_applies_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(DailyLog::new(dir.path()));
        let journal = Journal::inline(log.clone());

        journal.submit(JournalOp::CheckIn(open_entry("S1", 0, at(9, 0))));
        journal.submit(JournalOp::Assign {
            identity: MemberId::new("S1"),
            checked_in_at: at(9, 0),
            device: DeviceId::new(4),
        });

        let entries = log.read(at(9, 0).date_naive()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].device, DeviceId::new(4));
    }

    #[tokio::test]
    async fn queued_writer_keeps_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(DailyLog::new(dir.path()));
        let (journal, _handle) = Journal::spawn(log.clone());

        for i in 0..5u32 {
            journal.submit(JournalOp::CheckIn(open_entry(&format!("S{}", i), i + 1, at(9, i))));
        }
        journal.submit(JournalOp::CheckOut {
            identity: MemberId::new("S2"),
            device: DeviceId::new(3),
            checked_in_at: at(9, 2),
            checked_out_at: at(9, 47),
        });
        journal.flush().await;

        let entries = log.read(at(9, 0).date_naive()).unwrap();
        let order: Vec<_> = entries.iter().map(|e| e.identity.as_str()).collect();
        assert_eq!(order, vec!["S0", "S1", "S2", "S3", "S4"]);
        assert_eq!(entries[2].usage.as_deref(), Some("45m00s"));
    }

    #[tokio::test]
    async fn writer_stops_when_handles_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(DailyLog::new(dir.path()));
        let (journal, handle) = Journal::spawn(log.clone());

        journal.submit(JournalOp::CheckIn(open_entry("S1", 1, at(10, 0))));
        drop(journal);
        handle.await.unwrap();

        assert_eq!(log.read(at(10, 0).date_naive()).unwrap().len(), 1);
    }
}
