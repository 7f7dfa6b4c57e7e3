//! Daily usage log: one JSON file per calendar day
//!
//! Each file holds the complete list of entries for its day and is
//! rewritten as a whole on every change. Every read-modify-write runs
//! under a single lock, so concurrent updates of the same day never
//! interleave.

use chrono::{DateTime, Local, NaiveDate};
use lounge_api::LogEntry;
use lounge_util::{DeviceId, MemberId, elapsed_between, format_duration};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::StoreResult;
use crate::file::{read_optional, write_atomic};

/// Result of patching an existing log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The entry at this index was updated
    Patched { index: usize },
    /// No open entry matched
    NoMatch,
}

impl PatchOutcome {
    pub fn is_patched(&self) -> bool {
        matches!(self, PatchOutcome::Patched { .. })
    }
}

/// Find the entry to patch: scan from newest to oldest and take the first
/// open entry with the same identity, device and check-in time.
///
/// Should two open entries ever look identical, the newest one wins.
pub fn find_open_entry(
    entries: &[LogEntry],
    identity: &MemberId,
    device: DeviceId,
    checked_in_at: DateTime<Local>,
) -> Option<usize> {
    entries.iter().rposition(|e| {
        e.is_open()
            && &e.identity == identity
            && e.device == device
            && e.checked_in_at == checked_in_at
    })
}

/// Directory of per-day log files
#[derive(Debug)]
pub struct DailyLog {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl DailyLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the entries of `day`
    pub fn path_for(&self, day: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("lounge-{}.json", day.format("%Y-%m-%d")))
    }

    /// All entries of `day`; a day without a file has no entries
    pub fn read(&self, day: NaiveDate) -> StoreResult<Vec<LogEntry>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_unlocked(day)
    }

    /// Read, modify and write the entries of `day` under the log lock.
    /// The file is only written when `f` changed something.
    pub fn update<R>(
        &self,
        day: NaiveDate,
        f: impl FnOnce(&mut Vec<LogEntry>) -> R,
    ) -> StoreResult<R> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut entries = self.read_unlocked(day)?;
        let before = entries.clone();
        let result = f(&mut entries);

        if entries != before {
            let json = serde_json::to_vec_pretty(&entries)?;
            write_atomic(&self.path_for(day), &json)?;
            debug!(day = %day, count = entries.len(), "Daily log written");
        }

        Ok(result)
    }

    /// Append a new entry to the file of its check-in day
    pub fn append(&self, entry: LogEntry) -> StoreResult<()> {
        let day = entry.checked_in_at.date_naive();
        self.update(day, |entries| entries.push(entry))
    }

    /// Close the open entry of a session: set its check-out time and the
    /// formatted usage.
    pub fn close_entry(
        &self,
        identity: &MemberId,
        device: DeviceId,
        checked_in_at: DateTime<Local>,
        checked_out_at: DateTime<Local>,
    ) -> StoreResult<PatchOutcome> {
        self.update(checked_in_at.date_naive(), |entries| {
            match find_open_entry(entries, identity, device, checked_in_at) {
                Some(index) => {
                    let entry = &mut entries[index];
                    entry.checked_out_at = Some(checked_out_at);
                    entry.usage = Some(format_duration(elapsed_between(
                        entry.checked_in_at,
                        checked_out_at,
                    )));
                    PatchOutcome::Patched { index }
                }
                None => PatchOutcome::NoMatch,
            }
        })
    }

    /// Move the open queue entry of a session onto the device it was given
    pub fn assign_entry(
        &self,
        identity: &MemberId,
        checked_in_at: DateTime<Local>,
        device: DeviceId,
    ) -> StoreResult<PatchOutcome> {
        self.update(checked_in_at.date_naive(), |entries| {
            match find_open_entry(entries, identity, DeviceId::QUEUE, checked_in_at) {
                Some(index) => {
                    entries[index].device = device;
                    PatchOutcome::Patched { index }
                }
                None => PatchOutcome::NoMatch,
            }
        })
    }

    fn read_unlocked(&self, day: NaiveDate) -> StoreResult<Vec<LogEntry>> {
        match read_optional(&self.path_for(day))? {
            Some(bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(&bytes)?),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 1, h, m, s).unwrap()
    }

    fn entry(identity: &str, device: u32, checked_in_at: DateTime<Local>) -> LogEntry {
        LogEntry {
            name: "Ann".into(),
            identity: MemberId::new(identity),
            device: DeviceId::new(device),
            checked_in_at,
            checked_out_at: None,
            usage: None,
        }
    }

    #[test]
    fn missing_day_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = DailyLog::new(dir.path());

        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert!(log.read(day).unwrap().is_empty());
        assert!(!log.path_for(day).exists());
    }

    #[test]
    fn path_uses_date() {
        let log = DailyLog::new("/var/log/lounge");
        let day = NaiveDate::from_ymd_opt(2025, 12, 9).unwrap();
        assert_eq!(
            log.path_for(day),
            PathBuf::from("/var/log/lounge/lounge-2025-12-09.json")
        );
    }

    #[test]
    fn append_then_close() {
        let dir = tempfile::tempdir().unwrap();
        let log = DailyLog::new(dir.path());
        let id = MemberId::new("S3");

        log.append(entry("S3", 7, at(9, 0, 0))).unwrap();
        let outcome = log
            .close_entry(&id, DeviceId::new(7), at(9, 0, 0), at(10, 2, 5))
            .unwrap();
        assert_eq!(outcome, PatchOutcome::Patched { index: 0 });

        let entries = log.read(at(9, 0, 0).date_naive()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].checked_out_at, Some(at(10, 2, 5)));
        assert_eq!(entries[0].usage.as_deref(), Some("1h02m05s"));
    }

    #[test]
    fn close_requires_matching_check_in_time() {
        let dir = tempfile::tempdir().unwrap();
        let log = DailyLog::new(dir.path());
        let id = MemberId::new("S3");

        log.append(entry("S3", 7, at(9, 0, 0))).unwrap();
        let outcome = log
            .close_entry(&id, DeviceId::new(7), at(9, 0, 1), at(10, 0, 0))
            .unwrap();
        assert_eq!(outcome, PatchOutcome::NoMatch);
        assert!(log.read(at(9, 0, 0).date_naive()).unwrap()[0].is_open());
    }

    #[test]
    fn reverse_scan_prefers_newest_duplicate() {
        let entries = vec![
            entry("S1", 3, at(9, 0, 0)),
            entry("S2", 3, at(9, 0, 0)),
            entry("S1", 3, at(9, 0, 0)),
        ];

        let found = find_open_entry(&entries, &MemberId::new("S1"), DeviceId::new(3), at(9, 0, 0));
        assert_eq!(found, Some(2));
    }

    #[test]
    fn reverse_scan_skips_closed_entries() {
        let mut closed = entry("S1", 3, at(9, 0, 0));
        closed.checked_out_at = Some(at(9, 30, 0));
        let entries = vec![entry("S1", 3, at(9, 0, 0)), closed];

        let found = find_open_entry(&entries, &MemberId::new("S1"), DeviceId::new(3), at(9, 0, 0));
        assert_eq!(found, Some(0));
    }

    #[test]
    fn assign_patches_queue_entry_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let log = DailyLog::new(dir.path());
        let id = MemberId::new("S2");

        log.append(entry("S2", 0, at(11, 0, 0))).unwrap();
        let outcome = log.assign_entry(&id, at(11, 0, 0), DeviceId::new(5)).unwrap();
        assert!(outcome.is_patched());

        let entries = log.read(at(11, 0, 0).date_naive()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].device, DeviceId::new(5));
        assert!(entries[0].is_open());
    }

    #[test]
    fn no_match_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = DailyLog::new(dir.path());

        let outcome = log
            .close_entry(&MemberId::new("ghost"), DeviceId::new(1), at(9, 0, 0), at(9, 5, 0))
            .unwrap();
        assert_eq!(outcome, PatchOutcome::NoMatch);
        assert!(!log.path_for(at(9, 0, 0).date_naive()).exists());
    }

    #[test]
    fn concurrent_appends_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(DailyLog::new(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = log.clone();
                std::thread::spawn(move || {
                    log.append(entry(&format!("S{}", i), i, at(12, 0, i))).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.read(at(12, 0, 0).date_naive()).unwrap().len(), 8);
    }
}
