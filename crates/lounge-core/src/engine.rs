//! Occupancy engine
//!
//! Every operation validates first, then mutates the device and session
//! tables, persists the session snapshot, hands the log change to the
//! journal and posts a refresh. If the snapshot cannot be persisted the
//! in-memory change is undone and the operation fails.

use chrono::{DateTime, Local};
use lounge_api::{
    API_VERSION, DeviceView, LogEntry, Member, Session, SessionView, StateSnapshot,
};
use lounge_config::RoomConfig;
use lounge_store::{MemberDirectory, SessionStore};
use lounge_util::{DeviceId, MemberId, elapsed_between, format_duration};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    CoreEvent, Device, DeviceTable, EngineError, EngineResult, Journal, JournalOp, RefreshSignal,
    SessionTable,
};

/// How a station switch ended
#[derive(Debug)]
pub enum SwitchOutcome {
    /// Checked out of `from` and into `to`
    Switched { from: DeviceId, to: DeviceId },
    /// The check-in to the target failed; the session is back on `from`
    RolledBack {
        from: DeviceId,
        to: DeviceId,
        error: EngineError,
    },
    /// The check-in failed and so did the compensation; the session is
    /// checked out and exists nowhere
    Inconsistent {
        from: DeviceId,
        to: DeviceId,
        switch_error: EngineError,
        rollback_error: EngineError,
    },
}

impl SwitchOutcome {
    /// Map to the public result of a switch
    pub fn into_result(self, identity: MemberId) -> EngineResult<CoreEvent> {
        match self {
            SwitchOutcome::Switched { from, to } => Ok(CoreEvent::Switched { identity, from, to }),
            SwitchOutcome::RolledBack { from, to, error } => Err(EngineError::SwitchRolledBack {
                identity,
                target: to,
                restored_to: from,
                source: Box::new(error),
            }),
            SwitchOutcome::Inconsistent {
                from,
                to,
                switch_error,
                rollback_error,
            } => Err(EngineError::SwitchAndRollbackFailed {
                identity,
                from,
                to,
                switch_error: Box::new(switch_error),
                rollback_error: Box::new(rollback_error),
            }),
        }
    }
}

/// The occupancy engine
pub struct CoreEngine {
    devices: DeviceTable,
    sessions: SessionTable,
    store: Arc<dyn SessionStore>,
    members: Arc<dyn MemberDirectory>,
    journal: Journal,
    refresh: RefreshSignal,
}

impl CoreEngine {
    /// Build the device table from `room` and restore the saved sessions.
    ///
    /// An unreadable snapshot starts the room empty. Saved sessions that
    /// no longer fit the room are repaired: repeated identities are
    /// dropped, and sessions on unknown or doubly-booked workstations go
    /// back to the queue.
    pub fn new(
        room: &RoomConfig,
        store: Arc<dyn SessionStore>,
        members: Arc<dyn MemberDirectory>,
        journal: Journal,
        refresh: RefreshSignal,
    ) -> Self {
        let saved = match store.load_sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "Session snapshot unreadable, starting empty");
                Vec::new()
            }
        };

        let devices = DeviceTable::from_room(room);
        let (sessions, repaired) = restore_sessions(&devices, saved);

        let mut engine = Self {
            devices,
            sessions,
            store,
            members,
            journal,
            refresh,
        };
        engine.devices.sync_all(&engine.sessions);

        if repaired > 0 {
            warn!(repaired, "Saved sessions repaired on load");
            if let Err(e) = engine.persist() {
                warn!(error = %e, "Failed to save repaired sessions");
            }
        }

        info!(
            devices = engine.devices.len(),
            sessions = engine.sessions.len(),
            queued = engine.sessions.queue().count(),
            "Core engine initialized"
        );

        engine
    }

    // Queries

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.ids()
    }

    pub fn sessions(&self) -> &[Session] {
        self.sessions.as_slice()
    }

    pub fn session(&self, identity: &MemberId) -> Option<&Session> {
        self.sessions.get(identity)
    }

    /// Sessions waiting for a device, oldest first
    pub fn queue(&self) -> Vec<&Session> {
        self.sessions.queue().collect()
    }

    pub fn sessions_on(&self, device: DeviceId) -> Vec<&Session> {
        self.sessions.on_device(device).collect()
    }

    pub fn members(&self) -> &Arc<dyn MemberDirectory> {
        &self.members
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Full occupancy snapshot for clients
    pub fn snapshot(&self, now: DateTime<Local>) -> StateSnapshot {
        let view = |s: &Session| SessionView {
            identity: s.identity.clone(),
            name: s.name.clone(),
            device: s.device,
            checked_in_at: s.checked_in_at,
            elapsed: format_duration(elapsed_between(s.checked_in_at, now)),
        };

        let devices = self
            .devices
            .iter()
            .map(|d| DeviceView {
                id: d.id,
                kind: d.kind,
                status: d.status,
                occupant: d.occupant.clone(),
                sessions: self.sessions.on_device(d.id).map(view).collect(),
            })
            .collect();

        StateSnapshot {
            api_version: API_VERSION,
            devices,
            queue: self.sessions.queue().map(view).collect(),
            active_sessions: self.sessions.len(),
            device_count: self.devices.len(),
        }
    }

    // Operations

    /// Start a session on `device`, or in the queue when `device` is the
    /// queue marker
    pub fn check_in(
        &mut self,
        name: &str,
        identity: &MemberId,
        device: DeviceId,
        now: DateTime<Local>,
    ) -> EngineResult<CoreEvent> {
        let session = self.check_in_step(name, identity, device, now)?;
        Ok(CoreEvent::CheckedIn { session })
    }

    /// End the session of `identity`, wherever it is
    pub fn check_out(&mut self, identity: &MemberId, now: DateTime<Local>) -> EngineResult<CoreEvent> {
        let session = self.check_out_step(identity, now)?;
        Ok(CoreEvent::CheckedOut {
            identity: session.identity,
            device: session.device,
            checked_in_at: session.checked_in_at,
            checked_out_at: now,
            usage: elapsed_between(session.checked_in_at, now),
        })
    }

    /// Drop a queued session
    pub fn remove_from_queue(
        &mut self,
        identity: &MemberId,
        now: DateTime<Local>,
    ) -> EngineResult<CoreEvent> {
        let session = self
            .sessions
            .get(identity)
            .ok_or_else(|| EngineError::SessionNotFound(identity.clone()))?;
        if !session.is_queued() {
            return Err(EngineError::SessionNotQueued {
                identity: identity.clone(),
                device: session.device,
            });
        }

        let session = self.check_out_step(identity, now)?;
        Ok(CoreEvent::Dequeued {
            identity: session.identity,
            waited: elapsed_between(session.checked_in_at, now),
        })
    }

    /// Give a queued session a device. The check-in time is kept.
    pub fn assign_queued_session(
        &mut self,
        identity: &MemberId,
        device: DeviceId,
        _now: DateTime<Local>,
    ) -> EngineResult<CoreEvent> {
        let session = self
            .sessions
            .get(identity)
            .ok_or_else(|| EngineError::SessionNotFound(identity.clone()))?;
        if !session.is_queued() {
            return Err(EngineError::AlreadyAssigned {
                identity: identity.clone(),
                device: session.device,
            });
        }
        let checked_in_at = session.checked_in_at;
        self.check_device_available(device)?;

        self.set_device(identity, device);
        if let Err(e) = self.persist() {
            self.set_device(identity, DeviceId::QUEUE);
            return Err(e.into());
        }

        info!(identity = %identity, device = %device, "Queued session assigned");

        self.journal.submit(JournalOp::Assign {
            identity: identity.clone(),
            checked_in_at,
            device,
        });
        self.refresh.post();

        Ok(CoreEvent::Assigned {
            identity: identity.clone(),
            device,
        })
    }

    /// Move an assigned session to another device: check out, then check
    /// in to the target, checking back in to the original device if that
    /// fails
    pub fn switch_station(
        &mut self,
        identity: &MemberId,
        target: DeviceId,
        now: DateTime<Local>,
    ) -> EngineResult<CoreEvent> {
        let session = self
            .sessions
            .get(identity)
            .ok_or_else(|| EngineError::SessionNotFound(identity.clone()))?;
        if session.is_queued() {
            return Err(EngineError::SessionQueued(identity.clone()));
        }
        if session.device == target {
            return Err(EngineError::SameDevice {
                identity: identity.clone(),
                device: target,
            });
        }
        self.check_device_available(target)?;

        let name = session.name.clone();
        let outcome = self.run_switch(&name, identity, target, now)?;

        match &outcome {
            SwitchOutcome::Switched { from, to } => {
                info!(identity = %identity, from = %from, to = %to, "Station switched");
            }
            SwitchOutcome::RolledBack { from, to, error } => {
                warn!(
                    identity = %identity,
                    from = %from,
                    to = %to,
                    error = %error,
                    "Station switch failed, restored to original device"
                );
            }
            SwitchOutcome::Inconsistent {
                from,
                to,
                switch_error,
                rollback_error,
            } => {
                error!(
                    identity = %identity,
                    name = %name,
                    from = %from,
                    to = %to,
                    switch_error = %switch_error,
                    rollback_error = %rollback_error,
                    "Station switch and rollback both failed; session needs manual reconciliation"
                );
            }
        }

        outcome.into_result(identity.clone())
    }

    /// Both phases of a switch. Fails outright only if the check-out
    /// itself fails, in which case nothing changed.
    fn run_switch(
        &mut self,
        name: &str,
        identity: &MemberId,
        to: DeviceId,
        now: DateTime<Local>,
    ) -> EngineResult<SwitchOutcome> {
        let previous = self.check_out_step(identity, now)?;
        let from = previous.device;

        let switch_error = match self.check_in_step(name, identity, to, now) {
            Ok(_) => return Ok(SwitchOutcome::Switched { from, to }),
            Err(e) => e,
        };

        Ok(match self.check_in_step(name, identity, from, now) {
            Ok(_) => SwitchOutcome::RolledBack {
                from,
                to,
                error: switch_error,
            },
            Err(rollback_error) => SwitchOutcome::Inconsistent {
                from,
                to,
                switch_error,
                rollback_error,
            },
        })
    }

    fn check_in_step(
        &mut self,
        name: &str,
        identity: &MemberId,
        device: DeviceId,
        now: DateTime<Local>,
    ) -> EngineResult<Session> {
        if let Some(existing) = self.sessions.get(identity) {
            return Err(EngineError::DuplicateSession {
                identity: identity.clone(),
                name: existing.name.clone(),
                device: existing.device,
            });
        }
        if !device.is_queue() {
            self.check_device_available(device)?;
        }

        let session = Session {
            identity: identity.clone(),
            name: name.to_string(),
            checked_in_at: now,
            device,
        };
        self.sessions.push(session.clone());
        self.devices.sync(device, &self.sessions);

        if let Err(e) = self.persist() {
            self.sessions.pop();
            self.devices.sync(device, &self.sessions);
            return Err(e.into());
        }

        info!(identity = %identity, device = %device, "Checked in");

        self.enroll_if_unknown(name, identity);
        self.journal.submit(JournalOp::CheckIn(LogEntry::opened(&session)));
        self.refresh.post();

        Ok(session)
    }

    fn check_out_step(&mut self, identity: &MemberId, now: DateTime<Local>) -> EngineResult<Session> {
        let (index, session) = self
            .sessions
            .remove(identity)
            .ok_or_else(|| EngineError::SessionNotFound(identity.clone()))?;
        self.devices.sync(session.device, &self.sessions);

        if let Err(e) = self.persist() {
            let device = session.device;
            self.sessions.restore(index, session);
            self.devices.sync(device, &self.sessions);
            return Err(e.into());
        }

        let usage = elapsed_between(session.checked_in_at, now);
        info!(
            identity = %identity,
            device = %session.device,
            usage = %format_duration(usage),
            "Checked out"
        );

        self.journal.submit(JournalOp::CheckOut {
            identity: identity.clone(),
            device: session.device,
            checked_in_at: session.checked_in_at,
            checked_out_at: now,
        });
        self.refresh.post();

        Ok(session)
    }

    fn check_device_available(&self, id: DeviceId) -> EngineResult<()> {
        let device = self
            .devices
            .get(id)
            .ok_or(EngineError::DeviceNotFound(id))?;
        match device.blocker() {
            Some(occupant) => Err(EngineError::DeviceBusy {
                device: id,
                occupant: occupant.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Point a session at another device and resync both devices
    fn set_device(&mut self, identity: &MemberId, device: DeviceId) {
        let Some(session) = self.sessions.get_mut(identity) else {
            return;
        };
        let previous = std::mem::replace(&mut session.device, device);
        self.devices.sync(previous, &self.sessions);
        self.devices.sync(device, &self.sessions);
    }

    fn enroll_if_unknown(&self, name: &str, identity: &MemberId) {
        if self.members.lookup(identity).is_some() {
            return;
        }
        let member = Member {
            name: name.to_string(),
            identity: identity.clone(),
        };
        match self.members.enroll(member) {
            Ok(()) => debug!(identity = %identity, "New member enrolled"),
            Err(e) => warn!(identity = %identity, error = %e, "Failed to enroll member"),
        }
    }

    fn persist(&self) -> lounge_store::StoreResult<()> {
        self.store.save_sessions(self.sessions.as_slice())
    }
}

/// Make a saved snapshot consistent with the room. Returns the table and
/// the number of sessions that had to be changed or dropped.
fn restore_sessions(devices: &DeviceTable, saved: Vec<Session>) -> (SessionTable, usize) {
    let mut seen = HashSet::new();
    let mut bound = HashSet::new();
    let mut repaired = 0;
    let mut sessions = Vec::with_capacity(saved.len());

    for mut session in saved {
        if !seen.insert(session.identity.clone()) {
            warn!(identity = %session.identity, "Dropping repeated saved session");
            repaired += 1;
            continue;
        }

        if !session.device.is_queue() {
            let fits = match devices.get(session.device) {
                Some(device) if device.is_workstation() => bound.insert(session.device),
                Some(_) => true,
                None => false,
            };
            if !fits {
                warn!(
                    identity = %session.identity,
                    device = %session.device,
                    "Saved session cannot keep its device, moving to queue"
                );
                session.device = DeviceId::QUEUE;
                repaired += 1;
            }
        }

        sessions.push(session);
    }

    (SessionTable::from_sessions(sessions), repaired)
}
