//! Active session table

use lounge_api::Session;
use lounge_util::{DeviceId, MemberId};

/// Active and queued sessions in check-in order.
///
/// Identities are unique within the table.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    sessions: Vec<Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a snapshot. Duplicate identities are not filtered here;
    /// the engine repairs them on load.
    pub fn from_sessions(sessions: Vec<Session>) -> Self {
        Self { sessions }
    }

    pub fn get(&self, identity: &MemberId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.identity == identity)
    }

    pub fn contains(&self, identity: &MemberId) -> bool {
        self.get(identity).is_some()
    }

    pub(crate) fn get_mut(&mut self, identity: &MemberId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.identity == identity)
    }

    pub(crate) fn push(&mut self, session: Session) {
        self.sessions.push(session);
    }

    /// Remove a session, returning it with the position it held
    pub(crate) fn remove(&mut self, identity: &MemberId) -> Option<(usize, Session)> {
        let index = self.sessions.iter().position(|s| &s.identity == identity)?;
        Some((index, self.sessions.remove(index)))
    }

    /// Put a removed session back where it was
    pub(crate) fn restore(&mut self, index: usize, session: Session) {
        let index = index.min(self.sessions.len());
        self.sessions.insert(index, session);
    }

    pub(crate) fn pop(&mut self) -> Option<Session> {
        self.sessions.pop()
    }

    /// Sessions bound to `device`, in check-in order
    pub fn on_device(&self, device: DeviceId) -> impl Iterator<Item = &Session> {
        self.sessions.iter().filter(move |s| s.device == device)
    }

    /// Sessions waiting for a device, oldest first
    pub fn queue(&self) -> impl Iterator<Item = &Session> {
        self.on_device(DeviceId::QUEUE)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn as_slice(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn session(identity: &str, device: u32) -> Session {
        Session {
            identity: MemberId::new(identity),
            name: identity.to_lowercase(),
            checked_in_at: Local.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
            device: DeviceId::new(device),
        }
    }

    #[test]
    fn remove_and_restore_keeps_order() {
        let mut table = SessionTable::from_sessions(vec![
            session("A", 1),
            session("B", 0),
            session("C", 2),
        ]);

        let (index, removed) = table.remove(&MemberId::new("B")).unwrap();
        assert_eq!(index, 1);
        assert_eq!(table.len(), 2);

        table.restore(index, removed);
        let order: Vec<_> = table.iter().map(|s| s.identity.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn queue_lists_unassigned_in_order() {
        let mut table = SessionTable::from_sessions(vec![
            session("A", 0),
            session("B", 4),
            session("C", 0),
        ]);

        let queue: Vec<_> = table.queue().map(|s| s.identity.as_str()).collect();
        assert_eq!(queue, vec!["A", "C"]);
        assert_eq!(table.on_device(DeviceId::new(4)).count(), 1);
        assert!(table.remove(&MemberId::new("Z")).is_none());
    }
}
