//! In-memory stores for tests and ephemeral runs

use lounge_api::{Member, Session};
use lounge_util::MemberId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::traits::matches_query;
use crate::{LayoutStore, MemberDirectory, SessionStore, SlotRecord, StoreResult};

/// Session and layout snapshots held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<Vec<Session>>,
    layout: Mutex<Option<Vec<SlotRecord>>>,
    session_saves: AtomicUsize,
    layout_saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with a session snapshot
    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            ..Self::default()
        }
    }

    /// Number of `save_sessions` calls so far
    pub fn session_saves(&self) -> usize {
        self.session_saves.load(Ordering::SeqCst)
    }

    /// Number of `save_layout` calls so far
    pub fn layout_saves(&self) -> usize {
        self.layout_saves.load(Ordering::SeqCst)
    }

    /// Last saved layout
    pub fn saved_layout(&self) -> Option<Vec<SlotRecord>> {
        self.layout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionStore for MemoryStore {
    fn load_sessions(&self) -> StoreResult<Vec<Session>> {
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_sessions(&self, sessions: &[Session]) -> StoreResult<()> {
        *self.sessions.lock().unwrap_or_else(PoisonError::into_inner) = sessions.to_vec();
        self.session_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl LayoutStore for MemoryStore {
    fn load_layout(&self) -> StoreResult<Option<Vec<SlotRecord>>> {
        Ok(self.saved_layout())
    }

    fn save_layout(&self, slots: &[SlotRecord]) -> StoreResult<()> {
        *self.layout.lock().unwrap_or_else(PoisonError::into_inner) = Some(slots.to_vec());
        self.layout_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Member directory held in memory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    members: Mutex<Vec<Member>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(members: Vec<Member>) -> Self {
        Self {
            members: Mutex::new(members),
        }
    }
}

impl MemberDirectory for MemoryDirectory {
    fn lookup(&self, identity: &MemberId) -> Option<Member> {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|m| &m.identity == identity)
            .cloned()
    }

    fn search(&self, query: &str) -> Vec<Member> {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| matches_query(m, query))
            .cloned()
            .collect()
    }

    fn enroll(&self, member: Member) -> StoreResult<()> {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(member);
        Ok(())
    }

    fn reload(&self) -> StoreResult<usize> {
        Ok(self.len())
    }

    fn len(&self) -> usize {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lounge_util::DeviceId;

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStore::new();
        assert!(store.load_layout().unwrap().is_none());

        store
            .save_layout(&[SlotRecord { device: DeviceId::new(1), slot: 0 }])
            .unwrap();
        store.save_sessions(&[]).unwrap();
        store.save_sessions(&[]).unwrap();

        assert_eq!(store.layout_saves(), 1);
        assert_eq!(store.session_saves(), 2);
        assert_eq!(store.load_layout().unwrap().map(|l| l.len()), Some(1));
    }

    #[test]
    fn memory_directory_enroll_and_search() {
        let members = MemoryDirectory::new();
        members
            .enroll(Member {
                name: "Ann Lee".into(),
                identity: MemberId::new("S1"),
            })
            .unwrap();

        assert_eq!(members.len(), 1);
        assert!(members.lookup(&MemberId::new("S1")).is_some());
        assert_eq!(members.search("lee").len(), 1);
        assert!(members.search("zed").is_empty());
    }
}
