//! Store trait definitions

use lounge_api::{Member, Session};
use lounge_util::{DeviceId, MemberId};
use serde::{Deserialize, Serialize};

use crate::StoreResult;

/// Persistence of the active session table.
///
/// The stored value is always a complete snapshot, never a delta.
pub trait SessionStore: Send + Sync {
    /// Load the last saved sessions. A store that was never written
    /// yields an empty list.
    fn load_sessions(&self) -> StoreResult<Vec<Session>>;

    /// Replace the stored sessions with `sessions`
    fn save_sessions(&self, sessions: &[Session]) -> StoreResult<()>;
}

/// Persistence of the device -> slot mapping
pub trait LayoutStore: Send + Sync {
    /// Load the saved layout, or `None` if none was ever saved
    fn load_layout(&self) -> StoreResult<Option<Vec<SlotRecord>>>;

    /// Replace the saved layout
    fn save_layout(&self, slots: &[SlotRecord]) -> StoreResult<()>;
}

/// Read access to the member directory, plus enrollment of newcomers
pub trait MemberDirectory: Send + Sync {
    /// Find a member by identity
    fn lookup(&self, identity: &MemberId) -> Option<Member>;

    /// Case-insensitive substring search over names and identities
    fn search(&self, query: &str) -> Vec<Member>;

    /// Add a member that was not known before
    fn enroll(&self, member: Member) -> StoreResult<()>;

    /// Re-read the backing store; returns the member count
    fn reload(&self) -> StoreResult<usize>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One persisted placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub device: DeviceId,
    pub slot: usize,
}

pub(crate) fn matches_query(member: &Member, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty()
        || member.name.to_lowercase().contains(&query)
        || member.identity.as_str().to_lowercase().contains(&query)
}
