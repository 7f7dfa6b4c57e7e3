//! Device -> slot mapping

use lounge_store::SlotRecord;
use lounge_util::DeviceId;
use std::collections::{BTreeMap, BTreeSet};

/// Result of moving a device to a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotMove {
    /// Already there
    Unchanged { slot: usize },
    /// Target slot was free
    Moved { from: usize, to: usize },
    /// Target slot belonged to `other`, which took the vacated slot
    Swapped {
        other: DeviceId,
        from: usize,
        to: usize,
    },
}

/// Placement of devices in numbered slots.
///
/// After `reconcile` this is a bijection from the room's devices onto
/// `0..device_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotMap {
    slots: BTreeMap<DeviceId, usize>,
}

impl SlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping as persisted; the last record for a device wins
    pub fn from_records(records: &[SlotRecord]) -> Self {
        Self {
            slots: records.iter().map(|r| (r.device, r.slot)).collect(),
        }
    }

    /// Records in device order
    pub fn records(&self) -> Vec<SlotRecord> {
        self.slots
            .iter()
            .map(|(&device, &slot)| SlotRecord { device, slot })
            .collect()
    }

    pub fn slot_of(&self, device: DeviceId) -> Option<usize> {
        self.slots.get(&device).copied()
    }

    pub fn device_at(&self, slot: usize) -> Option<DeviceId> {
        self.slots
            .iter()
            .find(|&(_, &s)| s == slot)
            .map(|(&device, _)| device)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, usize)> + '_ {
        self.slots.iter().map(|(&device, &slot)| (device, slot))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Make the mapping cover exactly `devices`.
    ///
    /// Placements of unknown devices, out-of-range slots and repeated slots
    /// are dropped first. Every device left without a slot then takes the
    /// lowest unused slot, in `preference` order followed by the remaining
    /// devices in ascending id order. Devices that already have a valid
    /// slot keep it. Returns whether anything changed.
    pub fn reconcile(&mut self, devices: &[DeviceId], preference: &[DeviceId]) -> bool {
        let before = self.slots.clone();
        let known: BTreeSet<DeviceId> = devices.iter().copied().collect();
        let capacity = known.len();

        let mut used = BTreeSet::new();
        self.slots
            .retain(|device, slot| known.contains(device) && *slot < capacity && used.insert(*slot));

        let order = preference
            .iter()
            .copied()
            .filter(|d| known.contains(d))
            .chain(known.iter().copied());

        let mut next = 0;
        for device in order {
            if self.slots.contains_key(&device) {
                continue;
            }
            while used.contains(&next) {
                next += 1;
            }
            self.slots.insert(device, next);
            used.insert(next);
        }

        self.slots != before
    }

    /// Put `device` into `slot`, swapping with the current owner if any
    pub fn move_to(&mut self, device: DeviceId, slot: usize) -> Option<SlotMove> {
        let from = self.slot_of(device)?;
        if from == slot {
            return Some(SlotMove::Unchanged { slot });
        }

        let other = self.device_at(slot);
        self.slots.insert(device, slot);
        Some(match other {
            Some(other) => {
                self.slots.insert(other, from);
                SlotMove::Swapped {
                    other,
                    from,
                    to: slot,
                }
            }
            None => SlotMove::Moved { from, to: slot },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<DeviceId> {
        raw.iter().copied().map(DeviceId::new).collect()
    }

    fn is_bijection(map: &SlotMap, count: usize) -> bool {
        let slots: BTreeSet<usize> = map.iter().map(|(_, s)| s).collect();
        map.len() == count && slots.len() == count && slots.iter().all(|&s| s < count)
    }

    #[test]
    fn fresh_map_follows_preference() {
        let devices = ids(&(1..=18).collect::<Vec<_>>());
        let preference = ids(&[16, 15, 14, 11, 12, 13, 10, 9, 8, 7, 6, 5, 1, 2, 3, 4, 17, 18]);

        let mut map = SlotMap::new();
        assert!(map.reconcile(&devices, &preference));
        assert!(is_bijection(&map, 18));

        assert_eq!(map.slot_of(DeviceId::new(16)), Some(0));
        assert_eq!(map.slot_of(DeviceId::new(11)), Some(3));
        assert_eq!(map.slot_of(DeviceId::new(4)), Some(15));
        assert_eq!(map.slot_of(DeviceId::new(18)), Some(17));
    }

    #[test]
    fn reconcile_keeps_existing_and_fills_gaps() {
        let devices = ids(&[1, 2, 3, 4]);
        let mut map = SlotMap::from_records(&[
            SlotRecord { device: DeviceId::new(3), slot: 0 },
            SlotRecord { device: DeviceId::new(1), slot: 2 },
        ]);

        assert!(map.reconcile(&devices, &ids(&[4, 3, 2, 1])));
        assert!(is_bijection(&map, 4));
        assert_eq!(map.slot_of(DeviceId::new(3)), Some(0));
        assert_eq!(map.slot_of(DeviceId::new(1)), Some(2));
        assert_eq!(map.slot_of(DeviceId::new(4)), Some(1));
        assert_eq!(map.slot_of(DeviceId::new(2)), Some(3));

        // Already complete: nothing to do
        assert!(!map.reconcile(&devices, &ids(&[4, 3, 2, 1])));
    }

    #[test]
    fn reconcile_repairs_bad_records() {
        let devices = ids(&[1, 2, 3]);
        let mut map = SlotMap::from_records(&[
            SlotRecord { device: DeviceId::new(1), slot: 1 },
            SlotRecord { device: DeviceId::new(2), slot: 1 },
            SlotRecord { device: DeviceId::new(3), slot: 9 },
            SlotRecord { device: DeviceId::new(7), slot: 0 },
        ]);

        map.reconcile(&devices, &[]);
        assert!(is_bijection(&map, 3));
        assert_eq!(map.slot_of(DeviceId::new(1)), Some(1));
        assert_eq!(map.slot_of(DeviceId::new(7)), None);
    }

    #[test]
    fn devices_missing_from_preference_go_last_ascending() {
        let devices = ids(&[1, 2, 3, 4]);
        let mut map = SlotMap::new();
        map.reconcile(&devices, &ids(&[3]));

        assert_eq!(map.slot_of(DeviceId::new(3)), Some(0));
        assert_eq!(map.slot_of(DeviceId::new(1)), Some(1));
        assert_eq!(map.slot_of(DeviceId::new(2)), Some(2));
        assert_eq!(map.slot_of(DeviceId::new(4)), Some(3));
    }

    #[test]
    fn move_swaps_with_owner() {
        let devices = ids(&[1, 2, 3]);
        let mut map = SlotMap::new();
        map.reconcile(&devices, &[]);

        assert_eq!(
            map.move_to(DeviceId::new(1), 2),
            Some(SlotMove::Swapped { other: DeviceId::new(3), from: 0, to: 2 })
        );
        assert_eq!(map.slot_of(DeviceId::new(1)), Some(2));
        assert_eq!(map.slot_of(DeviceId::new(3)), Some(0));
        assert!(is_bijection(&map, 3));

        assert_eq!(
            map.move_to(DeviceId::new(2), 1),
            Some(SlotMove::Unchanged { slot: 1 })
        );
        assert_eq!(map.move_to(DeviceId::new(9), 0), None);
    }

    #[test]
    fn move_into_free_slot() {
        let mut map = SlotMap::from_records(&[SlotRecord { device: DeviceId::new(1), slot: 0 }]);
        assert_eq!(
            map.move_to(DeviceId::new(1), 1),
            Some(SlotMove::Moved { from: 0, to: 1 })
        );
    }
}
