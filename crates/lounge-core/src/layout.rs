//! Room layout: persisted slot mapping plus the drag protocol
//!
//! Drag state is transient. Only a release over a different slot changes
//! the mapping, and only then is the layout written.

use lounge_api::{DragOutcome, LayoutView, SlotView};
use lounge_config::LayoutMetrics;
use lounge_store::{LayoutStore, StoreResult};
use lounge_util::DeviceId;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    Point, Size, SlotMap, SlotMove, clamp_to_surface, hits_icon, nearest_slot, slot_positions,
};

#[derive(Debug, Clone, Copy)]
struct Drag {
    device: DeviceId,
    /// Pointer position relative to the icon center at grab time
    offset: Point,
    position: Point,
}

/// Placement of devices on the room surface
pub struct SlotLayout {
    store: Arc<dyn LayoutStore>,
    metrics: LayoutMetrics,
    devices: Vec<DeviceId>,
    preference: Vec<DeviceId>,
    map: SlotMap,
    size: Size,
    positions: Vec<Point>,
    drag: Option<Drag>,
}

impl SlotLayout {
    /// Load the saved layout and reconcile it with `devices`.
    ///
    /// A missing or unreadable layout is rebuilt from `preference` and
    /// written back at once; otherwise it is only written if reconciling
    /// changed it.
    pub fn load(
        store: Arc<dyn LayoutStore>,
        metrics: LayoutMetrics,
        devices: Vec<DeviceId>,
        preference: Vec<DeviceId>,
    ) -> StoreResult<Self> {
        let (mut map, rebuild) = match store.load_layout() {
            Ok(Some(records)) => (SlotMap::from_records(&records), false),
            Ok(None) => {
                info!("No saved layout, building default placement");
                (SlotMap::new(), true)
            }
            Err(e) => {
                warn!(error = %e, "Saved layout unreadable, rebuilding");
                (SlotMap::new(), true)
            }
        };

        let changed = map.reconcile(&devices, &preference);
        if rebuild || changed {
            store.save_layout(&map.records())?;
        }

        Ok(Self {
            store,
            metrics,
            devices,
            preference,
            map,
            size: Size::default(),
            positions: Vec::new(),
            drag: None,
        })
    }

    pub fn map(&self) -> &SlotMap {
        &self.map
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Device currently being dragged
    pub fn dragging(&self) -> Option<DeviceId> {
        self.drag.map(|d| d.device)
    }

    /// The device set changed: place newcomers, drop departed devices
    pub fn update_devices(&mut self, devices: Vec<DeviceId>) -> StoreResult<bool> {
        self.devices = devices;
        if self
            .drag
            .is_some_and(|d| !self.devices.contains(&d.device))
        {
            self.drag = None;
        }

        let changed = self.map.reconcile(&self.devices, &self.preference);
        if changed {
            self.persist()?;
        }
        self.recompute();
        Ok(changed)
    }

    /// The surface was resized; slot positions follow
    pub fn resize(&mut self, size: Size) {
        if self.size != size {
            self.size = size;
            self.recompute();
            debug!(width = size.width, height = size.height, "Layout resized");
        }
    }

    /// Where to draw `device`: the drag position while it is dragged,
    /// otherwise its slot
    pub fn position_for(&self, device: DeviceId) -> Option<Point> {
        if let Some(drag) = self.drag
            && drag.device == device
        {
            return Some(drag.position);
        }
        let slot = self.map.slot_of(device)?;
        // Reconciled slots are below the device count, which is the number
        // of positions once a size is set
        debug_assert!(self.positions.is_empty() || slot < self.positions.len());
        self.positions.get(slot).copied()
    }

    /// Press at `point`: grab the device whose icon is under it
    pub fn begin_drag(&mut self, point: Point) -> Option<DeviceId> {
        if let Some(drag) = self.drag {
            return Some(drag.device);
        }

        let (device, center) = self.devices.iter().find_map(|&device| {
            let center = self.position_for(device)?;
            hits_icon(center, point, self.metrics.icon_size).then_some((device, center))
        })?;

        self.drag = Some(Drag {
            device,
            offset: point - center,
            position: center,
        });
        debug!(device = %device, "Drag started");
        Some(device)
    }

    /// Pointer moved to `point`; returns the new icon center
    pub fn update_drag(&mut self, point: Point) -> Option<Point> {
        let size = self.size;
        let metrics = self.metrics;
        let drag = self.drag.as_mut()?;
        drag.position = clamp_to_surface(point - drag.offset, size, &metrics);
        Some(drag.position)
    }

    /// Release: snap to the nearest slot and commit
    pub fn end_drag(&mut self) -> StoreResult<DragOutcome> {
        let Some(drag) = self.drag.take() else {
            return Ok(DragOutcome::Cancelled);
        };
        let Some(target) = nearest_slot(&self.positions, drag.position) else {
            return Ok(DragOutcome::Cancelled);
        };

        let previous = self.map.clone();
        let outcome = match self.map.move_to(drag.device, target) {
            None => return Ok(DragOutcome::Cancelled),
            Some(SlotMove::Unchanged { slot }) => {
                return Ok(DragOutcome::Unchanged {
                    device: drag.device,
                    slot,
                });
            }
            Some(SlotMove::Moved { from, to }) => DragOutcome::Moved {
                device: drag.device,
                from,
                to,
            },
            Some(SlotMove::Swapped { other, from, to }) => DragOutcome::Swapped {
                device: drag.device,
                other,
                from,
                to,
            },
        };

        if let Err(e) = self.persist() {
            self.map = previous;
            return Err(e);
        }
        info!(outcome = ?outcome, "Layout changed");
        Ok(outcome)
    }

    /// Abandon the drag without committing
    pub fn cancel_drag(&mut self) -> bool {
        self.drag.take().is_some()
    }

    /// Snapshot for clients
    pub fn view(&self) -> LayoutView {
        let slots = self
            .map
            .iter()
            .filter_map(|(device, slot)| {
                let at = self.position_for(device)?;
                Some(SlotView {
                    device,
                    slot,
                    x: at.x,
                    y: at.y,
                })
            })
            .collect();

        LayoutView {
            width: self.size.width,
            height: self.size.height,
            slots,
            dragging: self.dragging(),
        }
    }

    fn recompute(&mut self) {
        self.positions = slot_positions(self.devices.len(), self.size, &self.metrics);
    }

    fn persist(&self) -> StoreResult<()> {
        self.store.save_layout(&self.map.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lounge_store::{JsonFileStore, MemoryStore, SlotRecord};

    fn devices(n: u32) -> Vec<DeviceId> {
        (1..=n).map(DeviceId::new).collect()
    }

    fn surface() -> Size {
        Size::new(1000.0, 800.0)
    }

    fn layout(store: Arc<MemoryStore>) -> SlotLayout {
        let mut layout =
            SlotLayout::load(store, LayoutMetrics::default(), devices(4), devices(4)).unwrap();
        layout.resize(surface());
        layout
    }

    #[test]
    fn missing_layout_is_built_and_saved() {
        let store = Arc::new(MemoryStore::new());
        let layout = layout(store.clone());

        assert_eq!(store.layout_saves(), 1);
        assert_eq!(layout.map().len(), 4);
        assert_eq!(layout.map().slot_of(DeviceId::new(1)), Some(0));
    }

    #[test]
    fn complete_layout_is_not_rewritten() {
        let store = Arc::new(MemoryStore::new());
        store
            .save_layout(&[
                SlotRecord { device: DeviceId::new(1), slot: 3 },
                SlotRecord { device: DeviceId::new(2), slot: 2 },
                SlotRecord { device: DeviceId::new(3), slot: 1 },
                SlotRecord { device: DeviceId::new(4), slot: 0 },
            ])
            .unwrap();

        let layout = layout(store.clone());
        assert_eq!(store.layout_saves(), 1);
        assert_eq!(layout.map().slot_of(DeviceId::new(4)), Some(0));
    }

    #[test]
    fn corrupt_layout_file_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::in_dir(dir.path()));
        std::fs::write(store.layout_path(), "garbage").unwrap();

        let layout =
            SlotLayout::load(store.clone(), LayoutMetrics::default(), devices(3), vec![]).unwrap();
        assert_eq!(layout.map().len(), 3);

        let saved = store.load_layout().unwrap().unwrap();
        assert_eq!(saved.len(), 3);
    }

    #[test]
    fn drag_to_other_slot_swaps_and_saves() {
        let store = Arc::new(MemoryStore::new());
        let mut layout = layout(store.clone());

        let start = layout.position_for(DeviceId::new(1)).unwrap();
        let target = layout.position_for(DeviceId::new(2)).unwrap();

        // Grab slightly off-center; the offset is kept while dragging
        let grab = Point::new(start.x + 10.0, start.y + 5.0);
        assert_eq!(layout.begin_drag(grab), Some(DeviceId::new(1)));
        assert_eq!(layout.dragging(), Some(DeviceId::new(1)));

        // Top row sits inside the margin band, so the drag is clamped down
        let moved = layout
            .update_drag(Point::new(target.x + 10.0, target.y + 5.0))
            .unwrap();
        assert_eq!(moved, Point::new(target.x, 56.0));
        assert_eq!(layout.position_for(DeviceId::new(1)), Some(moved));

        let outcome = layout.end_drag().unwrap();
        assert_eq!(
            outcome,
            DragOutcome::Swapped {
                device: DeviceId::new(1),
                other: DeviceId::new(2),
                from: 0,
                to: 1,
            }
        );
        assert_eq!(store.layout_saves(), 2);
        assert_eq!(layout.position_for(DeviceId::new(2)), Some(start));
        assert_eq!(layout.dragging(), None);
    }

    #[test]
    fn release_over_own_slot_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut layout = layout(store.clone());
        let saves = store.layout_saves();

        let start = layout.position_for(DeviceId::new(3)).unwrap();
        layout.begin_drag(start).unwrap();
        layout.update_drag(Point::new(start.x + 20.0, start.y + 20.0));

        let outcome = layout.end_drag().unwrap();
        assert_eq!(
            outcome,
            DragOutcome::Unchanged {
                device: DeviceId::new(3),
                slot: 2
            }
        );
        assert_eq!(store.layout_saves(), saves);
    }

    #[test]
    fn cancel_restores_slot_position() {
        let store = Arc::new(MemoryStore::new());
        let mut layout = layout(store.clone());

        let start = layout.position_for(DeviceId::new(1)).unwrap();
        layout.begin_drag(start).unwrap();
        layout.update_drag(Point::new(600.0, 600.0));
        assert!(layout.cancel_drag());

        assert_eq!(layout.position_for(DeviceId::new(1)), Some(start));
        assert_eq!(layout.end_drag().unwrap(), DragOutcome::Cancelled);
        assert_eq!(store.layout_saves(), 1);
    }

    #[test]
    fn press_on_empty_space_grabs_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut layout = layout(store);

        assert_eq!(layout.begin_drag(Point::new(999.0, 799.0)), None);
        assert!(layout.update_drag(Point::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn every_device_has_a_position_once_sized() {
        let store = Arc::new(MemoryStore::new());
        let mut layout =
            SlotLayout::load(store, LayoutMetrics::default(), devices(18), vec![]).unwrap();
        assert!(layout.view().slots.is_empty());

        layout.resize(surface());
        let view = layout.view();
        assert_eq!(view.slots.len(), 18);
        assert!(view.slots.iter().all(|s| s.slot < 18));
    }

    #[test]
    fn new_device_gets_lowest_free_slot() {
        let store = Arc::new(MemoryStore::new());
        let mut layout = layout(store.clone());

        assert!(layout.update_devices(devices(5)).unwrap());
        assert_eq!(layout.map().slot_of(DeviceId::new(5)), Some(4));
        assert_eq!(store.layout_saves(), 2);
        assert_eq!(layout.view().slots.len(), 5);
    }
}
