//! Room layout geometry

use lounge_config::LayoutMetrics;

/// Devices per row in the primary region, top to bottom
pub const PRIMARY_ROWS: [usize; 5] = [3, 3, 3, 3, 4];

/// Rows (in units of row spacing) of the side column slots
pub const SECONDARY_ROWS: [f32; 2] = [1.0, 3.0];

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Center point of each slot for a surface of `size`.
///
/// Primary slots fill rows of `PRIMARY_ROWS`, each row centered in the
/// primary region. Up to two more slots go to the side column; anything
/// beyond that falls back to the top-left origin. An empty surface has no
/// slots.
pub fn slot_positions(count: usize, size: Size, metrics: &LayoutMetrics) -> Vec<Point> {
    let mut positions = Vec::with_capacity(count);
    if size.is_empty() {
        return positions;
    }

    let primary_width = size.width * metrics.primary_width_ratio;
    let left = metrics.margin;
    let top = metrics.margin;

    'rows: for (row, &cols) in PRIMARY_ROWS.iter().enumerate() {
        let y = top + row as f32 * metrics.spacing_y;
        let row_width = (cols - 1) as f32 * metrics.spacing_x;
        let start_x = left + (primary_width - row_width) / 2.0;
        for col in 0..cols {
            if positions.len() == count {
                break 'rows;
            }
            positions.push(Point::new(start_x + col as f32 * metrics.spacing_x, y));
        }
    }

    let side_x = primary_width + 2.0 * metrics.margin;
    for row in SECONDARY_ROWS {
        if positions.len() == count {
            break;
        }
        positions.push(Point::new(side_x, top + row * metrics.spacing_y));
    }

    positions.resize(count, Point::new(left, top));
    positions
}

/// Index of the slot closest to `point`; the first one wins a tie
pub fn nearest_slot(positions: &[Point], point: Point) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &slot) in positions.iter().enumerate() {
        let dist = slot.distance_squared(point);
        if best.is_none_or(|(_, best_dist)| dist < best_dist) {
            best = Some((i, dist));
        }
    }
    best.map(|(i, _)| i)
}

/// Keep a dragged icon center inside the surface margins
pub fn clamp_to_surface(point: Point, size: Size, metrics: &LayoutMetrics) -> Point {
    let half = metrics.icon_size / 2.0;
    let min = metrics.margin + half;
    let max_x = (size.width - metrics.margin - half).max(min);
    let max_y = (size.height - metrics.margin - half).max(min);
    Point::new(point.x.clamp(min, max_x), point.y.clamp(min, max_y))
}

/// Whether `point` lies on the icon square centered at `center`
pub fn hits_icon(center: Point, point: Point, icon_size: f32) -> bool {
    let half = icon_size / 2.0;
    (point.x - center.x).abs() <= half && (point.y - center.y).abs() <= half
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> LayoutMetrics {
        LayoutMetrics::default()
    }

    #[test]
    fn reference_room_positions() {
        let positions = slot_positions(18, Size::new(1000.0, 800.0), &metrics());
        assert_eq!(positions.len(), 18);

        // Row 0: three slots centered in the 850-wide primary region
        assert_eq!(positions[0], Point::new(24.0 + (850.0 - 240.0) / 2.0, 24.0));
        assert_eq!(positions[2].x - positions[0].x, 240.0);

        // Row 4: four slots
        assert_eq!(positions[12].y, 24.0 + 4.0 * 150.0);
        assert_eq!(positions[12].x, 24.0 + (850.0 - 360.0) / 2.0);
        assert_eq!(positions[15].y, positions[12].y);

        // Side column
        assert_eq!(positions[16], Point::new(850.0 + 48.0, 24.0 + 150.0));
        assert_eq!(positions[17], Point::new(850.0 + 48.0, 24.0 + 450.0));
    }

    #[test]
    fn extra_slots_fall_back_to_origin() {
        let positions = slot_positions(20, Size::new(1000.0, 800.0), &metrics());
        assert_eq!(positions.len(), 20);
        assert_eq!(positions[18], Point::new(24.0, 24.0));
        assert_eq!(positions[19], Point::new(24.0, 24.0));
    }

    #[test]
    fn small_room_uses_first_rows_only() {
        let positions = slot_positions(4, Size::new(1000.0, 800.0), &metrics());
        assert_eq!(positions.len(), 4);
        assert_eq!(positions[3].y, 24.0 + 150.0);
    }

    #[test]
    fn empty_surface_has_no_slots() {
        assert!(slot_positions(18, Size::default(), &metrics()).is_empty());
    }

    #[test]
    fn nearest_slot_by_distance() {
        let positions = [Point::new(0.0, 0.0), Point::new(100.0, 0.0), Point::new(0.0, 100.0)];
        assert_eq!(nearest_slot(&positions, Point::new(70.0, 10.0)), Some(1));
        assert_eq!(nearest_slot(&positions, Point::new(10.0, 60.0)), Some(2));
        assert_eq!(nearest_slot(&positions, Point::new(50.0, 0.0)), Some(0));
        assert_eq!(nearest_slot(&[], Point::new(0.0, 0.0)), None);
    }

    #[test]
    fn clamp_keeps_icon_inside_margins() {
        let size = Size::new(1000.0, 800.0);
        let clamped = clamp_to_surface(Point::new(-50.0, 5000.0), size, &metrics());
        assert_eq!(clamped, Point::new(56.0, 800.0 - 56.0));

        let inside = Point::new(300.0, 300.0);
        assert_eq!(clamp_to_surface(inside, size, &metrics()), inside);
    }

    #[test]
    fn icon_hit_test() {
        let center = Point::new(100.0, 100.0);
        assert!(hits_icon(center, Point::new(132.0, 68.0), 64.0));
        assert!(!hits_icon(center, Point::new(133.0, 100.0), 64.0));
    }
}
