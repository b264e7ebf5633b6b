//! Pointer position to drop target resolution shared by the row-based layouts.

use crate::{DropPosition, DropTarget, LayoutInfo, LayoutKey, Point, Rect};

/// Distance from a row edge within which `before`/`after` win over `on`.
pub(crate) const EDGE_BAND: f64 = 10.0;

/// Thin horizontal band around `y` used to collect row candidates.
pub(crate) fn probe_band(y: f64, gap: f64, width: f64) -> Rect {
    let half = gap.max(0.5);
    Rect::new(0.0, y - half, width.max(1.0), half * 2.0)
}

/// Picks the row whose vertical center is closest to `point` and classifies the drop.
pub(crate) fn resolve_row_drop<'a, K: LayoutKey>(
    rows: impl IntoIterator<Item = &'a LayoutInfo<K>>,
    point: Point,
    is_valid: &mut dyn FnMut(&DropTarget<K>) -> bool,
) -> DropTarget<K> {
    let mut best: Option<&LayoutInfo<K>> = None;
    let mut best_dist = f64::INFINITY;
    for row in rows {
        let dist = crate::geometry::abs_diff(row.rect.center_y(), point.y);
        if dist < best_dist {
            best = Some(row);
            best_dist = dist;
        }
    }
    let Some(row) = best else {
        return DropTarget::Root;
    };
    classify_vertical(&row.key, &row.rect, point.y, is_valid)
}

fn classify_vertical<K: LayoutKey>(
    key: &K,
    rect: &Rect,
    y: f64,
    is_valid: &mut dyn FnMut(&DropTarget<K>) -> bool,
) -> DropTarget<K> {
    let on = DropTarget::item(key.clone(), DropPosition::On);
    let before = DropTarget::item(key.clone(), DropPosition::Before);
    let after = DropTarget::item(key.clone(), DropPosition::After);

    if is_valid(&on) {
        if y <= rect.y + EDGE_BAND && is_valid(&before) {
            return before;
        }
        if y >= rect.max_y() - EDGE_BAND && is_valid(&after) {
            return after;
        }
        return on;
    }

    let (first, second) = if y <= rect.center_y() {
        (before, after)
    } else {
        (after, before)
    };
    pick(first, second, is_valid)
}

/// Classifies a drop onto a grid cell: `on` when accepted, else by the horizontal midpoint.
pub(crate) fn classify_horizontal<K: LayoutKey>(
    key: &K,
    rect: &Rect,
    x: f64,
    is_valid: &mut dyn FnMut(&DropTarget<K>) -> bool,
) -> DropTarget<K> {
    let on = DropTarget::item(key.clone(), DropPosition::On);
    if is_valid(&on) {
        return on;
    }
    let before = DropTarget::item(key.clone(), DropPosition::Before);
    let after = DropTarget::item(key.clone(), DropPosition::After);
    let (first, second) = if x < rect.center_x() {
        (before, after)
    } else {
        (after, before)
    };
    pick(first, second, is_valid)
}

fn pick<K>(
    first: DropTarget<K>,
    second: DropTarget<K>,
    is_valid: &mut dyn FnMut(&DropTarget<K>) -> bool,
) -> DropTarget<K> {
    if is_valid(&first) {
        first
    } else if is_valid(&second) {
        second
    } else {
        DropTarget::Root
    }
}

/// Rect reserved for the indicator of a drop relative to `rect`.
///
/// Rows draw a horizontal line across their top or bottom edge; grid cells draw a vertical
/// line on their left or right edge. Dropping `on` highlights the whole node.
pub(crate) fn indicator_rect(
    rect: &Rect,
    position: DropPosition,
    thickness: f64,
    horizontal_flow: bool,
) -> Rect {
    let t = thickness.max(0.0);
    match (position, horizontal_flow) {
        (DropPosition::On, _) => *rect,
        (DropPosition::Before, false) => Rect::new(rect.x, rect.y - t / 2.0, rect.width, t),
        (DropPosition::After, false) => Rect::new(rect.x, rect.max_y() - t / 2.0, rect.width, t),
        (DropPosition::Before, true) => Rect::new(rect.x - t / 2.0, rect.y, t, rect.height),
        (DropPosition::After, true) => Rect::new(rect.max_x() - t / 2.0, rect.y, t, rect.height),
    }
}
