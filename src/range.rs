//! Binary-search range queries over sorted siblings.
//!
//! Every container the layouts build keeps its children sorted along one axis, with both the
//! start and the end edge non-decreasing (rows by `y`, cells by `x`, waterfall lanes by `y`).
//! That makes "which children overlap `[min, max)`" two `partition_point` calls.

use core::ops::Range;

use crate::Rect;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Axis {
    X,
    Y,
}

impl Axis {
    pub(crate) fn start(self, rect: &Rect) -> f64 {
        match self {
            Self::X => rect.x,
            Self::Y => rect.y,
        }
    }

    pub(crate) fn end(self, rect: &Rect) -> f64 {
        match self {
            Self::X => rect.max_x(),
            Self::Y => rect.max_y(),
        }
    }
}

/// Positions in `children` whose extent along `axis` overlaps `[min, max)`.
pub(crate) fn visible_range(
    children: &[usize],
    rect_of: impl Fn(usize) -> Rect,
    axis: Axis,
    min: f64,
    max: f64,
) -> Range<usize> {
    if children.is_empty() || min >= max {
        return 0..0;
    }
    let start = children.partition_point(|&c| axis.end(&rect_of(c)) <= min);
    let end = children.partition_point(|&c| axis.start(&rect_of(c)) < max);
    start..end.max(start)
}

/// Position of the child covering `offset`, clamped to the first/last child.
///
/// Offsets inside a gap resolve to the following child. Returns `None` only when `children`
/// is empty.
pub(crate) fn index_at(
    children: &[usize],
    rect_of: impl Fn(usize) -> Rect,
    axis: Axis,
    offset: f64,
) -> Option<usize> {
    if children.is_empty() {
        return None;
    }
    let i = children.partition_point(|&c| axis.end(&rect_of(c)) <= offset);
    Some(i.min(children.len() - 1))
}

/// Position of the child nearest to `offset` along `axis` (by edge distance).
pub(crate) fn nearest_index(
    children: &[usize],
    rect_of: impl Fn(usize) -> Rect,
    axis: Axis,
    offset: f64,
) -> Option<usize> {
    let i = index_at(children, &rect_of, axis, offset)?;
    if i == 0 {
        return Some(0);
    }
    let here = rect_of(children[i]);
    if axis.start(&here) <= offset {
        return Some(i);
    }
    // `offset` sits in the gap before `i`; pick whichever neighbour edge is closer.
    let prev = rect_of(children[i - 1]);
    if offset - axis.end(&prev) < axis.start(&here) - offset {
        Some(i - 1)
    } else {
        Some(i)
    }
}
