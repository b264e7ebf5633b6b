//! Column width negotiation for table layouts.

use alloc::vec::Vec;

use crate::LayoutKey;
use crate::geometry::abs_diff;
use crate::key::KeyMap;

/// Minimum width used for columns that do not declare one.
pub const DEFAULT_MIN_COLUMN_WIDTH: f64 = 75.0;

/// Declared width of a column.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColumnWidth {
    /// Fixed width in pixels.
    Static(f64),
    /// Share of the width left after static columns (`1.0` == `1fr`).
    Fraction(f64),
}

impl Default for ColumnWidth {
    fn default() -> Self {
        Self::Fraction(1.0)
    }
}

/// Declarative sizing constraints for one column.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnConstraints {
    pub width: ColumnWidth,
    pub min_width: Option<f64>,
    pub max_width: Option<f64>,
    pub allows_resizing: bool,
    /// Pinned columns stay in every row's visible cell set.
    pub sticky: bool,
}

impl ColumnConstraints {
    pub fn fixed(width: f64) -> Self {
        Self {
            width: ColumnWidth::Static(width),
            ..Self::default()
        }
    }

    pub fn fraction(fr: f64) -> Self {
        Self {
            width: ColumnWidth::Fraction(fr),
            ..Self::default()
        }
    }

    pub fn with_min_width(mut self, min_width: f64) -> Self {
        self.min_width = Some(min_width);
        self
    }

    pub fn with_max_width(mut self, max_width: f64) -> Self {
        self.max_width = Some(max_width);
        self
    }

    pub fn with_allows_resizing(mut self, allows_resizing: bool) -> Self {
        self.allows_resizing = allows_resizing;
        self
    }

    pub fn with_sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    pub fn min(&self) -> f64 {
        self.min_width.unwrap_or(DEFAULT_MIN_COLUMN_WIDTH).max(0.0)
    }

    pub fn max(&self) -> f64 {
        self.max_width.unwrap_or(f64::INFINITY).max(self.min())
    }

    pub fn clamp(&self, width: f64) -> f64 {
        width.max(self.min()).min(self.max())
    }
}

/// One column as seen by a [`ColumnWidthSolver`].
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnInput<K> {
    pub key: K,
    pub constraints: ColumnConstraints,
    /// Declared sticky or a row-header column.
    pub sticky: bool,
}

/// Resolves column constraints into pixel widths.
///
/// Implementations must return an entry for every input column, and the widths must sum to at
/// most `available_width`.
pub trait ColumnWidthSolver<K: LayoutKey> {
    fn resolve(&self, columns: &[ColumnInput<K>], available_width: f64) -> KeyMap<K, f64>;
}

/// Default solver: static widths first, fractions share the rest.
///
/// - Sticky columns resolve from their own constraints only (a fraction width falls back to
///   the column minimum), so resizing the container never moves pinned content.
/// - Fraction columns share the remaining width proportionally, freezing columns that hit
///   their min/max until the distribution is stable.
/// - If the minimums still overflow, non-sticky columns shrink first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlexColumnSolver;

impl<K: LayoutKey> ColumnWidthSolver<K> for FlexColumnSolver {
    fn resolve(&self, columns: &[ColumnInput<K>], available_width: f64) -> KeyMap<K, f64> {
        let widths = solve(columns, available_width.max(0.0));
        vtrace!(
            columns = columns.len(),
            available_width,
            "FlexColumnSolver::resolve"
        );
        columns
            .iter()
            .zip(widths)
            .map(|(c, w)| (c.key.clone(), w))
            .collect()
    }
}

fn solve<K>(columns: &[ColumnInput<K>], available: f64) -> Vec<f64> {
    let n = columns.len();
    let mut widths = alloc::vec![0.0f64; n];
    let mut flexible: Vec<usize> = Vec::new();
    let mut fixed_total = 0.0;

    for (i, c) in columns.iter().enumerate() {
        let cons = &c.constraints;
        match cons.width {
            ColumnWidth::Static(px) => {
                widths[i] = cons.clamp(px);
                fixed_total += widths[i];
            }
            ColumnWidth::Fraction(_) if c.sticky => {
                widths[i] = cons.min();
                fixed_total += widths[i];
            }
            ColumnWidth::Fraction(_) => flexible.push(i),
        }
    }

    let mut remaining = available - fixed_total;
    while !flexible.is_empty() {
        let total_fr: f64 = flexible.iter().map(|&i| fraction_of(&columns[i])).sum();
        let share = if total_fr > 0.0 {
            remaining.max(0.0) / total_fr
        } else {
            0.0
        };

        let mut violation = 0.0;
        for &i in &flexible {
            let target = fraction_of(&columns[i]) * share;
            let clamped = columns[i].constraints.clamp(target);
            widths[i] = clamped;
            violation += clamped - target;
        }

        if abs_diff(violation, 0.0) < 1e-9 {
            break;
        }
        // Freeze the columns pushed in the dominant direction and redistribute the rest.
        let before = flexible.len();
        flexible.retain(|&i| {
            let target = fraction_of(&columns[i]) * share;
            let frozen = if violation > 0.0 {
                widths[i] > target
            } else {
                widths[i] < target
            };
            if frozen {
                remaining -= widths[i];
            }
            !frozen
        });
        if flexible.len() == before {
            break;
        }
    }

    conserve(columns, &mut widths, available);
    widths
}

fn fraction_of<K>(c: &ColumnInput<K>) -> f64 {
    match c.constraints.width {
        ColumnWidth::Fraction(fr) => fr.max(0.0),
        ColumnWidth::Static(_) => 0.0,
    }
}

/// Shrinks widths so they sum to at most `available`, non-sticky columns first.
fn conserve<K>(columns: &[ColumnInput<K>], widths: &mut [f64], available: f64) {
    let total: f64 = widths.iter().sum();
    if total <= available {
        return;
    }
    let sticky_total: f64 = columns
        .iter()
        .zip(widths.iter())
        .filter(|(c, _)| c.sticky)
        .map(|(_, w)| *w)
        .sum();
    let loose_total = total - sticky_total;
    let loose_budget = (available - sticky_total).max(0.0);
    if loose_total > 0.0 {
        let factor = loose_budget / loose_total;
        for (c, w) in columns.iter().zip(widths.iter_mut()) {
            if !c.sticky {
                *w *= factor;
            }
        }
    }
    if sticky_total > available && sticky_total > 0.0 {
        let factor = available / sticky_total;
        for (c, w) in columns.iter().zip(widths.iter_mut()) {
            if c.sticky {
                *w *= factor;
            }
        }
    }
}
