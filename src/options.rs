use alloc::sync::Arc;

use crate::key::KeyMap;
use crate::{LayoutKey, Size};

/// Fallback size for estimated rows, headings and loaders.
pub const DEFAULT_ESTIMATED_HEIGHT: f64 = 48.0;

/// Configuration for [`crate::ListLayout`] (and the row geometry of [`crate::TableLayout`]).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListLayoutOptions {
    /// Fixed row height. When `None`, rows start at `estimated_row_height` and are reconciled
    /// against measurements.
    pub row_height: Option<f64>,
    pub estimated_row_height: f64,
    /// Fixed section heading (or table column header) height.
    pub heading_height: Option<f64>,
    pub estimated_heading_height: f64,
    pub loader_height: f64,
    /// Space between consecutive siblings.
    pub gap: f64,
    /// Uniform inset around the content.
    pub padding: f64,
    pub drop_indicator_thickness: f64,
}

impl Default for ListLayoutOptions {
    fn default() -> Self {
        Self {
            row_height: None,
            estimated_row_height: DEFAULT_ESTIMATED_HEIGHT,
            heading_height: None,
            estimated_heading_height: DEFAULT_ESTIMATED_HEIGHT,
            loader_height: DEFAULT_ESTIMATED_HEIGHT,
            gap: 0.0,
            padding: 0.0,
            drop_indicator_thickness: 2.0,
        }
    }
}

impl ListLayoutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row_height(mut self, row_height: f64) -> Self {
        self.row_height = Some(row_height);
        self
    }

    pub fn with_estimated_row_height(mut self, estimated_row_height: f64) -> Self {
        self.estimated_row_height = estimated_row_height;
        self
    }

    pub fn with_heading_height(mut self, heading_height: f64) -> Self {
        self.heading_height = Some(heading_height);
        self
    }

    pub fn with_estimated_heading_height(mut self, estimated_heading_height: f64) -> Self {
        self.estimated_heading_height = estimated_heading_height;
        self
    }

    pub fn with_loader_height(mut self, loader_height: f64) -> Self {
        self.loader_height = loader_height;
        self
    }

    pub fn with_gap(mut self, gap: f64) -> Self {
        self.gap = gap;
        self
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_drop_indicator_thickness(mut self, thickness: f64) -> Self {
        self.drop_indicator_thickness = thickness;
        self
    }

    /// Row height and whether it is an estimate. A fixed height wins over any measurement.
    pub(crate) fn row_height_for(&self, measured: Option<(f64, bool)>) -> (f64, bool) {
        resolve_height(measured, self.row_height, self.estimated_row_height)
    }

    pub(crate) fn heading_height_for(&self, measured: Option<(f64, bool)>) -> (f64, bool) {
        resolve_height(measured, self.heading_height, self.estimated_heading_height)
    }

    pub(crate) fn gap(&self) -> f64 {
        self.gap.max(0.0)
    }

    pub(crate) fn padding(&self) -> f64 {
        self.padding.max(0.0)
    }
}

fn resolve_height(measured: Option<(f64, bool)>, fixed: Option<f64>, estimate: f64) -> (f64, bool) {
    match (fixed, measured) {
        (Some(h), _) => (h.max(0.0), false),
        (None, Some(m)) => m,
        (None, None) => (estimate.max(0.0), true),
    }
}

/// Configuration for [`crate::GridLayout`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridLayoutOptions {
    pub min_item_size: Size,
    /// Upper bound on the cell width; `None` lets cells grow with the viewport.
    pub max_item_width: Option<f64>,
    pub max_item_height: Option<f64>,
    /// Minimum horizontal/vertical space between items (also the outer margin).
    pub min_space: Size,
    pub max_horizontal_space: Option<f64>,
    pub max_columns: Option<usize>,
    /// Keeps the `min_item_size` aspect ratio as items grow wider.
    pub preserve_aspect_ratio: bool,
    /// Masonry placement: each item goes to the currently shortest lane.
    pub waterfall: bool,
    pub loader_height: f64,
    pub drop_indicator_thickness: f64,
}

impl Default for GridLayoutOptions {
    fn default() -> Self {
        Self {
            min_item_size: Size::new(200.0, 200.0),
            max_item_width: None,
            max_item_height: None,
            min_space: Size::new(18.0, 18.0),
            max_horizontal_space: None,
            max_columns: None,
            preserve_aspect_ratio: false,
            waterfall: false,
            loader_height: DEFAULT_ESTIMATED_HEIGHT,
            drop_indicator_thickness: 2.0,
        }
    }
}

impl GridLayoutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_item_size(mut self, size: Size) -> Self {
        self.min_item_size = size;
        self
    }

    pub fn with_max_item_size(mut self, size: Size) -> Self {
        self.max_item_width = Some(size.width);
        self.max_item_height = Some(size.height);
        self
    }

    pub fn with_min_space(mut self, space: Size) -> Self {
        self.min_space = space;
        self
    }

    pub fn with_max_horizontal_space(mut self, space: f64) -> Self {
        self.max_horizontal_space = Some(space);
        self
    }

    pub fn with_max_columns(mut self, max_columns: usize) -> Self {
        self.max_columns = Some(max_columns);
        self
    }

    pub fn with_preserve_aspect_ratio(mut self, preserve: bool) -> Self {
        self.preserve_aspect_ratio = preserve;
        self
    }

    pub fn with_waterfall(mut self, waterfall: bool) -> Self {
        self.waterfall = waterfall;
        self
    }

    pub fn with_loader_height(mut self, loader_height: f64) -> Self {
        self.loader_height = loader_height;
        self
    }

    pub fn with_drop_indicator_thickness(mut self, thickness: f64) -> Self {
        self.drop_indicator_thickness = thickness;
        self
    }
}

/// Configuration for [`crate::TableLayout`].
pub struct TableLayoutOptions<K> {
    /// Row, heading, loader, gap and padding geometry.
    pub list: ListLayoutOptions,
    /// Externally resolved widths. Columns present here bypass the width solver.
    pub column_widths: Option<Arc<KeyMap<K, f64>>>,
}

impl<K> Default for TableLayoutOptions<K> {
    fn default() -> Self {
        Self {
            list: ListLayoutOptions::default(),
            column_widths: None,
        }
    }
}

impl<K> Clone for TableLayoutOptions<K> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            column_widths: self.column_widths.clone(),
        }
    }
}

/// Width overrides compare by identity, like the collection itself.
impl<K> PartialEq for TableLayoutOptions<K> {
    fn eq(&self, other: &Self) -> bool {
        let widths_eq = match (&self.column_widths, &other.column_widths) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        widths_eq && self.list == other.list
    }
}

impl<K: LayoutKey> TableLayoutOptions<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(mut self, list: ListLayoutOptions) -> Self {
        self.list = list;
        self
    }

    pub fn with_row_height(mut self, row_height: f64) -> Self {
        self.list.row_height = Some(row_height);
        self
    }

    pub fn with_estimated_row_height(mut self, estimated_row_height: f64) -> Self {
        self.list.estimated_row_height = estimated_row_height;
        self
    }

    pub fn with_heading_height(mut self, heading_height: f64) -> Self {
        self.list.heading_height = Some(heading_height);
        self
    }

    pub fn with_gap(mut self, gap: f64) -> Self {
        self.list.gap = gap;
        self
    }

    pub fn with_column_widths(mut self, widths: Option<Arc<KeyMap<K, f64>>>) -> Self {
        self.column_widths = widths;
        self
    }
}

impl<K> core::fmt::Debug for TableLayoutOptions<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TableLayoutOptions")
            .field("list", &self.list)
            .field(
                "column_widths",
                &self.column_widths.as_ref().map(|w| w.len()),
            )
            .finish()
    }
}
