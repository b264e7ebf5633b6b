//! Headless list, grid and table layouts for virtualized collections.
//!
//! Layouts compute geometry only for the part of a (possibly nested) collection that is
//! relevant to the viewport:
//! - [`ListLayout`]: rows top to bottom, one level of sections with sticky headings.
//! - [`GridLayout`]: a uniform grid or a waterfall (masonry) of shortest-lane placement.
//! - [`TableLayout`]: a sticky header block over rows of cells, with negotiated column widths
//!   and sticky columns.
//!
//! All rects are in content coordinates. Range queries binary-search each container's
//! children and always include persisted keys (focused, selected, dragged items) and a
//! trailing loader.
//!
//! It is UI-agnostic. A TUI/GUI layer is expected to provide:
//! - a [`Collection`] snapshot (a new `Arc` whenever it changes)
//! - the viewport rect in content coordinates
//! - measured sizes for nodes laid out with estimates
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod arena;
mod cache;
mod collection;
mod columns;
mod drop;
mod emitter;
mod geometry;
mod grid;
mod key;
mod layout;
mod list;
mod options;
mod persisted;
mod range;
mod table;
mod types;
mod virtualizer;

#[cfg(test)]
mod tests;

pub use collection::{Collection, Node, SharedCollection, StaticCollection};
pub use columns::{
    ColumnConstraints, ColumnInput, ColumnWidth, ColumnWidthSolver, DEFAULT_MIN_COLUMN_WIDTH,
    FlexColumnSolver,
};
pub use geometry::{Point, Rect, Size};
pub use grid::GridLayout;
pub use key::{KeyMap, KeySet, LayoutKey};
pub use layout::Layout;
pub use list::ListLayout;
pub use options::{
    DEFAULT_ESTIMATED_HEIGHT, GridLayoutOptions, ListLayoutOptions, TableLayoutOptions,
};
pub use table::{SharedColumnSolver, TableLayout};
pub use types::{ContentId, DropPosition, DropTarget, LayoutContext, LayoutInfo, NodeType};
pub use virtualizer::Virtualizer;
