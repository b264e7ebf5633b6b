use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::arena::NodeArena;
use crate::cache::LayoutCache;
use crate::drop::{indicator_rect, probe_band, resolve_row_drop};
use crate::emitter::IndexEmitter;
use crate::key::{KeyMap, KeySet};
use crate::range::{Axis, index_at, visible_range};
use crate::{
    Collection, ColumnInput, ColumnWidth, ColumnWidthSolver, DropTarget, FlexColumnSolver,
    LayoutContext, LayoutInfo, LayoutKey, Node, NodeType, Point, Rect, SharedCollection, Size,
    TableLayoutOptions,
};

/// Column solver handle a [`TableLayout`] negotiates widths with.
pub type SharedColumnSolver<K> = Arc<dyn ColumnWidthSolver<K> + Send + Sync>;

/// Resolved column index and span of a tabular node, defaulting to the running index.
fn tabular_slot<K>(node: &Node<K>, running: &mut usize) -> (usize, usize) {
    let index = node.col_index.unwrap_or(*running);
    let span = node.col_span.unwrap_or(1).max(1);
    *running = index + span;
    (index, span)
}

fn set_cell_heights<K: LayoutKey>(arena: &mut NodeArena<K>, row: usize, height: f64) {
    let cells = arena.node(row).children.clone();
    for cell in cells {
        arena.node_mut(cell).info.rect.height = height;
    }
}

/// Positions of the cells in `row` that cover a sticky column, ascending.
fn sticky_cell_positions<'a, K: LayoutKey>(
    arena: &'a NodeArena<K>,
    row: usize,
    sticky: &'a [usize],
    offsets: &'a [f64],
    x0: f64,
) -> impl Iterator<Item = usize> + 'a {
    let cells = arena.children_of(Some(row));
    sticky.iter().filter_map(move |&column| {
        let x = x0 + *offsets.get(column)?;
        let i = index_at(cells, |c| arena.rect(c), Axis::X, x)?;
        let r = arena.rect(cells[i]);
        (r.x <= x && x < r.max_x()).then_some(i)
    })
}

/// Persisted positions a row starts with: its sticky cells.
fn row_seed<K: LayoutKey>(
    arena: &NodeArena<K>,
    parent: usize,
    sticky: &[usize],
    offsets: &[f64],
    x0: f64,
) -> Vec<usize> {
    match arena.info(parent).node_type {
        NodeType::Item | NodeType::HeaderRow => {
            sticky_cell_positions(arena, parent, sticky, offsets, x0).collect()
        }
        _ => Vec::new(),
    }
}

/// Two-part table: a sticky header block of column headers and a body of rows and cells.
///
/// Column widths come from a [`ColumnWidthSolver`] (by default [`FlexColumnSolver`]) and are
/// cached until the available width, the column definitions or the width overrides change.
/// Sticky and row-header columns stay in every row's visible cell set regardless of the
/// horizontal scroll offset.
pub struct TableLayout<K: LayoutKey> {
    options: TableLayoutOptions<K>,
    cache: LayoutCache<K>,
    solver: SharedColumnSolver<K>,
    columns: Vec<ColumnInput<K>>,
    widths: KeyMap<K, f64>,
    /// Column start offsets from the table's left edge; the last entry is the table width.
    offsets: Vec<f64>,
    widths_available: Option<f64>,
    widths_dirty: bool,
    widths_generation: u64,
    built_generation: u64,
    built_padding: f64,
    user_widths: KeyMap<K, f64>,
    sticky_columns: Vec<usize>,
    header: Option<usize>,
    body: Option<usize>,
}

impl<K: LayoutKey> Default for TableLayout<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: LayoutKey> TableLayout<K> {
    pub fn new() -> Self {
        Self::with_options(TableLayoutOptions::default())
    }

    pub fn with_options(options: TableLayoutOptions<K>) -> Self {
        Self {
            options,
            cache: LayoutCache::default(),
            solver: Arc::new(FlexColumnSolver),
            columns: Vec::new(),
            widths: KeyMap::default(),
            offsets: alloc::vec![0.0],
            widths_available: None,
            widths_dirty: true,
            widths_generation: 0,
            built_generation: 0,
            built_padding: 0.0,
            user_widths: KeyMap::default(),
            sticky_columns: Vec::new(),
            header: None,
            body: None,
        }
    }

    /// Replaces the column width solver.
    pub fn with_solver(mut self, solver: SharedColumnSolver<K>) -> Self {
        self.solver = solver;
        self.widths_dirty = true;
        self
    }

    pub fn options(&self) -> &TableLayoutOptions<K> {
        &self.options
    }

    pub fn set_options(&mut self, options: TableLayoutOptions<K>) {
        if self.options != options {
            self.options = options;
            self.widths_dirty = true;
            self.cache.mark_dirty();
        }
    }

    /// Resolved pixel width per column key.
    pub fn column_widths(&self) -> &KeyMap<K, f64> {
        &self.widths
    }

    /// Indices of the columns kept in view: declared sticky or row-header columns.
    pub fn sticky_column_indices(&self) -> &[usize] {
        &self.sticky_columns
    }

    pub fn update(&mut self, collection: &SharedCollection<K>, ctx: LayoutContext) -> bool {
        let Some(reason) = self.cache.prepare(collection, &ctx) else {
            return false;
        };
        let c: &dyn Collection<K> = collection.as_ref();
        let same_collection = self.cache.is_same_collection(collection);
        self.resolve_columns(c, ctx.visible_rect.width);

        let padding = self.options.list.padding();
        let can_reuse = same_collection
            && self.widths_generation == self.built_generation
            && padding == self.built_padding;
        let previous = self.cache.begin(collection);
        let mut arena = NodeArena::default();

        let viewport = ctx.visible_rect;
        let width = self.table_width();
        let mut y = padding;
        self.header = None;
        self.body = None;
        for node in c.iter() {
            match node.node_type {
                NodeType::Header if self.header.is_none() => {
                    let idx = self.build_header(c, &mut arena, node, padding, y, width);
                    y = arena.rect(idx).max_y();
                    self.header = Some(idx);
                }
                NodeType::RowGroup if self.body.is_none() => {
                    let reuse = can_reuse.then_some(&previous);
                    let idx = self.build_body(c, &mut arena, reuse, node, y, viewport);
                    y = arena.rect(idx).max_y();
                    self.body = Some(idx);
                }
                _ => contract_violation!("TableLayout", node),
            }
        }

        self.built_generation = self.widths_generation;
        self.built_padding = padding;
        self.cache.arena = arena;
        self.rebuild_persisted();
        self.cache
            .finish("TableLayout", reason, width + 2.0 * padding, y + padding);
        true
    }

    fn table_width(&self) -> f64 {
        self.offsets.last().copied().unwrap_or(0.0)
    }

    /// Re-solves column widths when their inputs changed since the last solve.
    fn resolve_columns(&mut self, c: &dyn Collection<K>, viewport_width: f64) {
        let row_headers = c.row_header_column_keys();
        let inputs: Vec<ColumnInput<K>> = c
            .columns()
            .iter()
            .map(|key| {
                let constraints = c.column_constraints(key);
                let sticky = constraints.sticky || row_headers.contains(key);
                ColumnInput {
                    key: key.clone(),
                    constraints,
                    sticky,
                }
            })
            .collect();
        let available = (viewport_width - 2.0 * self.options.list.padding()).max(0.0);
        let inputs_changed = inputs != self.columns;
        if !inputs_changed && !self.widths_dirty && self.widths_available == Some(available) {
            return;
        }
        if inputs_changed {
            self.user_widths
                .retain(|key, _| inputs.iter().any(|c| &c.key == key));
            self.sticky_columns = inputs
                .iter()
                .enumerate()
                .filter(|(_, c)| c.sticky)
                .map(|(i, _)| i)
                .collect();
        }
        self.columns = inputs;
        self.widths_available = Some(available);
        self.widths_dirty = false;
        self.solve_widths(available);
    }

    /// Overrides are taken verbatim; every other column goes through the solver with the
    /// width the overrides leave.
    fn solve_widths(&mut self, available: f64) {
        let overrides = self.options.column_widths.as_deref();
        let mut widths = KeyMap::default();
        let mut rest = Vec::new();
        let mut used = 0.0;
        for column in &self.columns {
            if let Some(&w) = overrides.and_then(|o| o.get(&column.key)) {
                let w = w.max(0.0);
                widths.insert(column.key.clone(), w);
                used += w;
                continue;
            }
            let mut column = column.clone();
            if let Some(&w) = self.user_widths.get(&column.key) {
                column.constraints.width = ColumnWidth::Static(w);
            }
            rest.push(column);
        }
        widths.extend(self.solver.resolve(&rest, (available - used).max(0.0)));

        let mut offsets = Vec::with_capacity(self.columns.len() + 1);
        let mut x = 0.0;
        offsets.push(x);
        for column in &self.columns {
            x += widths.get(&column.key).copied().unwrap_or(0.0);
            offsets.push(x);
        }
        vtrace!(
            columns = self.columns.len(),
            available,
            table_width = x,
            "column widths solved"
        );
        self.offsets = offsets;
        self.widths = widths;
        self.widths_generation += 1;
    }

    /// Left offset and width covered by `span` columns starting at `index`.
    fn column_span(&self, index: usize, span: usize) -> (f64, f64) {
        let n = self.columns.len();
        let start = self.offsets[index.min(n)];
        let end = self.offsets[(index + span).min(n)];
        (start, end - start)
    }

    fn covers_sticky(&self, index: usize, span: usize) -> bool {
        self.sticky_columns
            .iter()
            .any(|&c| c >= index && c < index + span)
    }

    fn build_header(
        &self,
        c: &dyn Collection<K>,
        arena: &mut NodeArena<K>,
        node: &Node<K>,
        x0: f64,
        y: f64,
        width: f64,
    ) -> usize {
        let mut info =
            LayoutInfo::new(NodeType::Header, node.key.clone(), Rect::new(x0, y, width, 0.0));
        info.is_sticky = true;
        info.z_index = 1;
        info.content = node.content;
        let idx = arena.push(None, info);

        let mut row_y = y;
        for row in c.children(&node.key) {
            if row.node_type != NodeType::HeaderRow {
                contract_violation!("TableLayout", row);
            }
            let rect = Rect::new(x0, row_y, width, 0.0);
            let mut info = LayoutInfo::new(NodeType::HeaderRow, row.key.clone(), rect);
            info.content = row.content;
            let row_idx = arena.push(Some(idx), info);

            let mut height = 0.0f64;
            let mut running = 0;
            for column in c.children(&row.key) {
                if column.node_type != NodeType::Column {
                    contract_violation!("TableLayout", column);
                }
                let (index, span) = tabular_slot(column, &mut running);
                let (cx, cw) = self.column_span(index, span);
                let (h, estimated) = self
                    .options
                    .list
                    .heading_height_for(self.cache.measured(&column.key, cw));
                let mut info = LayoutInfo::new(
                    NodeType::Column,
                    column.key.clone(),
                    Rect::new(x0 + cx, row_y, cw, h),
                );
                info.estimated_size = estimated;
                info.is_sticky = self.covers_sticky(index, span);
                info.z_index = i32::from(info.is_sticky);
                info.content = column.content;
                arena.push(Some(row_idx), info);
                height = height.max(h);
            }
            set_cell_heights(arena, row_idx, height);
            arena.node_mut(row_idx).info.rect.height = height;
            row_y += height;
        }
        arena.node_mut(idx).info.rect.height = row_y - y;
        idx
    }

    fn build_body(
        &self,
        c: &dyn Collection<K>,
        arena: &mut NodeArena<K>,
        previous: Option<&NodeArena<K>>,
        node: &Node<K>,
        y: f64,
        viewport: Rect,
    ) -> usize {
        let x0 = self.options.list.padding();
        let width = self.table_width();
        let gap = self.options.list.gap();
        let mut info =
            LayoutInfo::new(NodeType::RowGroup, node.key.clone(), Rect::new(x0, y, width, 0.0));
        info.content = node.content;
        let body = arena.push(None, info);

        let children = c.child_keys(&node.key);
        let mut row_y = y;
        let mut placed = false;
        for child in c.children(&node.key) {
            if placed {
                row_y += gap;
            }
            match child.node_type {
                NodeType::Item => {
                    row_y += self.build_row(c, arena, previous, body, child, row_y, viewport);
                }
                NodeType::Loader => {
                    let loader_height = self.options.list.loader_height.max(0.0);
                    let height = if children.len() == 1 {
                        (viewport.height - row_y - x0).max(loader_height)
                    } else {
                        loader_height
                    };
                    let mut info = LayoutInfo::new(
                        NodeType::Loader,
                        child.key.clone(),
                        Rect::new(x0, row_y, width, height),
                    );
                    info.content = child.content;
                    arena.push(Some(body), info);
                    row_y += height;
                }
                _ => contract_violation!("TableLayout", child),
            }
            placed = true;
        }

        // An empty body stretches to the bottom of the viewport.
        let height = if placed {
            row_y - y
        } else {
            (viewport.height - y - x0).max(0.0)
        };
        arena.node_mut(body).info.rect.height = height;
        body
    }

    /// Builds one body row and returns its height.
    ///
    /// Once a cell starts right of the viewport, the rest of the row is copied from the
    /// previous pass when that pass laid the same row out with the same columns.
    fn build_row(
        &self,
        c: &dyn Collection<K>,
        arena: &mut NodeArena<K>,
        previous: Option<&NodeArena<K>>,
        body: usize,
        row: &Node<K>,
        y: f64,
        viewport: Rect,
    ) -> f64 {
        let x0 = self.options.list.padding();
        let width = self.table_width();
        let mut info =
            LayoutInfo::new(NodeType::Item, row.key.clone(), Rect::new(x0, y, width, 0.0));
        info.content = row.content;
        let row_idx = arena.push(Some(body), info);

        let previous_row = previous.and_then(|prev| {
            let idx = prev.index_of(&row.key)?;
            (prev.info(idx).node_type == NodeType::Item)
                .then(|| (prev, prev.node(idx).children.as_slice()))
        });

        let mut natural = 0.0f64;
        let mut any_estimated = false;
        let mut running = 0;
        let mut cells = 0usize;
        for cell in c.children(&row.key) {
            if cell.node_type != NodeType::Cell {
                contract_violation!("TableLayout", cell);
            }
            let (index, span) = tabular_slot(cell, &mut running);
            let (cx, cw) = self.column_span(index, span);
            if x0 + cx > viewport.max_x() {
                let tail = previous_row.and_then(|(prev, children)| {
                    let tail = children.get(cells..)?;
                    let first = prev.info(*tail.first()?);
                    (first.key == cell.key && first.rect.x == x0 + cx).then_some((prev, tail))
                });
                if let Some((prev, tail)) = tail {
                    for &old in tail {
                        let info = prev.info(old).clone();
                        let (h, estimated) = self.push_cell(arena, row_idx, y, info);
                        natural = natural.max(h);
                        any_estimated |= estimated;
                    }
                    cells += tail.len();
                    break;
                }
            }
            let mut info =
                LayoutInfo::new(NodeType::Cell, cell.key.clone(), Rect::new(x0 + cx, y, cw, 0.0));
            info.is_sticky = self.covers_sticky(index, span);
            info.z_index = i32::from(info.is_sticky);
            info.content = cell.content;
            let (h, estimated) = self.push_cell(arena, row_idx, y, info);
            natural = natural.max(h);
            any_estimated |= estimated;
            cells += 1;
        }

        let (height, estimated) = self.row_height(&row.key, width, cells, natural, any_estimated);
        set_cell_heights(arena, row_idx, height);
        let info = &mut arena.node_mut(row_idx).info;
        info.rect.height = height;
        info.estimated_size = estimated;
        height
    }

    /// Stamps the cell's own height at `y` and adds it under `row_idx`.
    fn push_cell(
        &self,
        arena: &mut NodeArena<K>,
        row_idx: usize,
        y: f64,
        mut info: LayoutInfo<K>,
    ) -> (f64, bool) {
        let (h, estimated) = self
            .options
            .list
            .row_height_for(self.cache.measured(&info.key, info.rect.width));
        info.rect.y = y;
        info.rect.height = h;
        info.estimated_size = estimated;
        arena.push(Some(row_idx), info);
        (h, estimated)
    }

    /// A fixed row height wins, then a row measurement, then the tallest cell.
    fn row_height(
        &self,
        key: &K,
        width: f64,
        cells: usize,
        natural: f64,
        any_estimated: bool,
    ) -> (f64, bool) {
        let list = &self.options.list;
        match (list.row_height, self.cache.measured(key, width)) {
            (Some(h), _) => (h.max(0.0), false),
            (None, Some(m)) => m,
            (None, None) if cells == 0 => list.row_height_for(None),
            (None, None) => (natural, any_estimated),
        }
    }

    fn rebuild_persisted(&mut self) {
        let (sticky, offsets, x0) = (&self.sticky_columns, &self.offsets, self.built_padding);
        let arena = &self.cache.arena;
        let seed = |parent: usize| row_seed(arena, parent, sticky, offsets, x0);
        self.cache.persisted.rebuild(arena, &seed);
    }

    pub fn set_persisted_keys(&mut self, keys: Option<Arc<KeySet<K>>>) {
        let (sticky, offsets, x0) = (&self.sticky_columns, &self.offsets, self.built_padding);
        let arena = &self.cache.arena;
        let seed = |parent: usize| row_seed(arena, parent, sticky, offsets, x0);
        self.cache.persisted.set_keys(keys, arena, &seed);
    }

    /// Calls `f` for the header block, every row overlapping `rect` vertically and, per row,
    /// the cells overlapping it horizontally plus sticky and persisted cells.
    pub fn for_each_visible_layout_info(&self, rect: Rect, mut f: impl FnMut(&LayoutInfo<K>)) {
        let arena = &self.cache.arena;
        for &root in arena.roots() {
            let info = arena.info(root);
            f(info);
            if Some(root) == self.header {
                for &row in &arena.node(root).children {
                    f(arena.info(row));
                    self.visit_cells(row, &rect, &mut f);
                }
            } else {
                self.visit_rows(root, &rect, &mut f);
            }
        }
    }

    fn visit_rows(&self, body: usize, rect: &Rect, f: &mut dyn FnMut(&LayoutInfo<K>)) {
        let arena = &self.cache.arena;
        let rows = arena.children_of(Some(body));
        let Some(&last_idx) = rows.last() else {
            return;
        };
        let range = visible_range(rows, |r| arena.rect(r), Axis::Y, rect.y, rect.max_y());
        let persisted = self.cache.persisted.positions(Some(body)).unwrap_or(&[]);
        let last = rows.len() - 1;
        let loader = (arena.info(last_idx).node_type == NodeType::Loader).then_some(last);

        let mut emit = |pos: usize| {
            let idx = rows[pos];
            f(arena.info(idx));
            self.visit_cells(idx, rect, &mut *f);
        };
        IndexEmitter::new(rows.len(), &mut emit)
            .emit_merged(range, persisted.iter().copied().chain(loader));
    }

    fn visit_cells(&self, row: usize, rect: &Rect, f: &mut dyn FnMut(&LayoutInfo<K>)) {
        let arena = &self.cache.arena;
        let cells = arena.children_of(Some(row));
        if cells.is_empty() {
            return;
        }
        let range = visible_range(cells, |c| arena.rect(c), Axis::X, rect.x, rect.max_x());
        let mut emit = |pos: usize| f(arena.info(cells[pos]));
        let mut emitter = IndexEmitter::new(cells.len(), &mut emit);
        // Persisted entries for a row already include its sticky cells.
        match self.cache.persisted.positions(Some(row)) {
            Some(positions) => emitter.emit_merged(range, positions.iter().copied()),
            None => emitter.emit_merged(
                range,
                sticky_cell_positions(
                    arena,
                    row,
                    &self.sticky_columns,
                    &self.offsets,
                    self.built_padding,
                ),
            ),
        }
    }

    pub fn collect_visible_layout_infos(&self, rect: Rect, out: &mut Vec<LayoutInfo<K>>) {
        out.clear();
        self.for_each_visible_layout_info(rect, |info| out.push(info.clone()));
    }

    pub fn visible_layout_infos(&self, rect: Rect) -> Vec<LayoutInfo<K>> {
        let mut out = Vec::new();
        self.collect_visible_layout_infos(rect, &mut out);
        out
    }

    pub fn layout_info(&self, key: &K) -> Option<&LayoutInfo<K>> {
        self.cache.arena.info_for(key)
    }

    pub fn content_size(&self) -> Size {
        self.cache.content_size()
    }

    /// Reconciles a measured row, cell or column header.
    ///
    /// The enclosing row takes the height of a row measurement, or of its tallest cell, and
    /// all of its cells are re-stamped to it. Rows below shift by the delta without touching
    /// column geometry.
    pub fn update_item_size(&mut self, key: &K, size: Size) -> bool {
        let Some(idx) = self.cache.arena.index_of(key) else {
            return false;
        };
        let node = self.cache.arena.node(idx);
        let info = &node.info;
        let row_idx = match info.node_type {
            NodeType::Item => idx,
            NodeType::Cell | NodeType::Column => match node.parent {
                Some(p) => p,
                None => return false,
            },
            _ => return false,
        };
        if !info.estimated_size && !self.cache.has_measurement(key) {
            return false;
        }
        let height = size.height.max(0.0);
        let width = info.rect.width;
        let was_estimated = info.estimated_size;
        self.cache.record_measurement(key, height, width);
        self.cache.arena.node_mut(idx).info.estimated_size = false;

        let (row_height, row_estimated) = self.current_row_height(row_idx);
        set_cell_heights(&mut self.cache.arena, row_idx, row_height);
        self.cache.arena.node_mut(row_idx).info.estimated_size = row_estimated;
        let delta = self.cache.arena.resize_height(row_idx, row_height);
        self.cache.grow_content(delta);
        delta != 0.0 || was_estimated
    }

    /// Height a row should have given the current measurements.
    fn current_row_height(&self, row_idx: usize) -> (f64, bool) {
        let arena = &self.cache.arena;
        let row = arena.node(row_idx);
        let list = &self.options.list;
        let mut natural = 0.0f64;
        let mut any_estimated = false;
        for &cell in &row.children {
            let info = arena.info(cell);
            let measured = self.cache.measured(&info.key, info.rect.width);
            let (h, estimated) = if info.node_type == NodeType::Column {
                list.heading_height_for(measured)
            } else {
                list.row_height_for(measured)
            };
            natural = natural.max(h);
            any_estimated |= estimated;
        }
        if row.info.node_type == NodeType::HeaderRow {
            return (natural, any_estimated);
        }
        self.row_height(
            &row.info.key,
            row.info.rect.width,
            row.children.len(),
            natural,
            any_estimated,
        )
    }

    /// Resizes a column the user dragged.
    ///
    /// Columns left of `key` keep their current widths, `key` takes `width` (clamped to its
    /// constraints) and the columns right of it share what is left. Returns the new width map,
    /// or `None` if the column is unknown or not resizable. The next update rebuilds.
    pub fn resize_column(&mut self, key: &K, width: f64) -> Option<KeyMap<K, f64>> {
        let target = self.columns.iter().position(|c| &c.key == key)?;
        let constraints = &self.columns[target].constraints;
        if !constraints.allows_resizing {
            return None;
        }
        let width = constraints.clamp(width);
        for column in &self.columns[..target] {
            if let Some(&w) = self.widths.get(&column.key) {
                self.user_widths.insert(column.key.clone(), w);
            }
        }
        self.user_widths.insert(key.clone(), width);
        vtrace!(key = ?key, width, "column resized");
        self.solve_widths(self.widths_available.unwrap_or(0.0));
        self.cache.mark_dirty();
        Some(self.widths.clone())
    }

    /// Neighbouring cell in the same row.
    pub fn key_right_of(&self, key: &K) -> Option<K> {
        self.neighbour_cell(key, true)
    }

    pub fn key_left_of(&self, key: &K) -> Option<K> {
        self.neighbour_cell(key, false)
    }

    fn neighbour_cell(&self, key: &K, right: bool) -> Option<K> {
        let arena = &self.cache.arena;
        let node = arena.node(arena.index_of(key)?);
        if !matches!(node.info.node_type, NodeType::Cell | NodeType::Column) {
            return None;
        }
        let siblings = arena.children_of(node.parent);
        let target = if right {
            node.position + 1
        } else {
            node.position.checked_sub(1)?
        };
        siblings.get(target).map(|&i| arena.info(i).key.clone())
    }

    /// Row keys between `from` and `to` (inclusive) in document order.
    pub fn key_range(&self, from: &K, to: &K) -> Vec<K> {
        self.cache
            .arena
            .keys_between(from, to, |info| info.node_type == NodeType::Item)
    }

    /// Resolves a viewport-relative point into a drop before, after or on the nearest row.
    pub fn drop_target_from_point(
        &self,
        x: f64,
        y: f64,
        mut is_valid: impl FnMut(&DropTarget<K>) -> bool,
    ) -> DropTarget<K> {
        let Some(body) = self.body else {
            return DropTarget::Root;
        };
        let arena = &self.cache.arena;
        let vr = self.cache.visible_rect();
        let point = Point::new(x + vr.x, y + vr.y);
        let band = probe_band(point.y, self.options.list.gap(), self.content_size().width);
        let rows = arena.children_of(Some(body));
        let range = visible_range(rows, |r| arena.rect(r), Axis::Y, band.y, band.max_y());
        let candidates = rows[range]
            .iter()
            .map(|&r| arena.info(r))
            .filter(|info| info.node_type == NodeType::Item);
        resolve_row_drop(candidates, point, &mut is_valid)
    }

    pub fn drop_indicator_rect(&self, target: &DropTarget<K>) -> Option<Rect> {
        let DropTarget::Item { key, drop_position } = target else {
            return None;
        };
        let info = self.layout_info(key)?;
        Some(indicator_rect(
            &info.rect,
            *drop_position,
            self.options.list.drop_indicator_thickness,
            false,
        ))
    }
}
