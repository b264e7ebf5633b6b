use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::cache::LayoutCache;
use crate::drop::{classify_horizontal, indicator_rect};
use crate::emitter::IndexEmitter;
use crate::geometry::floor;
use crate::key::KeySet;
use crate::range::{Axis, nearest_index, visible_range};
use crate::{
    Collection, DropTarget, GridLayoutOptions, LayoutContext, LayoutInfo, LayoutKey, NodeType,
    Point, Rect, SharedCollection, Size,
};

/// Column count and cell size derived from the options and the available width.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct GridMetrics {
    pub(crate) columns: usize,
    pub(crate) item_width: f64,
    pub(crate) item_height: f64,
    /// Horizontal space between columns and at both outer edges.
    pub(crate) spacing: f64,
    pub(crate) content_width: f64,
}

impl GridMetrics {
    pub(crate) fn compute(options: &GridLayoutOptions, available_width: f64) -> Self {
        let width = available_width.max(0.0);
        let min_w = options.min_item_size.width.max(0.0);
        let min_h = options.min_item_size.height.max(0.0);
        let space = options.min_space.width.max(0.0);
        let cap = options.max_columns.unwrap_or(usize::MAX).max(1);

        let denom = min_w + space;
        let mut columns = if denom > 0.0 {
            let fit = floor(width / denom);
            if fit < 1.0 {
                1
            } else if fit >= cap as f64 {
                cap
            } else {
                fit as usize
            }
        } else {
            1
        };
        // The outer margin is one more gutter than the columns account for.
        if columns > 1 && columns as f64 * denom + space > width {
            columns -= 1;
        }

        let n = columns as f64;
        let raw = floor((width - space * (n + 1.0)) / n).max(0.0);
        let max_w = options
            .max_item_width
            .map_or(raw.max(min_w), |w| w.max(min_w));
        let item_width = raw.min(max_w).max(min_w);
        let item_height = if options.preserve_aspect_ratio && min_w > 0.0 {
            floor(min_h * item_width / min_w)
        } else {
            let max_h = match options.max_item_height {
                Some(h) => h.max(min_h),
                None if min_w > 0.0 => floor(min_h / min_w * max_w),
                None => min_h,
            };
            let t = (item_width - min_w) / (max_w - min_w).max(1.0);
            min_h + floor((max_h - min_h) * t)
        };

        let free = floor((width - n * item_width) / (n + 1.0));
        let max_space = options
            .max_horizontal_space
            .map_or(f64::INFINITY, |s| s.max(space));
        let spacing = free.min(max_space).max(space);
        let content_width = (n * item_width + (n + 1.0) * spacing).max(width);

        Self {
            columns,
            item_width,
            item_height,
            spacing,
            content_width,
        }
    }

    fn lane_x(&self, lane: usize) -> f64 {
        self.spacing + lane as f64 * (self.item_width + self.spacing)
    }
}

/// One row of a uniform grid: root positions `start..end`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct RowBand {
    y: f64,
    height: f64,
    start: usize,
    end: usize,
}

/// Cell placement state: rows for the uniform grid, lanes for the waterfall.
#[derive(Clone, Debug, Default)]
struct Placement {
    metrics: GridMetrics,
    row_gap: f64,
    waterfall: bool,
    rows: Vec<RowBand>,
    /// Root positions per lane, top to bottom.
    lanes: Vec<Vec<usize>>,
    lane_of: Vec<usize>,
    lane_bottoms: Vec<f64>,
    cells: usize,
}

impl Placement {
    fn new(metrics: GridMetrics, row_gap: f64, waterfall: bool) -> Self {
        Self {
            metrics,
            row_gap,
            waterfall,
            rows: Vec::new(),
            lanes: vec![Vec::new(); metrics.columns],
            lane_of: Vec::new(),
            lane_bottoms: vec![row_gap; metrics.columns],
            cells: 0,
        }
    }

    fn shortest_lane(&self) -> usize {
        let mut best = 0;
        for (lane, &bottom) in self.lane_bottoms.iter().enumerate() {
            if bottom < self.lane_bottoms[best] {
                best = lane;
            }
        }
        best
    }

    /// Where the next cell would start.
    fn next_y(&self) -> f64 {
        if self.waterfall {
            return self.lane_bottoms[self.shortest_lane()];
        }
        match self.rows.last() {
            Some(row) if row.end - row.start < self.metrics.columns => row.y,
            Some(row) => row.y + row.height + self.row_gap,
            None => self.row_gap,
        }
    }

    /// Bottom of the placed cells, including the trailing vertical space.
    fn bottom(&self) -> f64 {
        if self.waterfall {
            return self
                .lane_bottoms
                .iter()
                .copied()
                .fold(self.row_gap, f64::max);
        }
        self.rows
            .last()
            .map_or(self.row_gap, |r| r.y + r.height + self.row_gap)
    }

    /// Places the cell at root position `pos` and returns its rect.
    fn place(&mut self, pos: usize, height: f64) -> Rect {
        let m = self.metrics;
        if self.waterfall {
            let lane = self.shortest_lane();
            let y = self.lane_bottoms[lane];
            self.lane_bottoms[lane] = y + height + self.row_gap;
            self.lanes[lane].push(pos);
            self.lane_of.push(lane);
            self.cells += 1;
            return Rect::new(m.lane_x(lane), y, m.item_width, height);
        }

        let col = self.cells % m.columns;
        if col == 0 || self.rows.is_empty() {
            let y = self.next_y();
            self.rows.push(RowBand {
                y,
                height: 0.0,
                start: pos,
                end: pos,
            });
        }
        let last = self.rows.len() - 1;
        let row = &mut self.rows[last];
        row.end = pos + 1;
        row.height = row.height.max(height);
        let y = row.y;
        self.lanes[col].push(pos);
        self.lane_of.push(col);
        self.cells += 1;
        Rect::new(m.lane_x(col), y, m.item_width, height)
    }

    /// Forgets every cell from `from` on, keeping the lane bottoms of the cells before it.
    fn truncate(&mut self, from: usize, rect_of: impl Fn(usize) -> Rect) {
        self.lane_of.truncate(from);
        for lane in &mut self.lanes {
            lane.retain(|&p| p < from);
        }
        for (lane, bottom) in self.lane_bottoms.iter_mut().enumerate() {
            *bottom = self.lanes[lane]
                .last()
                .map_or(self.row_gap, |&p| rect_of(p).max_y() + self.row_gap);
        }
        self.cells = from;
    }
}

/// Items arranged into as many columns as fit the viewport width.
///
/// The uniform grid fills rows left to right with equally sized cells. In waterfall mode
/// each item goes to the lane that is currently shortest (lowest lane on ties), and item
/// heights start as estimates reconciled through [`GridLayout::update_item_size`].
pub struct GridLayout<K: LayoutKey> {
    options: GridLayoutOptions,
    cache: LayoutCache<K>,
    placement: Placement,
    loader: Option<usize>,
}

impl<K: LayoutKey> Default for GridLayout<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: LayoutKey> GridLayout<K> {
    pub fn new() -> Self {
        Self::with_options(GridLayoutOptions::default())
    }

    pub fn with_options(options: GridLayoutOptions) -> Self {
        Self {
            options,
            cache: LayoutCache::default(),
            placement: Placement::default(),
            loader: None,
        }
    }

    pub fn options(&self) -> &GridLayoutOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: GridLayoutOptions) {
        if self.options != options {
            self.options = options;
            self.cache.mark_dirty();
        }
    }

    /// Number of columns of the last pass.
    pub fn columns(&self) -> usize {
        self.placement.metrics.columns
    }

    /// Cell width of the last pass.
    pub fn item_width(&self) -> f64 {
        self.placement.metrics.item_width
    }

    pub fn update(&mut self, collection: &SharedCollection<K>, ctx: LayoutContext) -> bool {
        let Some(reason) = self.cache.prepare(collection, &ctx) else {
            return false;
        };
        let mut arena = self.cache.begin(collection);
        arena.clear();

        let viewport = ctx.visible_rect;
        let metrics = GridMetrics::compute(&self.options, viewport.width);
        let mut placement = Placement::new(
            metrics,
            self.options.min_space.height.max(0.0),
            self.options.waterfall,
        );
        self.loader = None;

        let c: &dyn Collection<K> = collection.as_ref();
        let count = c.root_keys().len();
        let mut bottom = placement.bottom();
        for (i, node) in c.iter().enumerate() {
            match node.node_type {
                NodeType::Item | NodeType::Placeholder => {
                    let (height, estimated) = self.cell_height(&node.key, &metrics);
                    let pos = arena.roots().len();
                    let mut info =
                        LayoutInfo::new(node.node_type, node.key.clone(), Rect::default());
                    info.rect = placement.place(pos, height);
                    info.estimated_size = estimated;
                    info.content = node.content;
                    arena.push(None, info);
                }
                NodeType::Skeleton => {
                    let mut repeat = 0u32;
                    loop {
                        let pos = arena.roots().len();
                        let mut info =
                            LayoutInfo::new(NodeType::Skeleton, node.key.clone(), Rect::default());
                        info.rect = placement.place(pos, metrics.item_height);
                        info.estimated_size = true;
                        info.repeat_index = repeat;
                        info.content = node.content;
                        arena.push(None, info);
                        repeat += 1;
                        // Zero-height rows never reach the viewport bottom.
                        let flat = metrics.item_height + placement.row_gap <= 0.0;
                        if (flat && repeat as usize >= metrics.columns)
                            || placement.next_y() >= viewport.max_y()
                        {
                            break;
                        }
                    }
                }
                NodeType::Loader if i + 1 == count => {
                    let loader_height = self.options.loader_height.max(0.0);
                    let (y, height) = if placement.cells == 0 {
                        (0.0, viewport.height.max(loader_height))
                    } else {
                        (placement.bottom(), loader_height)
                    };
                    let mut info = LayoutInfo::new(
                        NodeType::Loader,
                        node.key.clone(),
                        Rect::new(0.0, y, metrics.content_width, height),
                    );
                    info.content = node.content;
                    self.loader = Some(arena.roots().len());
                    arena.push(None, info);
                    bottom = y + height;
                    continue;
                }
                NodeType::Loader => contract_violation!(
                    "GridLayout",
                    "loader {:?} must be the last node of the collection",
                    node.key
                ),
                _ => contract_violation!("GridLayout", node),
            }
            bottom = placement.bottom();
        }

        self.placement = placement;
        self.cache.arena = arena;
        self.cache
            .persisted
            .rebuild(&self.cache.arena, &|_: usize| Vec::new());
        self.cache
            .finish("GridLayout", reason, metrics.content_width, bottom);
        true
    }

    fn cell_height(&self, key: &K, metrics: &GridMetrics) -> (f64, bool) {
        if !self.options.waterfall {
            return (metrics.item_height, false);
        }
        self.cache
            .measured(key, metrics.item_width)
            .unwrap_or((metrics.item_height, true))
    }

    pub fn set_persisted_keys(&mut self, keys: Option<Arc<KeySet<K>>>) {
        self.cache
            .persisted
            .set_keys(keys, &self.cache.arena, &|_: usize| Vec::new());
    }

    /// Calls `f` for every cell intersecting `rect`, every persisted cell and the trailing
    /// loader, in document order.
    pub fn for_each_visible_layout_info(&self, rect: Rect, mut f: impl FnMut(&LayoutInfo<K>)) {
        let arena = &self.cache.arena;
        let roots = arena.roots();
        if roots.is_empty() {
            return;
        }
        let persisted = self.cache.persisted.positions(None).unwrap_or(&[]);
        let loader = self.loader;
        let rect_at = |p: usize| arena.rect(roots[p]);

        if self.placement.waterfall {
            let mut hits: Vec<usize> = Vec::new();
            for lane in &self.placement.lanes {
                let range = visible_range(lane, rect_at, Axis::Y, rect.y, rect.max_y());
                hits.extend(
                    lane[range]
                        .iter()
                        .copied()
                        .filter(|&p| rect_at(p).intersects(&rect)),
                );
            }
            hits.extend_from_slice(persisted);
            hits.extend(loader);
            hits.sort_unstable();
            hits.dedup();
            for p in hits {
                f(arena.info(roots[p]));
            }
            return;
        }

        let rows = &self.placement.rows;
        let range = if rect.max_y() > rect.y {
            let start = rows.partition_point(|r| r.y + r.height <= rect.y);
            let end = rows.partition_point(|r| r.y < rect.max_y());
            if start < end {
                rows[start].start..rows[end - 1].end
            } else {
                0..0
            }
        } else {
            0..0
        };
        let mut emit = |p: usize| {
            let info = arena.info(roots[p]);
            let forced = loader == Some(p) || persisted.binary_search(&p).is_ok();
            if forced || info.rect.intersects(&rect) {
                f(info);
            }
        };
        IndexEmitter::new(roots.len(), &mut emit)
            .emit_merged(range, persisted.iter().copied().chain(loader));
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

    /// Reconciles a measured cell height. Uniform grids have fixed cells and ignore this;
    /// waterfall cells re-run lane placement from the measured cell on.
    pub fn update_item_size(&mut self, key: &K, size: Size) -> bool {
        if !self.options.waterfall {
            return false;
        }
        let Some(idx) = self.cache.arena.index_of(key) else {
            return false;
        };
        let node = self.cache.arena.node(idx);
        let info = &node.info;
        if !matches!(info.node_type, NodeType::Item | NodeType::Placeholder)
            || (!info.estimated_size && !self.cache.has_measurement(key))
        {
            return false;
        }
        let pos = node.position;
        let height = size.height.max(0.0);
        let width = info.rect.width;
        let was_estimated = info.estimated_size;
        let unchanged = info.rect.height == height;

        self.cache.record_measurement(key, height, width);
        let node = self.cache.arena.node_mut(idx);
        node.info.estimated_size = false;
        if unchanged {
            return was_estimated;
        }
        node.info.rect.height = height;
        self.reflow_from(pos);
        true
    }

    /// Re-places waterfall cells from root position `from` on.
    fn reflow_from(&mut self, from: usize) {
        let old_bottom = self.placement.bottom();
        let total = self.placement.cells;
        {
            let arena = &self.cache.arena;
            let roots = arena.roots();
            self.placement.truncate(from, |p| arena.rect(roots[p]));
        }
        for pos in from..total {
            let idx = self.cache.arena.roots()[pos];
            let height = self.cache.arena.rect(idx).height;
            let rect = self.placement.place(pos, height);
            self.cache.arena.node_mut(idx).info.rect = rect;
        }
        let delta = self.placement.bottom() - old_bottom;
        if let Some(loader) = self.loader {
            let idx = self.cache.arena.roots()[loader];
            self.cache.arena.offset_subtree(idx, 0.0, delta);
        }
        vtrace!(from, cells = total, delta, "waterfall reflow");
        self.cache.grow_content(delta);
    }

    /// The next cell in reading order, or the nearest cell of the lane to the right.
    pub fn key_right_of(&self, key: &K) -> Option<K> {
        self.neighbour(key, true)
    }

    pub fn key_left_of(&self, key: &K) -> Option<K> {
        self.neighbour(key, false)
    }

    fn neighbour(&self, key: &K, right: bool) -> Option<K> {
        let arena = &self.cache.arena;
        let pos = arena.node(arena.index_of(key)?).position;
        let p = &self.placement;
        if pos >= p.cells {
            return None;
        }
        let roots = arena.roots();
        let target = if p.waterfall {
            let lane = p.lane_of[pos];
            let next = if right {
                lane + 1
            } else {
                lane.checked_sub(1)?
            };
            let cells = p.lanes.get(next)?;
            let center = arena.rect(roots[pos]).center_y();
            let i = nearest_index(cells, |q| arena.rect(roots[q]), Axis::Y, center)?;
            cells[i]
        } else if right {
            pos + 1
        } else {
            pos.checked_sub(1)?
        };
        (target < p.cells).then(|| arena.info(roots[target]).key.clone())
    }

    pub fn key_range(&self, from: &K, to: &K) -> Vec<K> {
        self.cache
            .arena
            .keys_between(from, to, |info| info.node_type == NodeType::Item)
    }

    /// Resolves a viewport-relative point into a drop on the nearest cell.
    ///
    /// Dropping `on` the cell is preferred; when the cell rejects it the drop goes before or
    /// after it depending on which half of the cell the point is in.
    pub fn drop_target_from_point(
        &self,
        x: f64,
        y: f64,
        mut is_valid: impl FnMut(&DropTarget<K>) -> bool,
    ) -> DropTarget<K> {
        let vr = self.cache.visible_rect();
        let point = Point::new(x + vr.x, y + vr.y);
        let Some(pos) = self.nearest_cell(point) else {
            return DropTarget::Root;
        };
        let info = self.cache.arena.info(self.cache.arena.roots()[pos]);
        classify_horizontal(&info.key, &info.rect, point.x, &mut is_valid)
    }

    fn nearest_cell(&self, point: Point) -> Option<usize> {
        let p = &self.placement;
        if p.cells == 0 {
            return None;
        }
        let arena = &self.cache.arena;
        let roots = arena.roots();
        let dist = |q: usize| arena.rect(roots[q]).distance_sq_to(point);
        let closest = |candidates: &mut dyn Iterator<Item = usize>| {
            candidates.min_by(|&a, &b| dist(a).total_cmp(&dist(b)))
        };

        if p.waterfall {
            let mut candidates = p.lanes.iter().filter_map(|cells| {
                nearest_index(cells, |q| arena.rect(roots[q]), Axis::Y, point.y).map(|i| cells[i])
            });
            return closest(&mut candidates);
        }
        let row = p
            .rows
            .partition_point(|r| r.y + r.height <= point.y)
            .min(p.rows.len() - 1);
        let band = p.rows[row];
        closest(&mut (band.start..band.end))
    }

    pub fn drop_indicator_rect(&self, target: &DropTarget<K>) -> Option<Rect> {
        let DropTarget::Item { key, drop_position } = target else {
            return None;
        };
        let info = self.layout_info(key)?;
        Some(indicator_rect(
            &info.rect,
            *drop_position,
            self.options.drop_indicator_thickness,
            true,
        ))
    }
}
