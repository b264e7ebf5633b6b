use crate::*;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::emitter::IndexEmitter;

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_u64(&mut self, start: u64, end_exclusive: u64) -> u64 {
        debug_assert!(start < end_exclusive);
        let span = end_exclusive - start;
        start + (self.next_u64() % span)
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        self.gen_range_u64(start as u64, end_exclusive as u64) as usize
    }

    /// Whole-pixel value in `[start, end_exclusive)`.
    fn gen_px(&mut self, start: i64, end_exclusive: i64) -> f64 {
        let span = (end_exclusive - start) as u64;
        (start + (self.next_u64() % span) as i64) as f64
    }

    fn gen_bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }

    fn shuffle<T>(&mut self, v: &mut [T]) {
        for i in (1..v.len()).rev() {
            let j = self.gen_range_usize(0, i + 1);
            v.swap(i, j);
        }
    }
}

fn list(n: u64) -> SharedCollection<u64> {
    StaticCollection::from_items(0..n).into_shared()
}

fn ctx(rect: Rect) -> LayoutContext {
    LayoutContext::new(rect)
}

fn keys(infos: &[LayoutInfo<u64>]) -> Vec<u64> {
    infos.iter().map(|i| i.key).collect()
}

const HEADER: u64 = 1;
const HEADER_ROW: u64 = 2;
const BODY: u64 = 3;

fn column_key(c: usize) -> u64 {
    100 + c as u64
}

fn row_key(r: usize) -> u64 {
    1_000 + r as u64
}

fn cell_key(r: usize, c: usize) -> u64 {
    100_000 + r as u64 * 100 + c as u64
}

fn table_collection(
    rows: usize,
    cols: usize,
    with_header: bool,
    constraints: impl Fn(usize) -> ColumnConstraints,
    row_headers: &[usize],
) -> SharedCollection<u64> {
    table_static(rows, cols, with_header, constraints, row_headers).into_shared()
}

fn table_static(
    rows: usize,
    cols: usize,
    with_header: bool,
    constraints: impl Fn(usize) -> ColumnConstraints,
    row_headers: &[usize],
) -> StaticCollection<u64> {
    let mut c = StaticCollection::new();
    if with_header {
        c.push(None, Node::new(NodeType::Header, HEADER));
        c.push(Some(&HEADER), Node::new(NodeType::HeaderRow, HEADER_ROW));
        for col in 0..cols {
            c.push_column(&HEADER_ROW, column_key(col), constraints(col));
        }
    }
    c.push(None, Node::new(NodeType::RowGroup, BODY));
    for r in 0..rows {
        c.push_row(&BODY, row_key(r), (0..cols).map(|col| cell_key(r, col)));
    }
    c.set_row_header_columns(row_headers.iter().map(|&i| column_key(i)));
    c
}

fn fixed_widths(cols: usize, width: f64) -> Arc<KeyMap<u64, f64>> {
    Arc::new((0..cols).map(|c| (column_key(c), width)).collect())
}

#[test]
fn rect_intersection_is_strict() {
    let a = Rect::new(0.0, 0.0, 10.0, 10.0);
    assert!(a.intersects(&Rect::new(5.0, 5.0, 10.0, 10.0)));
    assert!(!a.intersects(&Rect::new(10.0, 0.0, 5.0, 5.0)));
    assert!(!a.intersects(&Rect::new(2.0, 2.0, 0.0, 5.0)));
    assert_eq!(
        a.intersection(&Rect::new(5.0, 5.0, 10.0, 10.0)),
        Some(Rect::new(5.0, 5.0, 5.0, 5.0))
    );
    assert_eq!(
        a.union(&Rect::new(20.0, 5.0, 5.0, 10.0)),
        Rect::new(0.0, 0.0, 25.0, 15.0)
    );
    assert!(a.contains_point(Point::new(0.0, 9.5)));
    assert!(!a.contains_point(Point::new(10.0, 5.0)));
}

#[test]
fn emitter_merges_range_with_extras_once() {
    let mut out = Vec::new();
    let mut push = |i: usize| out.push(i);
    let mut e = IndexEmitter::new(8, &mut push);
    e.emit_merged(2..5, [0, 0, 3, 7]);
    assert_eq!(out, [0, 2, 3, 4, 7]);
}

#[test]
fn list_fixed_rows_scenario() {
    let mut layout = ListLayout::with_options(ListLayoutOptions::new().with_row_height(25.0));
    let viewport = Rect::new(0.0, 0.0, 100.0, 30.0);
    assert!(layout.update(&list(3), ctx(viewport)));

    assert_eq!(layout.content_size(), Size::new(100.0, 75.0));
    let visible = layout.visible_layout_infos(Rect::new(0.0, 0.0, 100.0, 30.0));
    assert_eq!(keys(&visible), [0, 1]);
    assert!(visible.iter().all(|i| !i.estimated_size));
}

#[test]
fn list_gap_and_padding_affect_positions_and_content() {
    let options = ListLayoutOptions::new()
        .with_row_height(25.0)
        .with_gap(10.0)
        .with_padding(5.0);
    let mut layout = ListLayout::with_options(options);
    layout.update(&list(3), ctx(Rect::new(0.0, 0.0, 100.0, 50.0)));

    let ys: Vec<f64> = (0..3)
        .map(|k| layout.layout_info(&k).map(|i| i.rect.y).unwrap_or(-1.0))
        .collect();
    assert_eq!(ys, [5.0, 40.0, 75.0]);
    let first = layout.layout_info(&0).map(|i| i.rect);
    assert_eq!(first, Some(Rect::new(5.0, 5.0, 90.0, 25.0)));
    assert_eq!(layout.content_size().height, 105.0);
}

#[test]
fn empty_list_reports_viewport_height() {
    let mut layout = ListLayout::<u64>::new();
    layout.update(&list(0), ctx(Rect::new(0.0, 0.0, 320.0, 240.0)));
    assert_eq!(layout.content_size(), Size::new(320.0, 240.0));
    assert!(layout.visible_layout_infos(Rect::new(0.0, 0.0, 320.0, 240.0)).is_empty());
}

#[test]
fn list_visible_range_matches_naive_intersection() {
    let mut rng = Lcg::new(0x5eed);
    for _ in 0..20 {
        let n = rng.gen_range_u64(1, 120);
        let collection = list(n);
        let mut layout = ListLayout::new();
        layout.update(&collection, ctx(Rect::new(0.0, 0.0, 200.0, 300.0)));

        let mut order: Vec<u64> = (0..n).collect();
        rng.shuffle(&mut order);
        let mut heights = alloc::vec![0.0; n as usize];
        for &k in &order {
            let h = rng.gen_px(1, 60);
            heights[k as usize] = h;
            assert!(layout.update_item_size(&k, Size::new(200.0, h)));
        }

        // Measurements reflowed every later row.
        let mut y = 0.0;
        for k in 0..n {
            let info = layout.layout_info(&k).cloned();
            assert_eq!(info.map(|i| (i.rect.y, i.rect.height)), Some((y, heights[k as usize])));
            y += heights[k as usize];
        }
        assert_eq!(layout.content_size().height, y.max(300.0));

        for _ in 0..50 {
            let q = Rect::new(
                rng.gen_px(-50, 150),
                rng.gen_px(-100, y as i64 + 100),
                rng.gen_px(0, 100),
                rng.gen_px(0, 200),
            );
            let expected: Vec<u64> = (0..n)
                .filter(|k| layout.layout_info(k).is_some_and(|i| i.rect.intersects(&q)))
                .collect();
            assert_eq!(keys(&layout.visible_layout_infos(q)), expected, "query {q:?}");
        }
    }
}

#[test]
fn measurement_replaces_estimate_and_shifts_siblings() {
    let viewport = Rect::new(0.0, 0.0, 100.0, 100.0);
    let mut layout = ListLayout::new();
    layout.update(&list(5), ctx(viewport));

    let before = layout.layout_info(&3).map(|i| i.rect.y);
    assert_eq!(before, Some(144.0));
    assert!(layout.layout_info(&2).is_some_and(|i| i.estimated_size));

    assert!(layout.update_item_size(&2, Size::new(100.0, 100.0)));
    let info = layout.layout_info(&2).cloned();
    assert!(info.as_ref().is_some_and(|i| !i.estimated_size && i.rect.height == 100.0));
    assert_eq!(layout.layout_info(&3).map(|i| i.rect.y), Some(196.0));
    assert_eq!(layout.layout_info(&1).map(|i| i.rect.y), Some(48.0));
    assert_eq!(layout.content_size().height, 292.0);

    // Same height again is not a change.
    assert!(!layout.update_item_size(&2, Size::new(100.0, 100.0)));
    assert!(!layout.update_item_size(&42, Size::new(100.0, 10.0)));

    // Measurements survive a rebuild against a new snapshot with the same keys.
    assert!(layout.update(&list(5), ctx(viewport)));
    let info = layout.layout_info(&2).cloned();
    assert!(info.is_some_and(|i| !i.estimated_size && i.rect.height == 100.0));
}

#[test]
fn fixed_rows_ignore_measurements() {
    let mut layout = ListLayout::with_options(ListLayoutOptions::new().with_row_height(20.0));
    layout.update(&list(3), ctx(Rect::new(0.0, 0.0, 100.0, 100.0)));
    assert!(!layout.update_item_size(&1, Size::new(100.0, 80.0)));
    assert_eq!(layout.layout_info(&1).map(|i| i.rect.height), Some(20.0));
}

#[test]
fn update_is_idempotent_and_scrolling_does_not_rebuild() {
    let collection = list(200);
    let mut layout = ListLayout::new();
    let viewport = Rect::new(0.0, 0.0, 100.0, 300.0);
    assert!(layout.update(&collection, ctx(viewport)));
    let first = layout.visible_layout_infos(viewport);

    assert!(!layout.update(&collection, ctx(viewport)));
    assert_eq!(layout.visible_layout_infos(viewport), first);

    let scrolled = Rect::new(0.0, 1_000.0, 100.0, 300.0);
    assert!(!layout.update(&collection, ctx(scrolled)));
    assert!(layout.update(&collection, ctx(scrolled).with_size_changed(true)));
    assert!(layout.update(&collection, ctx(Rect::new(0.0, 0.0, 120.0, 300.0))));

    layout.set_options(ListLayoutOptions::new().with_gap(4.0));
    assert!(layout.update(&collection, ctx(Rect::new(0.0, 0.0, 120.0, 300.0))));
}

#[test]
fn persisted_keys_are_always_visible() {
    let mut rng = Lcg::new(7);
    let mut layout = ListLayout::with_options(ListLayoutOptions::new().with_row_height(25.0));
    layout.update(&list(100), ctx(Rect::new(0.0, 0.0, 100.0, 50.0)));

    for _ in 0..30 {
        let persisted: KeySet<u64> = (0..rng.gen_range_usize(1, 5))
            .map(|_| rng.gen_range_u64(0, 100))
            .collect();
        layout.set_persisted_keys(Some(Arc::new(persisted.clone())));
        let q = Rect::new(0.0, rng.gen_px(0, 2_500), 100.0, rng.gen_px(0, 60));
        let visible = keys(&layout.visible_layout_infos(q));
        for k in &persisted {
            assert!(visible.contains(k), "persisted {k} missing for {q:?}");
        }
        let mut sorted = visible.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(visible, sorted);
    }

    layout.set_persisted_keys(None);
    assert_eq!(keys(&layout.visible_layout_infos(Rect::new(0.0, 0.0, 100.0, 50.0))), [0, 1]);
}

#[test]
fn section_heading_stays_while_section_is_visible() {
    let mut c = StaticCollection::<u64>::new();
    c.push_section(1, Some(2), [10, 11, 12]);
    c.push_section(3, Some(4), 20..30);
    let options = ListLayoutOptions::new()
        .with_row_height(25.0)
        .with_heading_height(30.0);
    let mut layout = ListLayout::with_options(options);
    layout.update(&c.into_shared(), ctx(Rect::new(0.0, 0.0, 100.0, 50.0)));

    assert_eq!(layout.layout_info(&1).map(|i| i.rect.height), Some(105.0));
    assert_eq!(layout.layout_info(&3).map(|i| i.rect.y), Some(105.0));
    let heading = layout.layout_info(&4).cloned();
    assert!(heading.is_some_and(|h| h.is_sticky && h.z_index > 0 && h.parent_key == Some(3)));

    let visible = layout.visible_layout_infos(Rect::new(0.0, 200.0, 100.0, 50.0));
    assert_eq!(keys(&visible), [3, 4, 22, 23, 24]);
}

#[test]
fn trailing_loader_is_always_visible() {
    let mut c = StaticCollection::from_items(0..50);
    c.push_loader(None, 999);
    let mut layout = ListLayout::with_options(
        ListLayoutOptions::new()
            .with_row_height(25.0)
            .with_loader_height(40.0),
    );
    layout.update(&c.into_shared(), ctx(Rect::new(0.0, 0.0, 100.0, 50.0)));

    let visible = keys(&layout.visible_layout_infos(Rect::new(0.0, 0.0, 100.0, 50.0)));
    assert_eq!(visible, [0, 1, 999]);
    assert_eq!(
        layout.layout_info(&999).map(|i| i.rect),
        Some(Rect::new(0.0, 1_250.0, 100.0, 40.0))
    );
}

#[test]
fn sole_loader_fills_viewport() {
    let mut c = StaticCollection::new();
    c.push_loader(None, 7u64);
    let mut layout = ListLayout::new();
    layout.update(&c.into_shared(), ctx(Rect::new(0.0, 0.0, 100.0, 300.0)));
    assert_eq!(layout.layout_info(&7).map(|i| i.rect.height), Some(300.0));
}

#[test]
fn skeleton_repeats_until_viewport_is_filled() {
    let mut c = StaticCollection::from_items([0u64, 1]);
    c.push(None, Node::new(NodeType::Skeleton, 500));
    let mut layout = ListLayout::new();
    let viewport = Rect::new(0.0, 0.0, 100.0, 300.0);
    layout.update(&c.into_shared(), ctx(viewport));

    let skeletons: Vec<LayoutInfo<u64>> = layout
        .visible_layout_infos(viewport)
        .into_iter()
        .filter(|i| i.node_type == NodeType::Skeleton)
        .collect();
    let repeats: Vec<u32> = skeletons.iter().map(|i| i.repeat_index).collect();
    assert_eq!(repeats, [0, 1, 2, 3, 4]);
    assert_eq!(skeletons[0].rect.y, 96.0);
    assert!(skeletons.iter().all(|i| i.estimated_size && i.rect.height == 48.0));
    assert_eq!(layout.layout_info(&500).map(|i| i.repeat_index), Some(0));
}

#[test]
#[should_panic(expected = "ListLayout")]
fn list_rejects_unsupported_nodes() {
    let mut c = StaticCollection::new();
    c.push(None, Node::new(NodeType::Cell, 1u64));
    let mut layout = ListLayout::new();
    layout.update(&c.into_shared(), ctx(Rect::new(0.0, 0.0, 100.0, 100.0)));
}

#[test]
fn list_key_range_and_drop_target() {
    let mut layout = ListLayout::with_options(ListLayoutOptions::new().with_row_height(25.0));
    layout.update(&list(10), ctx(Rect::new(0.0, 0.0, 100.0, 100.0)));
    assert_eq!(layout.key_range(&7, &3), [3, 4, 5, 6, 7]);
    assert_eq!(layout.key_right_of(&3), None);

    // Lower half of row 2 with only `before` accepted.
    let target = layout.drop_target_from_point(50.0, 60.0, |t| {
        matches!(t, DropTarget::Item { drop_position: DropPosition::Before, .. })
    });
    assert_eq!(target, DropTarget::item(2, DropPosition::Before));
    assert_eq!(
        layout.drop_indicator_rect(&target),
        Some(Rect::new(0.0, 49.0, 100.0, 2.0))
    );
}

#[test]
fn grid_column_count_scenario() {
    let options = GridLayoutOptions::new()
        .with_min_item_size(Size::new(40.0, 40.0))
        .with_max_item_size(Size::new(65.0, 65.0))
        .with_min_space(Size::new(0.0, 0.0));
    let mut layout = GridLayout::with_options(options.clone());
    layout.update(&list(30), ctx(Rect::new(0.0, 0.0, 400.0, 400.0)));
    assert_eq!(layout.columns(), 10);
    assert!((40.0..=65.0).contains(&layout.item_width()));

    let mut capped = GridLayout::with_options(options.with_max_columns(4));
    capped.update(&list(30), ctx(Rect::new(0.0, 0.0, 400.0, 400.0)));
    assert_eq!(capped.columns(), 4);
    assert_eq!(capped.item_width(), 65.0);
    for k in 0..30 {
        let w = capped.layout_info(&k).map(|i| i.rect.width).unwrap_or(0.0);
        assert!((40.0..=65.0).contains(&w));
    }
}

#[test]
fn grid_degenerate_width_keeps_one_column() {
    let mut layout = GridLayout::new();
    layout.update(&list(3), ctx(Rect::new(0.0, 0.0, 0.0, 100.0)));
    assert_eq!(layout.columns(), 1);
    assert_eq!(layout.item_width(), 200.0);
    assert!(layout.content_size().width >= 200.0);
}

#[test]
fn grid_gutters_never_drop_below_min_space() {
    let mut layout = GridLayout::new();
    layout.update(&list(4), ctx(Rect::new(0.0, 0.0, 436.0, 400.0)));
    assert_eq!(layout.columns(), 1);
    assert_eq!(layout.layout_info(&0).map(|i| i.rect.x), Some(18.0));
    assert_eq!(layout.layout_info(&1).map(|i| i.rect.y), Some(436.0));

    let mut rng = Lcg::new(436);
    for _ in 0..200 {
        let min_w = rng.gen_px(1, 300);
        let space = rng.gen_px(0, 40);
        let width = rng.gen_px(0, 2_000);
        let options = GridLayoutOptions::new()
            .with_min_item_size(Size::new(min_w, 50.0))
            .with_min_space(Size::new(space, space));
        let mut layout = GridLayout::with_options(options);
        layout.update(&list(12), ctx(Rect::new(0.0, 0.0, width, 300.0)));

        let n = layout.columns();
        let w = layout.item_width();
        assert!(w >= min_w);
        if n > 1 {
            assert!(n as f64 * min_w + (n as f64 + 1.0) * space <= width, "{n} columns in {width}");
        }
        let row: Vec<Rect> = (0..n.min(12) as u64)
            .filter_map(|k| layout.layout_info(&k).map(|i| i.rect))
            .collect();
        assert!(row[0].x >= space, "leading gutter {} < {space}", row[0].x);
        for pair in row.windows(2) {
            assert!(pair[1].x - pair[0].max_x() >= space, "gutter below {space} in {width}");
        }
        let last = row[row.len() - 1];
        assert!(layout.content_size().width >= last.max_x() + space);
    }
}

#[test]
fn flat_grid_skeleton_stops_after_one_row() {
    for waterfall in [false, true] {
        let options = GridLayoutOptions::new()
            .with_min_item_size(Size::new(100.0, 0.0))
            .with_max_item_size(Size::new(100.0, 0.0))
            .with_min_space(Size::new(0.0, 0.0))
            .with_waterfall(waterfall);
        let mut c = StaticCollection::new();
        c.push(None, Node::new(NodeType::Skeleton, 500u64));
        let mut layout = GridLayout::with_options(options);
        assert!(layout.update(&c.into_shared(), ctx(Rect::new(0.0, 0.0, 300.0, 300.0))));
        assert_eq!(layout.columns(), 3);
        let first = layout.layout_info(&500).cloned();
        assert_eq!(first.as_ref().map(|i| (i.repeat_index, i.rect.height)), Some((0, 0.0)));
        assert_eq!(layout.content_size().height, 300.0);
    }
}

#[test]
fn grid_persisted_keys_are_always_visible() {
    let mut rng = Lcg::new(2024);
    for waterfall in [false, true] {
        let n = 60;
        let mut layout = square_grid(waterfall);
        layout.update(&list(n), ctx(Rect::new(0.0, 0.0, 300.0, 300.0)));
        if waterfall {
            for k in 0..n {
                layout.update_item_size(&k, Size::new(100.0, rng.gen_px(20, 200)));
            }
        }
        let height = layout.content_size().height as i64;

        for _ in 0..50 {
            let q = Rect::new(
                rng.gen_px(0, 300),
                rng.gen_px(-50, height),
                rng.gen_px(0, 300),
                rng.gen_px(0, 250),
            );
            // Pick persisted keys the query does not reach.
            let persisted: KeySet<u64> = (0..rng.gen_range_usize(1, 6))
                .map(|_| rng.gen_range_u64(0, n))
                .filter(|k| !layout.layout_info(k).is_some_and(|i| i.rect.intersects(&q)))
                .collect();
            layout.set_persisted_keys(Some(Arc::new(persisted.clone())));

            let visible = keys(&layout.visible_layout_infos(q));
            for k in &persisted {
                assert!(visible.contains(k), "persisted {k} missing for {q:?} ({waterfall})");
            }
            assert!(visible.windows(2).all(|w| w[0] < w[1]), "unordered {visible:?}");
            for k in visible.iter().filter(|k| !persisted.contains(*k)) {
                assert!(layout.layout_info(k).is_some_and(|i| i.rect.intersects(&q)));
            }
        }
    }
}

#[test]
fn unbounded_grid_limits_are_unset() {
    let options = GridLayoutOptions::default();
    assert_eq!(options.max_item_width, None);
    assert_eq!(options.max_columns, None);
    assert!(options.min_item_size.width.is_finite() && options.min_space.width.is_finite());

    let mut layout = GridLayout::with_options(options);
    layout.update(&list(8), ctx(Rect::new(0.0, 0.0, 1_000.0, 400.0)));
    assert_eq!(layout.columns(), 4);
    assert_eq!(layout.item_width(), 227.0);

    let capped = GridLayoutOptions::new()
        .with_max_item_size(Size::new(210.0, 210.0))
        .with_max_horizontal_space(40.0)
        .with_max_columns(3);
    assert_eq!((capped.max_item_width, capped.max_item_height), (Some(210.0), Some(210.0)));
    let mut layout = GridLayout::with_options(capped);
    layout.update(&list(8), ctx(Rect::new(0.0, 0.0, 1_000.0, 400.0)));
    assert_eq!((layout.columns(), layout.item_width()), (3, 210.0));
    assert_eq!(layout.layout_info(&0).map(|i| i.rect.x), Some(40.0));
}

#[cfg(feature = "serde")]
#[test]
fn grid_options_round_trip_through_json() {
    let options = GridLayoutOptions::new().with_max_columns(4);
    let json = serde_json::to_string(&options).expect("serialize");
    assert!(!json.contains("inf"), "{json}");
    let back: GridLayoutOptions = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, options);
}

fn square_grid(waterfall: bool) -> GridLayout<u64> {
    GridLayout::with_options(
        GridLayoutOptions::new()
            .with_min_item_size(Size::new(100.0, 100.0))
            .with_min_space(Size::new(0.0, 0.0))
            .with_waterfall(waterfall),
    )
}

#[test]
fn uniform_grid_rows_queries_and_drop() {
    let mut layout = square_grid(false);
    let viewport = Rect::new(0.0, 0.0, 300.0, 300.0);
    layout.update(&list(5), ctx(viewport));
    assert_eq!(
        layout.layout_info(&4).map(|i| i.rect),
        Some(Rect::new(100.0, 100.0, 100.0, 100.0))
    );
    assert_eq!(keys(&layout.visible_layout_infos(Rect::new(0.0, 120.0, 300.0, 50.0))), [3, 4]);
    assert_eq!(keys(&layout.visible_layout_infos(Rect::new(150.0, 0.0, 10.0, 300.0))), [1, 4]);

    assert_eq!(
        layout.drop_target_from_point(150.0, 150.0, |_| true),
        DropTarget::item(4, DropPosition::On),
    );
    let not_on = |t: &DropTarget<u64>| {
        !matches!(t, DropTarget::Item { drop_position: DropPosition::On, .. })
    };
    assert_eq!(
        layout.drop_target_from_point(120.0, 150.0, not_on),
        DropTarget::item(4, DropPosition::Before),
    );
    assert_eq!(
        layout.drop_target_from_point(180.0, 150.0, not_on),
        DropTarget::item(4, DropPosition::After),
    );
    // Points below the last row snap to the nearest cell of that row.
    assert_eq!(
        layout.drop_target_from_point(50.0, 290.0, |_| true),
        DropTarget::item(3, DropPosition::On),
    );

    assert_eq!(layout.key_right_of(&2), Some(3));
    assert_eq!(layout.key_left_of(&0), None);
    assert_eq!(layout.key_right_of(&4), None);
    assert!(!layout.update_item_size(&1, Size::new(100.0, 300.0)));

    let mut empty = square_grid(false);
    empty.update(&list(0), ctx(viewport));
    assert_eq!(empty.drop_target_from_point(10.0, 10.0, |_| true), DropTarget::Root);
}

#[test]
fn waterfall_places_into_shortest_lane() {
    let mut layout = square_grid(true);
    layout.update(&list(6), ctx(Rect::new(0.0, 0.0, 300.0, 100.0)));
    assert!(layout.layout_info(&3).is_some_and(|i| i.estimated_size));
    assert_eq!(layout.layout_info(&3).map(|i| (i.rect.x, i.rect.y)), Some((0.0, 100.0)));

    assert!(layout.update_item_size(&0, Size::new(100.0, 300.0)));
    assert_eq!(layout.layout_info(&3).map(|i| (i.rect.x, i.rect.y)), Some((100.0, 100.0)));
    assert_eq!(layout.layout_info(&4).map(|i| (i.rect.x, i.rect.y)), Some((200.0, 100.0)));
    assert_eq!(layout.layout_info(&5).map(|i| (i.rect.x, i.rect.y)), Some((100.0, 200.0)));
    assert_eq!(layout.content_size().height, 300.0);

    assert_eq!(layout.key_right_of(&0), Some(3));
    assert_eq!(layout.key_left_of(&4), Some(3));
    assert_eq!(layout.key_left_of(&0), None);
}

#[test]
fn waterfall_matches_greedy_placement_after_measurements() {
    let mut rng = Lcg::new(42);
    for _ in 0..10 {
        let n = rng.gen_range_u64(1, 60);
        let mut layout = square_grid(true);
        layout.update(&list(n), ctx(Rect::new(0.0, 0.0, 300.0, 400.0)));

        let mut heights = alloc::vec![100.0; n as usize];
        let mut order: Vec<u64> = (0..n).collect();
        rng.shuffle(&mut order);
        for &k in &order {
            let h = rng.gen_px(20, 200);
            heights[k as usize] = h;
            layout.update_item_size(&k, Size::new(100.0, h));
        }

        let mut bottoms = [0.0f64; 3];
        for k in 0..n {
            let mut lane = 0;
            for l in 1..3 {
                if bottoms[l] < bottoms[lane] {
                    lane = l;
                }
            }
            let height = heights[k as usize];
            let expected = Rect::new(lane as f64 * 100.0, bottoms[lane], 100.0, height);
            bottoms[lane] += heights[k as usize];
            assert_eq!(layout.layout_info(&k).map(|i| i.rect), Some(expected), "item {k}");
        }
        let tallest = bottoms.iter().copied().fold(0.0, f64::max);
        assert_eq!(layout.content_size().height, tallest.max(400.0));

        for _ in 0..20 {
            let q = Rect::new(0.0, rng.gen_px(-50, tallest as i64 + 50), 300.0, rng.gen_px(0, 250));
            let expected: Vec<u64> = (0..n)
                .filter(|k| layout.layout_info(k).is_some_and(|i| i.rect.intersects(&q)))
                .collect();
            assert_eq!(keys(&layout.visible_layout_infos(q)), expected);
        }
    }
}

#[test]
fn column_solver_distributes_fractions() {
    let solver = FlexColumnSolver;
    let inputs: Vec<ColumnInput<u64>> = [1.0, 2.0, 1.0]
        .iter()
        .enumerate()
        .map(|(i, &fr)| ColumnInput {
            key: i as u64,
            constraints: ColumnConstraints::fraction(fr).with_min_width(0.0),
            sticky: false,
        })
        .collect();
    let widths = solver.resolve(&inputs, 400.0);
    assert_eq!((widths[&0], widths[&1], widths[&2]), (100.0, 200.0, 100.0));

    let capped: Vec<ColumnInput<u64>> = (0..3)
        .map(|i| {
            let constraints = ColumnConstraints::fraction(1.0).with_min_width(0.0);
            ColumnInput {
                key: i,
                constraints: if i == 0 { constraints.with_max_width(50.0) } else { constraints },
                sticky: false,
            }
        })
        .collect();
    let widths = solver.resolve(&capped, 250.0);
    assert_eq!((widths[&0], widths[&1], widths[&2]), (50.0, 100.0, 100.0));
}

#[test]
fn column_widths_never_exceed_available_and_sticky_widths_hold() {
    let mut rng = Lcg::new(99);
    let solver = FlexColumnSolver;
    for _ in 0..200 {
        let n = rng.gen_range_usize(1, 12);
        let inputs: Vec<ColumnInput<u64>> = (0..n)
            .map(|i| {
                let mut constraints = if rng.gen_bool() {
                    ColumnConstraints::fixed(rng.gen_px(10, 300))
                } else {
                    ColumnConstraints::fraction(rng.gen_px(1, 4))
                };
                if rng.gen_bool() {
                    constraints = constraints.with_min_width(rng.gen_px(0, 120));
                }
                if rng.gen_bool() {
                    constraints = constraints.with_max_width(rng.gen_px(50, 400));
                }
                ColumnInput {
                    key: i as u64,
                    constraints,
                    sticky: rng.gen_range_usize(0, 4) == 0,
                }
            })
            .collect();

        let a = rng.gen_px(0, 3_000);
        let wa = solver.resolve(&inputs, a);
        let total: f64 = wa.values().sum();
        assert!(total <= a + 1e-6, "total {total} > available {a}");
        assert_eq!(wa.len(), n);

        // Pinned columns resolve from their own constraints while they fit.
        let own_width = |c: &ColumnInput<u64>| match c.constraints.width {
            ColumnWidth::Static(px) => c.constraints.clamp(px),
            ColumnWidth::Fraction(_) => c.constraints.min(),
        };
        let sticky_total: f64 = inputs.iter().filter(|c| c.sticky).map(own_width).sum();
        let narrow = solver.resolve(&inputs, sticky_total + rng.gen_px(0, 500));
        let wide = solver.resolve(&inputs, sticky_total + rng.gen_px(500, 3_000));
        for c in inputs.iter().filter(|c| c.sticky) {
            assert_eq!(narrow[&c.key], own_width(c), "sticky column {}", c.key);
            assert_eq!(wide[&c.key], own_width(c), "sticky column {}", c.key);
        }
    }
}

fn wide_table(rows: usize, cols: usize) -> (TableLayout<u64>, SharedCollection<u64>) {
    let options = TableLayoutOptions::new()
        .with_row_height(20.0)
        .with_heading_height(30.0)
        .with_column_widths(Some(fixed_widths(cols, 100.0)));
    let collection = table_collection(
        rows,
        cols,
        true,
        |c| ColumnConstraints::default().with_sticky(c == 0),
        &[5],
    );
    (TableLayout::with_options(options), collection)
}

#[test]
fn table_sticky_columns_survive_horizontal_scroll() {
    let (rows, cols) = (50, 10);
    let (mut layout, collection) = wide_table(rows, cols);
    layout.update(&collection, ctx(Rect::new(0.0, 0.0, 400.0, 200.0)));
    assert_eq!(layout.sticky_column_indices(), [0, 5]);
    assert_eq!(layout.content_size().width, 1_000.0);
    assert_eq!(layout.content_size().height, 30.0 + 20.0 * rows as f64);
    assert!(layout.layout_info(&cell_key(0, 5)).is_some_and(|i| i.is_sticky));
    assert!(layout.layout_info(&cell_key(0, 4)).is_some_and(|i| !i.is_sticky));

    let mut rng = Lcg::new(3);
    for _ in 0..100 {
        let q = Rect::new(
            rng.gen_px(0, 1_000),
            rng.gen_px(0, 1_100),
            rng.gen_px(0, 300),
            rng.gen_px(0, 200),
        );
        let infos = layout.visible_layout_infos(q);
        let out = keys(&infos);
        assert!(out.starts_with(&[HEADER, HEADER_ROW]));

        let expected_rows: Vec<u64> = (0..rows)
            .filter(|&r| {
                let y = 30.0 + 20.0 * r as f64;
                q.height > 0.0 && y < q.max_y() && y + 20.0 > q.y
            })
            .map(row_key)
            .collect();
        let seen_rows: Vec<u64> = infos
            .iter()
            .filter(|i| i.node_type == NodeType::Item)
            .map(|i| i.key)
            .collect();
        assert_eq!(seen_rows, expected_rows, "query {q:?}");

        let column_visible = |c: usize| {
            let x = 100.0 * c as f64;
            c == 0 || c == 5 || (q.width > 0.0 && x < q.max_x() && x + 100.0 > q.x)
        };
        for parent in seen_rows.iter().copied().chain([HEADER_ROW]) {
            let cells: Vec<usize> = infos
                .iter()
                .filter(|i| i.parent_key == Some(parent))
                .map(|i| (i.key % 100) as usize)
                .collect();
            let expected: Vec<usize> = (0..cols).filter(|&c| column_visible(c)).collect();
            assert_eq!(cells, expected, "row {parent} for {q:?}");
        }
    }
}

#[test]
fn table_header_is_always_emitted() {
    let (mut layout, collection) = wide_table(100, 4);
    layout.update(&collection, ctx(Rect::new(0.0, 0.0, 400.0, 200.0)));
    let header = layout.layout_info(&HEADER).cloned();
    assert!(header.is_some_and(|h| h.is_sticky && h.rect.height == 30.0));

    let out = keys(&layout.visible_layout_infos(Rect::new(0.0, 1_000.0, 400.0, 100.0)));
    assert!(out.starts_with(&[HEADER, HEADER_ROW, column_key(0), column_key(1)]));
    assert!(out.contains(&row_key(48)));
}

#[test]
fn table_persisted_cell_keeps_its_row_and_sticky_cells() {
    let (mut layout, collection) = wide_table(50, 10);
    layout.update(&collection, ctx(Rect::new(0.0, 0.0, 400.0, 200.0)));
    let persisted: KeySet<u64> = [cell_key(40, 7)].into_iter().collect();
    layout.set_persisted_keys(Some(Arc::new(persisted)));

    let infos = layout.visible_layout_infos(Rect::new(0.0, 0.0, 200.0, 100.0));
    let out = keys(&infos);
    let rows: Vec<u64> = infos
        .iter()
        .filter(|i| i.node_type == NodeType::Item)
        .map(|i| i.key)
        .collect();
    assert_eq!(rows, [row_key(0), row_key(1), row_key(2), row_key(3), row_key(40)]);
    let row_40: Vec<u64> = infos
        .iter()
        .filter(|i| i.parent_key == Some(row_key(40)))
        .map(|i| i.key)
        .collect();
    assert_eq!(row_40, [cell_key(40, 0), cell_key(40, 1), cell_key(40, 5), cell_key(40, 7)]);
    assert!(out.contains(&BODY));
}

#[test]
fn table_drop_target_scenario() {
    let options = TableLayoutOptions::new().with_row_height(25.0);
    let mut layout = TableLayout::with_options(options);
    let collection = table_collection(4, 0, false, |_| ColumnConstraints::default(), &[]);
    layout.update(&collection, ctx(Rect::new(0.0, 0.0, 200.0, 200.0)));

    let after_only = |t: &DropTarget<u64>| {
        matches!(t, DropTarget::Item { drop_position: DropPosition::After, .. })
    };
    assert_eq!(
        layout.drop_target_from_point(10.0, 37.0, after_only),
        DropTarget::item(row_key(1), DropPosition::After)
    );

    // When `on` is accepted, the 10px edge bands still prefer before/after.
    assert_eq!(
        layout.drop_target_from_point(10.0, 27.0, |_| true),
        DropTarget::item(row_key(1), DropPosition::Before),
    );
    assert_eq!(
        layout.drop_target_from_point(10.0, 37.0, |_| true),
        DropTarget::item(row_key(1), DropPosition::On),
    );
    assert_eq!(
        layout.drop_target_from_point(10.0, 48.0, |_| true),
        DropTarget::item(row_key(1), DropPosition::After),
    );
    assert_eq!(layout.drop_target_from_point(10.0, 150.0, |_| true), DropTarget::Root);

    let indicator = layout.drop_indicator_rect(&DropTarget::item(row_key(1), DropPosition::After));
    assert_eq!(indicator.map(|r| (r.y, r.height)), Some((49.0, 2.0)));

    let mut empty = TableLayout::new();
    let collection = table_collection(0, 0, false, |_| ColumnConstraints::default(), &[]);
    empty.update(&collection, ctx(Rect::new(0.0, 0.0, 200.0, 200.0)));
    assert_eq!(empty.drop_target_from_point(10.0, 10.0, |_| true), DropTarget::Root);
    assert_eq!(empty.layout_info(&BODY).map(|i| i.rect.height), Some(200.0));
}

#[test]
fn table_cell_measurement_restamps_row() {
    let options = TableLayoutOptions::new().with_heading_height(30.0);
    let mut layout = TableLayout::with_options(options);
    let collection = table_collection(5, 3, true, |_| ColumnConstraints::default(), &[]);
    layout.update(&collection, ctx(Rect::new(0.0, 0.0, 300.0, 200.0)));

    assert_eq!(layout.layout_info(&cell_key(0, 1)).map(|i| i.rect.width), Some(100.0));
    assert_eq!(layout.layout_info(&row_key(1)).map(|i| i.rect.y), Some(78.0));
    assert_eq!(layout.content_size().height, 270.0);

    assert!(layout.update_item_size(&cell_key(0, 1), Size::new(100.0, 80.0)));
    assert!(layout.layout_info(&cell_key(0, 1)).is_some_and(|i| !i.estimated_size));
    for c in 0..3 {
        assert_eq!(layout.layout_info(&cell_key(0, c)).map(|i| i.rect.height), Some(80.0));
    }
    assert_eq!(layout.layout_info(&row_key(0)).map(|i| i.rect.height), Some(80.0));
    assert_eq!(layout.layout_info(&row_key(1)).map(|i| i.rect.y), Some(110.0));
    assert_eq!(layout.layout_info(&cell_key(1, 2)).map(|i| i.rect.y), Some(110.0));
    assert_eq!(layout.content_size().height, 302.0);

    assert!(layout.update_item_size(&row_key(2), Size::new(300.0, 60.0)));
    assert_eq!(layout.layout_info(&cell_key(2, 0)).map(|i| i.rect.height), Some(60.0));
    assert_eq!(layout.layout_info(&row_key(3)).map(|i| i.rect.y), Some(110.0 + 48.0 + 60.0));
}

#[test]
fn table_resize_column_pins_left_columns() {
    let collection = table_collection(
        3,
        3,
        true,
        |c| ColumnConstraints::fraction(1.0).with_allows_resizing(c != 2),
        &[],
    );
    let mut v = Virtualizer::new(TableLayout::new());
    v.update(collection, Rect::new(0.0, 0.0, 300.0, 200.0), false);
    let widths = v.layout().as_table().map(|t| t.column_widths().clone());
    assert_eq!(widths.map(|w| w[&column_key(1)]), Some(100.0));

    let resized = v.resize_column(&column_key(0), 150.0);
    let resized = resized.unwrap_or_default();
    assert_eq!(resized[&column_key(0)], 150.0);
    assert_eq!(resized[&column_key(1)], 75.0);
    assert_eq!(resized[&column_key(2)], 75.0);
    assert_eq!(v.layout_info(&cell_key(0, 1)).map(|i| i.rect.x), Some(150.0));
    assert_eq!(v.layout_info(&column_key(2)).map(|i| i.rect.x), Some(225.0));

    assert!(v.resize_column(&column_key(2), 10.0).is_none());
    assert!(v.resize_column(&9_999, 10.0).is_none());
}

#[test]
fn table_widths_fit_viewport_across_resizes() {
    let constraints = |c: usize| match c {
        0 => ColumnConstraints::fixed(80.0).with_sticky(true),
        2 => ColumnConstraints::fixed(60.0),
        3 => ColumnConstraints::fraction(2.0)
            .with_min_width(0.0)
            .with_allows_resizing(true),
        _ => ColumnConstraints::fraction(1.0).with_min_width(0.0),
    };
    let collection = table_collection(4, 5, true, constraints, &[2]);
    let mut layout = TableLayout::new();

    let sum = |layout: &TableLayout<u64>| layout.column_widths().values().sum::<f64>();
    let pinned = |layout: &TableLayout<u64>| {
        let w = layout.column_widths();
        (w[&column_key(0)], w[&column_key(2)])
    };

    layout.update(&collection, ctx(Rect::new(0.0, 0.0, 600.0, 200.0)));
    assert_eq!(layout.sticky_column_indices(), [0, 2]);
    assert_eq!(layout.column_widths()[&column_key(3)], 230.0);
    assert!(sum(&layout) <= 600.0 + 1e-6);
    assert_eq!(pinned(&layout), (80.0, 60.0));

    layout.update(&collection, ctx(Rect::new(0.0, 0.0, 360.0, 200.0)));
    assert_eq!(layout.column_widths()[&column_key(3)], 110.0);
    assert!(sum(&layout) <= 360.0 + 1e-6);
    assert_eq!(pinned(&layout), (80.0, 60.0));
    assert_eq!(
        layout.layout_info(&cell_key(1, 2)).map(|i| (i.rect.x, i.rect.width)),
        Some((135.0, 60.0))
    );

    let resized = layout.resize_column(&column_key(3), 150.0).unwrap_or_default();
    assert_eq!(resized[&column_key(3)], 150.0);
    assert!(resized.values().sum::<f64>() <= 360.0 + 1e-6);
    assert!(layout.update(&collection, ctx(Rect::new(0.0, 0.0, 360.0, 200.0))));
    assert_eq!(pinned(&layout), (80.0, 60.0));

    let mut rng = Lcg::new(360);
    for _ in 0..40 {
        // Wide enough for the resized and pinned columns.
        let width = rng.gen_px(345, 1_500);
        layout.update(&collection, ctx(Rect::new(0.0, 0.0, width, 200.0)));
        assert!(sum(&layout) <= width + 1e-6, "widths exceed {width}");
        assert_eq!(pinned(&layout), (80.0, 60.0));
        assert_eq!(layout.column_widths()[&column_key(3)], 150.0);
        assert_eq!(layout.layout_info(&cell_key(3, 0)).map(|i| i.rect.width), Some(80.0));
    }
}

#[test]
fn table_keyboard_moves_between_cells() {
    let (mut layout, collection) = wide_table(3, 4);
    layout.update(&collection, ctx(Rect::new(0.0, 0.0, 400.0, 200.0)));
    assert_eq!(layout.key_right_of(&cell_key(1, 2)), Some(cell_key(1, 3)));
    assert_eq!(layout.key_left_of(&cell_key(1, 0)), None);
    assert_eq!(layout.key_right_of(&column_key(0)), Some(column_key(1)));
    assert_eq!(layout.key_right_of(&row_key(1)), None);
    assert_eq!(layout.key_range(&row_key(2), &row_key(0)), [row_key(0), row_key(1), row_key(2)]);
}

/// Counts node lookups for cells of columns at or past `from_column`.
struct LookupCounter {
    inner: StaticCollection<u64>,
    from_column: u64,
    lookups: AtomicUsize,
}

impl Collection<u64> for LookupCounter {
    fn root_keys(&self) -> &[u64] {
        self.inner.root_keys()
    }

    fn child_keys(&self, key: &u64) -> &[u64] {
        self.inner.child_keys(key)
    }

    fn item(&self, key: &u64) -> Option<&Node<u64>> {
        if *key >= 100_000 && key % 100 >= self.from_column {
            self.lookups.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.item(key)
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn columns(&self) -> &[u64] {
        self.inner.columns()
    }

    fn row_header_column_keys(&self) -> &[u64] {
        self.inner.row_header_column_keys()
    }

    fn column_constraints(&self, key: &u64) -> ColumnConstraints {
        self.inner.column_constraints(key)
    }
}

#[test]
fn table_height_change_reuses_offscreen_cells() {
    let counter = Arc::new(LookupCounter {
        inner: table_static(
            5,
            10,
            true,
            |c| ColumnConstraints::default().with_sticky(c == 0),
            &[5],
        ),
        from_column: 6,
        lookups: AtomicUsize::new(0),
    });
    let collection: SharedCollection<u64> = counter.clone();
    let (mut layout, _) = wide_table(5, 10);
    layout.update(&collection, ctx(Rect::new(0.0, 0.0, 400.0, 200.0)));
    assert_eq!(counter.lookups.load(Ordering::Relaxed), 5 * 4);
    let far = layout.layout_info(&cell_key(2, 9)).cloned();

    counter.lookups.store(0, Ordering::Relaxed);
    assert!(layout.update(&collection, ctx(Rect::new(0.0, 0.0, 400.0, 600.0))));
    // Columns from 5 on start right of the viewport; the rest of each row is copied.
    assert_eq!(counter.lookups.load(Ordering::Relaxed), 0);
    assert_eq!(layout.layout_info(&cell_key(2, 9)).cloned(), far);
    assert_eq!(layout.content_size().height, 600.0);
    let q = Rect::new(0.0, 0.0, 400.0, 600.0);
    let row: Vec<u64> = keys(&layout.visible_layout_infos(q))
        .into_iter()
        .filter(|&k| k / 100 == 1_002)
        .collect();
    let expected: Vec<u64> = [0, 1, 2, 3, 5].iter().map(|&c| cell_key(2, c)).collect();
    assert_eq!(row, expected);

    // A wider viewport changes the column layout, so every cell is rebuilt.
    layout.update(&collection, ctx(Rect::new(0.0, 0.0, 700.0, 600.0)));
    assert_eq!(counter.lookups.load(Ordering::Relaxed), 5 * 4);
}

#[test]
#[should_panic(expected = "TableLayout")]
fn table_rejects_non_cell_row_children() {
    let mut c = StaticCollection::new();
    c.push(None, Node::new(NodeType::RowGroup, BODY));
    c.push_item(Some(&BODY), row_key(0));
    c.push_item(Some(&row_key(0)), 5u64);
    let mut layout = TableLayout::new();
    layout.update(&c.into_shared(), ctx(Rect::new(0.0, 0.0, 100.0, 100.0)));
}

#[test]
fn virtualizer_drives_layout_updates() {
    let mut v = Virtualizer::new(ListLayout::with_options(
        ListLayoutOptions::new().with_row_height(25.0),
    ));
    let collection = list(100);
    let viewport = Rect::new(0.0, 0.0, 100.0, 100.0);
    assert!(v.update(collection.clone(), viewport, false));
    assert!(!v.update(collection.clone(), viewport, false));

    assert!(!v.set_visible_rect(Rect::new(0.0, 500.0, 100.0, 100.0)));
    assert_eq!(keys(&v.visible_layout_infos(v.visible_rect())), [20, 21, 22, 23]);
    assert!(v.set_visible_rect(Rect::new(0.0, 500.0, 100.0, 200.0)));

    let persisted: KeySet<u64> = [99u64].into_iter().collect();
    v.set_persisted_keys(Some(Arc::new(persisted)));
    assert!(v.is_persisted_key(&99));
    assert!(!v.is_persisted_key(&3));
    let mut out = Vec::new();
    v.collect_visible_layout_infos(v.visible_rect(), &mut out);
    assert_eq!(out.last().map(|i| i.key), Some(99));

    // Persisted keys carry over to a new snapshot.
    assert!(v.update(list(100), v.visible_rect(), false));
    assert_eq!(keys(&v.visible_layout_infos(Rect::new(0.0, 0.0, 100.0, 25.0))), [0, 99]);

    v.set_layout(GridLayout::new());
    assert!(matches!(v.layout(), Layout::Grid(_)));
    assert!(v.layout_info(&0).is_some());
    assert_eq!(v.key_right_of(&0), Some(1));
    assert_eq!(v.key_range(&1, &3), [1, 2, 3]);
}

#[test]
fn virtualizer_without_collection_is_inert() {
    let mut v = Virtualizer::<u64>::new(ListLayout::new());
    assert!(!v.set_visible_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
    assert!(v.visible_layout_infos(Rect::new(0.0, 0.0, 10.0, 10.0)).is_empty());
    assert_eq!(v.content_size(), Size::default());
    assert_eq!(v.drop_target_from_point(1.0, 1.0, |_| true), DropTarget::Root);
}
