use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::key::KeyMap;
use crate::{ColumnConstraints, ContentId, LayoutKey, NodeType};

/// One node of a caller-supplied collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node<K> {
    pub key: K,
    pub node_type: NodeType,
    pub parent_key: Option<K>,
    /// Column index for tabular nodes (`Column`, `Cell`). Defaults to the running index.
    pub col_index: Option<usize>,
    /// Number of columns covered by a tabular node. Defaults to 1.
    pub col_span: Option<usize>,
    pub content: Option<ContentId>,
}

impl<K> Node<K> {
    pub fn new(node_type: NodeType, key: K) -> Self {
        Self {
            key,
            node_type,
            parent_key: None,
            col_index: None,
            col_span: None,
            content: None,
        }
    }

    pub fn item(key: K) -> Self {
        Self::new(NodeType::Item, key)
    }

    pub fn with_col_index(mut self, col_index: usize) -> Self {
        self.col_index = Some(col_index);
        self
    }

    pub fn with_col_span(mut self, col_span: usize) -> Self {
        self.col_span = Some(col_span);
        self
    }

    pub fn with_content(mut self, content: ContentId) -> Self {
        self.content = Some(content);
        self
    }
}

/// Read-only, ordered view over a (possibly nested) collection.
///
/// Contract:
/// - `root_keys` and `child_keys` return keys in document order.
/// - The order of a parent's children never changes without the collection itself being
///   replaced (a new `Arc`). Layouts cache geometry per collection identity and binary-search
///   children in this order.
/// - Every key returned by `root_keys`/`child_keys`/`columns` resolves through `item`.
///
/// Table collections are shaped as: root → `Header` → `HeaderRow` → `Column`, and
/// root → `RowGroup` → `Item` (row) → `Cell`, with an optional trailing `Loader` in the body.
pub trait Collection<K: LayoutKey> {
    fn root_keys(&self) -> &[K];

    /// Children of `key` in document order (empty for leaves and unknown keys).
    fn child_keys(&self, key: &K) -> &[K];

    fn item(&self, key: &K) -> Option<&Node<K>>;

    /// Number of `Item` nodes (rows for tables).
    fn size(&self) -> usize;

    /// Top-level nodes in document order.
    fn iter(&self) -> Box<dyn Iterator<Item = &Node<K>> + '_> {
        Box::new(self.root_keys().iter().filter_map(move |k| self.item(k)))
    }

    fn children(&self, key: &K) -> Box<dyn Iterator<Item = &Node<K>> + '_> {
        Box::new(self.child_keys(key).iter().filter_map(move |k| self.item(k)))
    }

    fn first_key(&self) -> Option<&K> {
        self.root_keys().first()
    }

    fn last_key(&self) -> Option<&K> {
        self.root_keys().last()
    }

    /// Leaf column keys in display order (tables only).
    fn columns(&self) -> &[K] {
        &[]
    }

    /// Columns that act as row headers; they are always kept in view like sticky columns.
    fn row_header_column_keys(&self) -> &[K] {
        &[]
    }

    fn column_constraints(&self, _key: &K) -> ColumnConstraints {
        ColumnConstraints::default()
    }
}

/// Shared handle the layouts keep between passes. Identity (`Arc::ptr_eq`) is the change signal.
pub type SharedCollection<K> = Arc<dyn Collection<K> + Send + Sync>;

/// A simple owned [`Collection`] built up front.
#[derive(Clone, Debug)]
pub struct StaticCollection<K: LayoutKey> {
    roots: Vec<K>,
    nodes: KeyMap<K, Node<K>>,
    children: KeyMap<K, Vec<K>>,
    columns: Vec<K>,
    row_headers: Vec<K>,
    constraints: KeyMap<K, ColumnConstraints>,
    size: usize,
}

impl<K: LayoutKey> Default for StaticCollection<K> {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            nodes: KeyMap::default(),
            children: KeyMap::default(),
            columns: Vec::new(),
            row_headers: Vec::new(),
            constraints: KeyMap::default(),
            size: 0,
        }
    }
}

impl<K: LayoutKey> StaticCollection<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flat collection of items.
    pub fn from_items(keys: impl IntoIterator<Item = K>) -> Self {
        let mut c = Self::new();
        for key in keys {
            c.push(None, Node::item(key));
        }
        c
    }

    /// Appends `node` under `parent` (or at the root).
    ///
    /// # Panics
    /// If `parent` is not in the collection or `node.key` is already present.
    pub fn push(&mut self, parent: Option<&K>, mut node: Node<K>) -> &mut Self {
        if self.nodes.contains_key(&node.key) {
            panic!("StaticCollection: duplicate key {:?}", node.key);
        }
        match parent {
            Some(parent) => {
                if !self.nodes.contains_key(parent) {
                    panic!("StaticCollection: unknown parent key {parent:?}");
                }
                node.parent_key = Some(parent.clone());
                self.children
                    .entry(parent.clone())
                    .or_default()
                    .push(node.key.clone());
            }
            None => {
                node.parent_key = None;
                self.roots.push(node.key.clone());
            }
        }
        if node.node_type == NodeType::Item {
            self.size += 1;
        }
        self.nodes.insert(node.key.clone(), node);
        self
    }

    pub fn push_item(&mut self, parent: Option<&K>, key: K) -> &mut Self {
        self.push(parent, Node::item(key))
    }

    /// Appends a section with an optional sticky heading and its items.
    pub fn push_section(
        &mut self,
        key: K,
        header: Option<K>,
        items: impl IntoIterator<Item = K>,
    ) -> &mut Self {
        self.push(None, Node::new(NodeType::Section, key.clone()));
        if let Some(header) = header {
            self.push(Some(&key), Node::new(NodeType::Header, header));
        }
        for item in items {
            self.push(Some(&key), Node::item(item));
        }
        self
    }

    pub fn push_loader(&mut self, parent: Option<&K>, key: K) -> &mut Self {
        self.push(parent, Node::new(NodeType::Loader, key))
    }

    /// Appends a leaf column to a header row and registers its width constraints.
    pub fn push_column(
        &mut self,
        header_row: &K,
        key: K,
        constraints: ColumnConstraints,
    ) -> &mut Self {
        let index = self.columns.len();
        self.push(
            Some(header_row),
            Node::new(NodeType::Column, key.clone()).with_col_index(index),
        );
        self.columns.push(key.clone());
        self.constraints.insert(key, constraints);
        self
    }

    /// Appends a body row whose cells map one-to-one onto the columns.
    pub fn push_row(
        &mut self,
        body: &K,
        key: K,
        cells: impl IntoIterator<Item = K>,
    ) -> &mut Self {
        self.push(Some(body), Node::item(key.clone()));
        for (index, cell) in cells.into_iter().enumerate() {
            self.push(
                Some(&key),
                Node::new(NodeType::Cell, cell).with_col_index(index),
            );
        }
        self
    }

    pub fn set_row_header_columns(&mut self, keys: impl IntoIterator<Item = K>) -> &mut Self {
        self.row_headers = keys.into_iter().collect();
        self
    }

    pub fn set_column_constraints(&mut self, key: K, constraints: ColumnConstraints) -> &mut Self {
        self.constraints.insert(key, constraints);
        self
    }

    pub fn into_shared(self) -> SharedCollection<K>
    where
        K: Send + Sync,
    {
        Arc::new(self)
    }
}

impl<K: LayoutKey> Collection<K> for StaticCollection<K> {
    fn root_keys(&self) -> &[K] {
        &self.roots
    }

    fn child_keys(&self, key: &K) -> &[K] {
        self.children.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn item(&self, key: &K) -> Option<&Node<K>> {
        self.nodes.get(key)
    }

    fn size(&self) -> usize {
        self.size
    }

    fn columns(&self) -> &[K] {
        &self.columns
    }

    fn row_header_column_keys(&self) -> &[K] {
        &self.row_headers
    }

    fn column_constraints(&self, key: &K) -> ColumnConstraints {
        self.constraints.get(key).cloned().unwrap_or_default()
    }
}
