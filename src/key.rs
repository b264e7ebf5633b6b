#[cfg(not(feature = "std"))]
use alloc::collections::{BTreeMap, BTreeSet};
#[cfg(feature = "std")]
use std::collections::{HashMap, HashSet};

/// Map keyed by collection keys (`HashMap` with `std`, `BTreeMap` without).
#[cfg(feature = "std")]
pub type KeyMap<K, V> = HashMap<K, V>;
#[cfg(not(feature = "std"))]
pub type KeyMap<K, V> = BTreeMap<K, V>;

/// Set of collection keys, e.g. the persisted keys handed to a layout.
#[cfg(feature = "std")]
pub type KeySet<K> = HashSet<K>;
#[cfg(not(feature = "std"))]
pub type KeySet<K> = BTreeSet<K>;

/// Bounds required of collection keys.
#[cfg(feature = "std")]
pub trait LayoutKey: core::hash::Hash + Eq + Clone + core::fmt::Debug + 'static {}
#[cfg(feature = "std")]
impl<K: core::hash::Hash + Eq + Clone + core::fmt::Debug + 'static> LayoutKey for K {}

#[cfg(not(feature = "std"))]
pub trait LayoutKey: Ord + Clone + core::fmt::Debug + 'static {}
#[cfg(not(feature = "std"))]
impl<K: Ord + Clone + core::fmt::Debug + 'static> LayoutKey for K {}
