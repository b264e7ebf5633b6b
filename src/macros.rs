#[cfg(feature = "tracing")]
macro_rules! vtrace {
    ($($tt:tt)*) => {
        tracing::trace!(target: "virtualizer_layout", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! vtrace {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! vdebug {
    ($($tt:tt)*) => {
        tracing::debug!(target: "virtualizer_layout", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! vdebug {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! vwarn {
    ($($tt:tt)*) => {
        tracing::warn!(target: "virtualizer_layout", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! vwarn {
    ($($tt:tt)*) => {};
}

/// Panics for collection shapes a layout cannot place.
///
/// Skipping such a node would shift every sibling index used by the range queries.
macro_rules! contract_violation {
    ($layout:expr, $node:expr) => {
        panic!(
            "{}: unsupported {:?} node (key={:?}, parent={:?})",
            $layout, $node.node_type, $node.key, $node.parent_key
        )
    };
    ($layout:expr, $($arg:tt)+) => {
        panic!("{}: {}", $layout, format_args!($($arg)+))
    };
}
