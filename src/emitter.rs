use core::ops::Range;

/// Emits child positions in ascending order without duplicates.
///
/// Visible-range results are the union of a contiguous binary-searched range with sorted
/// extras (sticky columns, persisted positions, a trailing loader). The emitter enforces the
/// merge contract:
/// - Out-of-bounds positions are ignored (and debug-asserted).
/// - Duplicates are ignored.
/// - Out-of-order positions are ignored (and debug-asserted).
pub(crate) struct IndexEmitter<'a> {
    len: usize,
    last: Option<usize>,
    emit: &'a mut dyn FnMut(usize),
}

impl<'a> IndexEmitter<'a> {
    pub(crate) fn new(len: usize, emit: &'a mut dyn FnMut(usize)) -> Self {
        Self {
            len,
            last: None,
            emit,
        }
    }

    pub(crate) fn emit(&mut self, pos: usize) {
        if pos >= self.len {
            vwarn!(pos, len = self.len, "child position out of bounds");
            debug_assert!(pos < self.len, "IndexEmitter: position {pos} >= len {}", self.len);
            return;
        }
        match self.last {
            Some(prev) if pos == prev => return,
            Some(prev) if pos < prev => {
                vwarn!(prev, next = pos, "child positions must ascend");
                debug_assert!(pos > prev, "IndexEmitter: position {pos} after {prev}");
                return;
            }
            _ => {}
        }
        self.last = Some(pos);
        (self.emit)(pos);
    }

    pub(crate) fn emit_range(&mut self, range: Range<usize>) {
        for pos in range.start..range.end.min(self.len) {
            self.emit(pos);
        }
    }

    /// Merges `range` with the non-decreasing `extras`, emitting each position once.
    pub(crate) fn emit_merged(
        &mut self,
        range: Range<usize>,
        extras: impl IntoIterator<Item = usize>,
    ) {
        let mut extras = extras.into_iter().peekable();
        while let Some(&e) = extras.peek() {
            if e >= range.start {
                break;
            }
            self.emit(e);
            extras.next();
        }
        self.emit_range(range.clone());
        for e in extras {
            if e >= range.end {
                self.emit(e);
            }
        }
    }
}
