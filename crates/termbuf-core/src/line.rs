//! Buffer line: a fixed-width row of cells with wrap linkage metadata.
//!
//! ## Design
//!
//! A line is either *logical* (starts a paragraph) or *wrapped* (a
//! continuation row of the logical line above it). The two variants are
//! a tagged enum, not trait objects; call sites match explicitly.
//!
//! Continuation chains are contiguous in the history: the rows of one
//! paragraph are a logical head followed by the maximal run of wrapped
//! rows. A chain walk is therefore an adjacency scan and no stored link
//! can dangle when rows shift.
//!
//! Wide characters occupy two column slots. The line enforces the
//! pairing on every write: placing a wide cell also places its
//! placeholder, and overwriting either half detaches the other so no
//! orphaned half-wide cell survives.

use rustc_hash::FxHashMap;

use crate::cell::Cell;

/// Wrap-linkage variant of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Paragraph start. `logical_width` is the total content length of
    /// the paragraph across all its continuation rows.
    Logical {
        /// Total logical content length across the chain.
        logical_width: usize,
        /// Set when a column-count change invalidated the chain's wrap
        /// boundaries and the paragraph awaits repartitioning.
        reflow_needed: bool,
    },
    /// Continuation of the logical line above.
    Wrapped {
        /// Logical character offset at which this row's content begins
        /// within the parent paragraph.
        start_column: usize,
    },
}

/// One row of the buffer.
#[derive(Debug, Clone)]
pub struct Line {
    cells: Vec<Cell>,
    kind: LineKind,
    /// Overflow table for multi-codepoint clusters, keyed by column.
    combined: FxHashMap<u16, String>,
}

impl Line {
    /// Create a blank logical line of `cols` cells.
    #[must_use]
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::BLANK; usize::from(cols)],
            kind: LineKind::Logical {
                logical_width: 0,
                reflow_needed: false,
            },
            combined: FxHashMap::default(),
        }
    }

    /// Create a blank wrapped line of `cols` cells.
    #[must_use]
    pub fn new_wrapped(cols: u16, start_column: usize) -> Self {
        let mut line = Self::new(cols);
        line.kind = LineKind::Wrapped { start_column };
        line
    }

    /// Number of cells (the line's column width).
    #[must_use]
    #[inline]
    pub fn len(&self) -> u16 {
        self.cells.len().try_into().unwrap_or(u16::MAX)
    }

    /// Check if the line has zero columns.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The wrap-linkage variant.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> &LineKind {
        &self.kind
    }

    /// Check if this is a continuation row.
    #[must_use]
    #[inline]
    pub fn is_wrapped(&self) -> bool {
        matches!(self.kind, LineKind::Wrapped { .. })
    }

    /// Logical content offset of this row within its paragraph.
    ///
    /// Zero for logical heads.
    #[must_use]
    pub fn start_column(&self) -> usize {
        match self.kind {
            LineKind::Logical { .. } => 0,
            LineKind::Wrapped { start_column } => start_column,
        }
    }

    /// Total paragraph content length. Zero for wrapped rows.
    #[must_use]
    pub fn logical_width(&self) -> usize {
        match self.kind {
            LineKind::Logical { logical_width, .. } => logical_width,
            LineKind::Wrapped { .. } => 0,
        }
    }

    /// Check the reflow-needed flag (always false for wrapped rows).
    #[must_use]
    pub fn reflow_needed(&self) -> bool {
        matches!(
            self.kind,
            LineKind::Logical {
                reflow_needed: true,
                ..
            }
        )
    }

    /// Set or clear the reflow-needed flag on a logical head.
    pub fn set_reflow_needed(&mut self, needed: bool) {
        if let LineKind::Logical { reflow_needed, .. } = &mut self.kind {
            *reflow_needed = needed;
        }
    }

    /// Update the recorded paragraph width on a logical head.
    pub fn set_logical_width(&mut self, width: usize) {
        if let LineKind::Logical { logical_width, .. } = &mut self.kind {
            *logical_width = width;
        }
    }

    /// Convert this row into a logical head with the given width.
    pub fn make_logical(&mut self, logical_width: usize) {
        self.kind = LineKind::Logical {
            logical_width,
            reflow_needed: false,
        };
    }

    /// Convert this row into a continuation row at the given offset.
    pub fn make_wrapped(&mut self, start_column: usize) {
        self.kind = LineKind::Wrapped { start_column };
    }

    /// Get a cell by column.
    #[must_use]
    pub fn get(&self, col: u16) -> Option<&Cell> {
        self.cells.get(usize::from(col))
    }

    /// Get a mutable cell by column.
    ///
    /// Direct mutation bypasses the wide-pairing rules; use
    /// [`Line::set_cell`] for content writes.
    pub fn get_mut(&mut self, col: u16) -> Option<&mut Cell> {
        self.cells.get_mut(usize::from(col))
    }

    /// Copy out a cell by column.
    #[must_use]
    pub fn load_cell(&self, col: u16) -> Option<Cell> {
        self.get(col).copied()
    }

    /// The raw cell slice.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Write a cell, maintaining wide-character pairing.
    ///
    /// - Writing a wide cell at `col` also writes its placeholder at
    ///   `col + 1` (the previous occupant of that slot is detached
    ///   first).
    /// - Overwriting a wide cell clears its placeholder.
    /// - Overwriting a placeholder detaches the wide cell to its left.
    ///
    /// Out-of-range columns are ignored. A wide write at the last
    /// column is a caller bug (the buffer wraps before that happens).
    pub fn set_cell(&mut self, col: u16, cell: Cell) {
        let idx = usize::from(col);
        if idx >= self.cells.len() {
            return;
        }
        debug_assert!(
            !cell.is_wide() || idx + 1 < self.cells.len(),
            "wide cell written at last column {col}"
        );

        self.detach_at(col);
        self.combined.remove(&col);
        self.cells[idx] = cell;

        if cell.is_wide() && idx + 1 < self.cells.len() {
            let next = u16::try_from(idx + 1).unwrap_or(u16::MAX);
            self.detach_at(next);
            self.combined.remove(&next);
            self.cells[idx + 1] = Cell::wide_placeholder(&cell);
        }
    }

    /// Break up any wide pairing that involves the cell at `col`,
    /// leaving the slot itself untouched.
    fn detach_at(&mut self, col: u16) {
        let idx = usize::from(col);
        let old = self.cells[idx];
        if old.is_wide() && idx + 1 < self.cells.len() {
            self.cells[idx + 1] = Cell::BLANK;
        } else if old.is_wide_continuation() && idx > 0 {
            self.cells[idx - 1].detach_wide();
        }
    }

    /// Attach the full cluster string for a combined cell.
    pub fn set_combined(&mut self, col: u16, cluster: String) {
        if let Some(cell) = self.cells.get_mut(usize::from(col)) {
            cell.set_combined(true);
            self.combined.insert(col, cluster);
        }
    }

    /// Look up the cluster string of a combined cell.
    #[must_use]
    pub fn combined(&self, col: u16) -> Option<&str> {
        self.combined.get(&col).map(String::as_str)
    }

    /// The combined-overflow table.
    #[must_use]
    pub(crate) fn combined_map(&self) -> &FxHashMap<u16, String> {
        &self.combined
    }

    /// Replace the combined-overflow table wholesale (reflow commit).
    pub(crate) fn set_combined_map(&mut self, map: FxHashMap<u16, String>) {
        self.combined = map;
    }

    /// Resize to `new_cols`, truncating or padding with `fill`.
    ///
    /// No reflow happens here; repartitioning wrap chains is the
    /// buffer's job. Truncation that cuts a wide pair in half detaches
    /// the surviving left cell.
    pub fn resize(&mut self, new_cols: u16, fill: Cell) {
        let new_len = usize::from(new_cols);
        if new_len < self.cells.len() {
            self.cells.truncate(new_len);
            if let Some(last) = self.cells.last_mut() {
                if last.is_wide() {
                    last.detach_wide();
                }
                if last.is_wide_continuation() {
                    *last = Cell::BLANK;
                }
            }
            self.combined.retain(|&col, _| usize::from(col) < new_len);
        } else {
            self.cells.resize(new_len, fill);
        }
    }

    /// Index one past the last cell with content or a non-default
    /// background.
    #[must_use]
    pub fn trimmed_length(&self) -> u16 {
        for (idx, cell) in self.cells.iter().enumerate().rev() {
            if cell.occupies() {
                let end = idx + if cell.is_wide() { 2 } else { 1 };
                return u16::try_from(end.min(self.cells.len())).unwrap_or(u16::MAX);
            }
        }
        0
    }

    /// Check if the line holds no content at all.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.trimmed_length() == 0
    }

    /// Render a substring of the line.
    ///
    /// Placeholder halves of wide cells are skipped, combined cells are
    /// resolved through the overflow table, and empty cells render as
    /// spaces. `end_col` of `None` means the full width.
    #[must_use]
    pub fn translate_to_string(&self, trim_right: bool, start_col: u16, end_col: Option<u16>) -> String {
        let end = usize::from(end_col.unwrap_or_else(|| self.len())).min(self.cells.len());
        let start = usize::from(start_col).min(end);

        let mut out = String::with_capacity(end - start);
        for idx in start..end {
            let cell = &self.cells[idx];
            if cell.is_wide_continuation() {
                continue;
            }
            if cell.is_combined() {
                let col = u16::try_from(idx).unwrap_or(u16::MAX);
                match self.combined.get(&col) {
                    Some(cluster) => out.push_str(cluster),
                    None => out.push('\u{FFFD}'),
                }
            } else if cell.codepoint() == 0 {
                out.push(' ');
            } else {
                out.push(cell.char());
            }
        }

        if trim_right {
            let trimmed = out.trim_end_matches(' ').len();
            out.truncate(trimmed);
        }
        out
    }

    /// Reset every cell to blank and drop overflow data. The wrap
    /// linkage is left untouched.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
        self.combined.clear();
        if let LineKind::Logical { logical_width, .. } = &mut self.kind {
            *logical_width = 0;
        }
    }
}
