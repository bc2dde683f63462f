//! Terminal buffer: viewport + scrollback with line-wrap reflow.
//!
//! ## Design
//!
//! The buffer owns a bounded [`History`] of lines. The viewport is the
//! `rows`-high window whose top sits at `ybase` when scrolled to the
//! bottom and at `ydisp` as currently displayed. The cursor `(x, y)`
//! is viewport-relative (`y` counts from `ybase`).
//!
//! Content writes land at the cursor; overflowing the column count
//! creates continuation rows linked to their logical head. Resizing
//! with a changed column count repartitions every affected wrap chain
//! (see [`mod@self`] / the `reflow` submodule) while keeping cursor,
//! saved cursor, and markers anchored to the same logical content.
//!
//! ## Invariants
//!
//! - `0 <= y < rows`, `0 <= ydisp <= ybase`
//! - `ybase + rows <= history.len()` after any public operation
//! - wide cells are always paired with their placeholder
//! - continuation rows have strictly increasing `start_column`
//!
//! Checked by [`Buffer::assert_invariants`] in debug builds.

mod reflow;

use tracing::debug;

use crate::cell::{Cell, PackedColor};
use crate::config::BufferConfig;
use crate::extra::{ExtendedAttrTable, ExtendedAttrs, ExtendedId};
use crate::history::History;
use crate::line::Line;
use crate::marker::Marker;
use crate::unicode::UnicodeWidth;

/// Error type for buffer operations.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    /// `resize` was called with a zero dimension.
    #[error("invalid dimensions: {cols}x{rows}")]
    InvalidDimension {
        /// Requested column count.
        cols: u16,
        /// Requested row count.
        rows: u16,
    },
}

/// Saved cursor state (DECSC/DECRC).
#[derive(Debug, Clone, Copy, Default)]
struct SavedCursor {
    /// Saved column.
    x: u16,
    /// Saved absolute history row.
    row: usize,
    /// Whether a saved cursor exists.
    valid: bool,
}

/// Terminal screen buffer with scrollback and reflow.
#[derive(Debug)]
pub struct Buffer {
    lines: History,
    cols: u16,
    rows: u16,
    /// Absolute row of the viewport top when scrolled to the bottom.
    ybase: usize,
    /// Absolute row of the viewport top as currently displayed.
    ydisp: usize,
    /// Cursor column.
    x: u16,
    /// Cursor row, relative to `ybase`.
    y: u16,
    saved: SavedCursor,
    scroll_top: u16,
    scroll_bottom: u16,
    tab_stops: Vec<bool>,
    extended: ExtendedAttrTable,
    cur_fg: PackedColor,
    cur_bg: PackedColor,
    cur_extended: ExtendedId,
    config: BufferConfig,
}

impl Buffer {
    /// Create a buffer with the default configuration.
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        Self::with_config(rows, cols, BufferConfig::default())
    }

    /// Create a buffer with an explicit configuration.
    #[must_use]
    pub fn with_config(rows: u16, cols: u16, config: BufferConfig) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let max_length = (rows as usize).saturating_add(config.scrollback);
        let mut buffer = Self {
            lines: History::new(max_length),
            cols,
            rows,
            ybase: 0,
            ydisp: 0,
            x: 0,
            y: 0,
            saved: SavedCursor::default(),
            scroll_top: 0,
            scroll_bottom: rows - 1,
            tab_stops: Self::default_tab_stops(cols, config.tab_width),
            extended: ExtendedAttrTable::new(),
            cur_fg: PackedColor::DEFAULT,
            cur_bg: PackedColor::DEFAULT,
            cur_extended: ExtendedId::NONE,
            config,
        };
        buffer.fill_viewport_rows();
        buffer
    }

    fn default_tab_stops(cols: u16, tab_width: u16) -> Vec<bool> {
        let tab_width = tab_width.max(1);
        (0..cols).map(|c| c > 0 && c % tab_width == 0).collect()
    }

    /// Fill the viewport with blank logical lines if the history is
    /// empty.
    pub fn fill_viewport_rows(&mut self) {
        if self.lines.is_empty() {
            for _ in 0..self.rows {
                self.lines.push(Line::new(self.cols));
            }
        }
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// Number of columns.
    #[must_use]
    #[inline]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Number of viewport rows.
    #[must_use]
    #[inline]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Absolute row of the viewport top when scrolled to the bottom.
    #[must_use]
    #[inline]
    pub fn ybase(&self) -> usize {
        self.ybase
    }

    /// Absolute row of the viewport top as currently displayed.
    #[must_use]
    #[inline]
    pub fn ydisp(&self) -> usize {
        self.ydisp
    }

    /// Cursor column.
    #[must_use]
    #[inline]
    pub fn cursor_x(&self) -> u16 {
        self.x
    }

    /// Cursor row, relative to `ybase`.
    #[must_use]
    #[inline]
    pub fn cursor_y(&self) -> u16 {
        self.y
    }

    /// Total lines currently held (scrollback + viewport).
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the history holds no lines (only before the first
    /// viewport fill).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Maximum lines the history may hold.
    #[must_use]
    #[inline]
    pub fn max_length(&self) -> usize {
        self.lines.max_length()
    }

    /// The buffer configuration.
    #[must_use]
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Get a line by absolute history index.
    #[must_use]
    pub fn get_line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// Check if the cursor is within the displayed viewport.
    #[must_use]
    pub fn is_cursor_in_viewport(&self) -> bool {
        let absolute = self.ybase + usize::from(self.y);
        absolute >= self.ydisp && absolute < self.ydisp + usize::from(self.rows)
    }

    /// The extended attribute table.
    #[must_use]
    pub fn extended_attrs(&self) -> &ExtendedAttrTable {
        &self.extended
    }

    // -------------------------------------------------------------------
    // Attributes and writing
    // -------------------------------------------------------------------

    /// Set the active colors for subsequent writes.
    pub fn set_attrs(&mut self, fg: PackedColor, bg: PackedColor) {
        self.cur_fg = fg;
        self.cur_bg = bg;
    }

    /// Set the active extended attributes for subsequent writes.
    pub fn set_extended_attrs(&mut self, attrs: ExtendedAttrs) {
        self.cur_extended = self.extended.intern(attrs);
    }

    fn cursor_abs(&self) -> usize {
        self.ybase + usize::from(self.y)
    }

    /// Write one character at the cursor.
    ///
    /// `width` is the character's display width as classified by the
    /// external width function: 0 joins the preceding cell, 2 occupies
    /// two columns (wrapping early rather than splitting the pair).
    pub fn write_char(&mut self, ch: char, width: u8) {
        if width == 0 {
            self.attach_combining(ch);
            return;
        }

        if u32::from(self.x) + u32::from(width) > u32::from(self.cols) {
            self.wrap_cursor_line();
        }

        let cell = Cell::with_attrs(ch, width, self.cur_fg, self.cur_bg, self.cur_extended);
        let abs = self.cursor_abs();
        if let Some(line) = self.lines.get_mut(abs) {
            line.set_cell(self.x, cell);
        }
        self.x += u16::from(width);

        let head = self.chain_head(abs);
        self.rebuild_chain(head);
    }

    /// Write a string, classifying widths through `widths`.
    pub fn write_str_with<W: UnicodeWidth + ?Sized>(&mut self, s: &str, widths: &W) {
        for ch in s.chars() {
            self.write_char(ch, widths.char_width(ch));
        }
    }

    /// Attach a zero-width codepoint to the cell left of the cursor.
    fn attach_combining(&mut self, ch: char) {
        if self.x == 0 {
            return;
        }
        let abs = self.cursor_abs();
        let mut col = self.x - 1;
        let Some(line) = self.lines.get_mut(abs) else {
            return;
        };
        if line.get(col).is_some_and(Cell::is_wide_continuation) && col > 0 {
            col -= 1;
        }
        let Some(base) = line.get(col) else { return };
        if !base.has_content() {
            return;
        }
        let mut cluster = match line.combined(col) {
            Some(existing) => existing.to_string(),
            None => base.char().to_string(),
        };
        cluster.push(ch);
        line.set_combined(col, cluster);
    }

    /// Move the cursor to the start of a fresh continuation row.
    fn wrap_cursor_line(&mut self) {
        if self.y == self.scroll_bottom {
            self.scroll(true);
        } else {
            self.y = (self.y + 1).min(self.rows - 1);
            let abs = self.cursor_abs();
            self.set_wrapped(abs, true);
        }
        self.x = 0;
    }

    /// Carriage return: cursor to column 0.
    #[inline]
    pub fn carriage_return(&mut self) {
        self.x = 0;
    }

    /// Backspace: cursor left by one column.
    #[inline]
    pub fn backspace(&mut self) {
        self.x = self.x.saturating_sub(1);
    }

    /// Line feed: cursor down one row, scrolling at the bottom of the
    /// scroll region.
    pub fn line_feed(&mut self) {
        if self.y == self.scroll_bottom {
            self.scroll(false);
        } else if self.y < self.rows - 1 {
            self.y += 1;
        }
    }

    /// Scroll the content up by one row.
    ///
    /// With the full screen as scroll region this feeds a fresh line
    /// into the history (evicting the oldest at capacity); a restricted
    /// region rotates rows in place without touching scrollback.
    /// `wrapped` marks the fresh bottom row as a continuation row.
    fn scroll(&mut self, wrapped: bool) {
        if self.scroll_top == 0 && self.scroll_bottom == self.rows - 1 {
            let was_at_bottom = self.ydisp == self.ybase;
            let evicting = self.lines.is_full();
            self.lines.push(Line::new(self.cols));
            if evicting {
                if self.saved.valid {
                    self.saved.row = self.saved.row.saturating_sub(1);
                }
                self.ydisp = self.ydisp.saturating_sub(1);
                self.repair_head();
            } else {
                self.ybase += 1;
                if was_at_bottom {
                    self.ydisp = self.ybase;
                }
            }
        } else {
            self.scroll_region_up(1);
        }

        if wrapped {
            let abs = self.ybase + usize::from(self.scroll_bottom);
            self.set_wrapped(abs, true);
        }
    }

    /// Rotate rows up within the scroll region, dropping the top row
    /// and inserting a blank at the bottom. No history involvement.
    pub fn scroll_region_up(&mut self, n: u16) {
        let top = self.ybase + usize::from(self.scroll_top);
        let bottom = self.ybase + usize::from(self.scroll_bottom);
        let n = usize::from(n).min(bottom - top + 1);
        for _ in 0..n {
            for idx in top..bottom {
                let next = std::mem::replace(
                    self.lines.get_mut(idx + 1).expect("row in region"),
                    Line::new(self.cols),
                );
                self.lines.set(idx, next);
            }
            self.lines.set(bottom, Line::new(self.cols));
        }
    }

    /// Set the scroll region (top and bottom rows, inclusive).
    ///
    /// Invalid bounds reset the region to the full screen.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        if top < bottom && bottom < self.rows {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        } else {
            self.scroll_top = 0;
            self.scroll_bottom = self.rows - 1;
        }
    }

    // -------------------------------------------------------------------
    // Display scrolling
    // -------------------------------------------------------------------

    /// Scroll the display by `delta` rows (positive shows older
    /// content).
    pub fn scroll_display(&mut self, delta: i64) {
        let current = i64::try_from(self.ydisp).unwrap_or(i64::MAX);
        let target = (current - delta).max(0);
        let target = usize::try_from(target).unwrap_or(0);
        self.ydisp = target.min(self.ybase);
    }

    /// Scroll the display to the live bottom.
    pub fn scroll_to_bottom(&mut self) {
        self.ydisp = self.ybase;
    }

    /// Scroll the display to the oldest retained row.
    pub fn scroll_to_top(&mut self) {
        self.ydisp = 0;
    }

    // -------------------------------------------------------------------
    // Cursor save/restore
    // -------------------------------------------------------------------

    /// Save the cursor position (DECSC).
    pub fn save_cursor(&mut self) {
        self.saved = SavedCursor {
            x: self.x,
            row: self.cursor_abs(),
            valid: true,
        };
    }

    /// Restore the saved cursor position (DECRC). No-op if no cursor
    /// was saved.
    pub fn restore_cursor(&mut self) {
        if !self.saved.valid {
            return;
        }
        let rel = self.saved.row.saturating_sub(self.ybase);
        self.y = u16::try_from(rel).unwrap_or(u16::MAX).min(self.rows - 1);
        self.x = self.saved.x.min(self.cols - 1);
    }

    // -------------------------------------------------------------------
    // Tab stops
    // -------------------------------------------------------------------

    /// Move the cursor to the next tab stop (or the last column).
    pub fn tab(&mut self) {
        self.x = self.next_stop(self.x);
    }

    /// Move the cursor to the previous tab stop (or column 0).
    pub fn back_tab(&mut self) {
        self.x = self.prev_stop(self.x);
    }

    /// Column of the next tab stop after `from`.
    #[must_use]
    pub fn next_stop(&self, from: u16) -> u16 {
        for col in usize::from(from) + 1..usize::from(self.cols) {
            if self.tab_stops[col] {
                return u16::try_from(col).unwrap_or(u16::MAX);
            }
        }
        self.cols - 1
    }

    /// Column of the previous tab stop before `from`.
    #[must_use]
    pub fn prev_stop(&self, from: u16) -> u16 {
        for col in (0..usize::from(from.min(self.cols))).rev() {
            if self.tab_stops[col] {
                return u16::try_from(col).unwrap_or(u16::MAX);
            }
        }
        0
    }

    /// Set a tab stop at the cursor column.
    pub fn set_tab_stop(&mut self) {
        let col = usize::from(self.x);
        if col < self.tab_stops.len() {
            self.tab_stops[col] = true;
        }
    }

    /// Clear the tab stop at the cursor column.
    pub fn clear_tab_stop(&mut self) {
        let col = usize::from(self.x);
        if col < self.tab_stops.len() {
            self.tab_stops[col] = false;
        }
    }

    /// Clear all tab stops.
    pub fn clear_all_tab_stops(&mut self) {
        self.tab_stops.fill(false);
    }

    // -------------------------------------------------------------------
    // Wrap linkage
    // -------------------------------------------------------------------

    /// Absolute index of the logical head of the chain containing
    /// `index`.
    #[must_use]
    pub fn chain_head(&self, index: usize) -> usize {
        let mut head = index;
        while head > 0 && self.lines.get(head).is_some_and(Line::is_wrapped) {
            head -= 1;
        }
        head
    }

    /// Absolute index of the last row of the chain whose head is at or
    /// before `index` (inclusive).
    #[must_use]
    pub fn chain_end(&self, index: usize) -> usize {
        let mut end = index;
        while self.lines.get(end + 1).is_some_and(Line::is_wrapped) {
            end += 1;
        }
        end
    }

    /// The `[first, last]` absolute rows of the paragraph containing
    /// `index`.
    #[must_use]
    pub fn wrapped_range_for_line(&self, index: usize) -> (usize, usize) {
        let first = self.chain_head(index);
        (first, self.chain_end(first))
    }

    /// Toggle the wrap flag of the row at `index`.
    ///
    /// Setting it re-parents the row (and its trailing continuations)
    /// under the chain above; clearing it splits the row off as a
    /// fresh logical line. Row 0 can never be wrapped. Both chains'
    /// offsets and logical widths are rebuilt.
    pub fn set_wrapped(&mut self, index: usize, wrapped: bool) {
        if index >= self.lines.len() || (wrapped && index == 0) {
            return;
        }
        let currently = self.lines.get(index).is_some_and(Line::is_wrapped);
        if currently == wrapped {
            return;
        }

        if wrapped {
            let Some(line) = self.lines.get_mut(index) else {
                return;
            };
            line.make_wrapped(0);
            let head = self.chain_head(index);
            self.rebuild_chain(head);
        } else {
            let Some(line) = self.lines.get_mut(index) else {
                return;
            };
            line.make_logical(0);
            self.rebuild_chain(index);
            if index > 0 {
                let upper_head = self.chain_head(index - 1);
                self.rebuild_chain(upper_head);
            }
        }
    }

    /// Content length this row contributes to its chain.
    ///
    /// Interior rows contribute their full width, minus one when they
    /// end in a blank that exists only because the next row starts
    /// with a wide character that would not split. The last row
    /// contributes its trimmed length.
    ///
    /// Measured against the buffer's column count rather than the
    /// row's cell count: during a grow-resize rows are widened before
    /// chains are repartitioned, and content still ends at the old
    /// width.
    fn row_content_len(&self, index: usize, chain_end: usize) -> usize {
        let Some(line) = self.lines.get(index) else {
            return 0;
        };
        if index >= chain_end {
            return usize::from(line.trimmed_length()).min(usize::from(self.cols));
        }
        let cols = usize::from(self.cols.min(line.len()));
        if cols == 0 {
            return 0;
        }
        let last_col = u16::try_from(cols - 1).unwrap_or(u16::MAX);
        let last = line.get(last_col);
        let ends_blank = last.is_some_and(|c| !c.occupies() && c.width() == 1);
        let next_starts_wide = self
            .lines
            .get(index + 1)
            .and_then(|l| l.get(0))
            .is_some_and(Cell::is_wide);
        if ends_blank && next_starts_wide {
            cols - 1
        } else {
            cols
        }
    }

    /// Recompute `start_column` for every continuation row of the
    /// chain at `head` and the head's `logical_width`.
    fn rebuild_chain(&mut self, head: usize) {
        let end = self.chain_end(head);
        let mut offset = 0usize;
        for idx in head..=end {
            if idx > head {
                if let Some(line) = self.lines.get_mut(idx) {
                    line.make_wrapped(offset);
                }
            }
            offset += self.row_content_len(idx, end);
        }
        if let Some(line) = self.lines.get_mut(head) {
            line.set_logical_width(offset);
        }
    }

    // -------------------------------------------------------------------
    // Markers
    // -------------------------------------------------------------------

    /// Register a marker anchored at absolute line `line`.
    ///
    /// The marker re-anchors automatically on trims, inserts, and
    /// deletes, and is disposed when its line leaves the history.
    pub fn add_marker(&mut self, line: usize) -> Marker {
        self.lines.add_marker(line)
    }

    // -------------------------------------------------------------------
    // Rendering access
    // -------------------------------------------------------------------

    /// Render a history line to a string.
    ///
    /// Returns an empty string for out-of-range indices.
    #[must_use]
    pub fn translate_buffer_line_to_string(
        &self,
        index: usize,
        trim_right: bool,
        start_col: u16,
        end_col: Option<u16>,
    ) -> String {
        match self.lines.get(index) {
            Some(line) => line.translate_to_string(trim_right, start_col, end_col),
            None => String::new(),
        }
    }

    /// Render the logical (unwrapped) content of the whole buffer, one
    /// string per paragraph, trailing blanks trimmed.
    #[must_use]
    pub fn logical_content(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut index = 0;
        while index < self.lines.len() {
            let end = self.chain_end(index);
            let mut paragraph = String::new();
            for row in index..=end {
                let len = self.row_content_len(row, end);
                let text = self.translate_buffer_line_to_string(
                    row,
                    false,
                    0,
                    Some(u16::try_from(len).unwrap_or(u16::MAX)),
                );
                paragraph.push_str(&text);
            }
            let trimmed = paragraph.trim_end_matches(' ').len();
            paragraph.truncate(trimmed);
            out.push(paragraph);
            index = end + 1;
        }
        out
    }

    // -------------------------------------------------------------------
    // Clear and resize
    // -------------------------------------------------------------------

    /// Reset to a single-viewport-height buffer of blank logical
    /// lines with the cursor at the origin.
    ///
    /// All registered markers are disposed: their anchors refer to
    /// discarded content.
    pub fn clear(&mut self) {
        let max_length = (self.rows as usize).saturating_add(self.config.scrollback);
        self.lines.trim_start(self.lines.len());
        self.lines = History::new(max_length);
        self.extended.clear();
        self.ybase = 0;
        self.ydisp = 0;
        self.x = 0;
        self.y = 0;
        self.saved = SavedCursor::default();
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
        self.tab_stops = Self::default_tab_stops(self.cols, self.config.tab_width);
        self.fill_viewport_rows();
    }

    /// Resize the buffer, reflowing wrap chains when the column count
    /// changes (unless disabled by configuration).
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidDimension`] for zero dimensions;
    /// the buffer is left unchanged.
    pub fn resize(&mut self, new_cols: u16, new_rows: u16) -> Result<(), BufferError> {
        if new_cols == 0 || new_rows == 0 {
            return Err(BufferError::InvalidDimension {
                cols: new_cols,
                rows: new_rows,
            });
        }
        let new_max = (new_rows as usize).saturating_add(self.config.scrollback);
        if new_cols == self.cols && new_rows == self.rows && new_max == self.lines.max_length() {
            return Ok(());
        }
        debug!(
            old_cols = self.cols,
            old_rows = self.rows,
            new_cols,
            new_rows,
            "resizing buffer"
        );

        let old_cols = self.cols;
        let old_rows = self.rows;

        // Grow capacity first so nothing is lost before content moves.
        if new_max > self.lines.max_length() {
            self.lines.set_max_length(new_max);
        }

        // Widen rows before anything shifts; narrowing happens after
        // reflow so no content is cut prematurely.
        if new_cols > old_cols {
            for idx in 0..self.lines.len() {
                if let Some(line) = self.lines.get_mut(idx) {
                    line.resize(new_cols, Cell::BLANK);
                }
            }
        }

        // Mark chains whose wrap boundaries the new width invalidates.
        let mut first_reflow = None;
        if new_cols != old_cols {
            let mut idx = 0;
            while idx < self.lines.len() {
                let end = self.chain_end(idx);
                let logical_width = self.lines.get(idx).map_or(0, Line::logical_width);
                if end > idx || logical_width > usize::from(new_cols) {
                    if let Some(line) = self.lines.get_mut(idx) {
                        line.set_reflow_needed(true);
                    }
                    first_reflow.get_or_insert(idx);
                }
                idx = end + 1;
            }
        }

        // Viewport row-count changes.
        let mut add_to_y = 0u16;
        if new_rows > old_rows {
            for _ in old_rows..new_rows {
                if self.lines.len() < usize::from(new_rows) + self.ybase {
                    if self.config.windows_mode {
                        // conpty reprints its own view; always extend.
                        self.lines.push(Line::new(new_cols.max(old_cols)));
                    } else if self.ybase > 0
                        && self.lines.len() <= self.ybase + usize::from(self.y) + usize::from(add_to_y) + 1
                    {
                        // Room above and no blanks below the cursor:
                        // reveal scrollback instead of adding lines.
                        self.ybase -= 1;
                        add_to_y += 1;
                        if self.ydisp > 0 {
                            self.ydisp -= 1;
                        }
                    } else {
                        self.lines.push(Line::new(new_cols.max(old_cols)));
                    }
                }
            }
        } else {
            for _ in new_rows..old_rows {
                if self.lines.len() > usize::from(new_rows) + self.ybase {
                    if self.lines.len() > self.ybase + usize::from(self.y) + 1 {
                        // Blank line below the cursor; drop it.
                        self.lines.pop();
                    } else {
                        // Cursor sits on the last line; scroll down.
                        self.ybase += 1;
                        self.ydisp += 1;
                    }
                }
            }
        }

        // Shrink capacity after the adjustments above, trimming the
        // oldest rows.
        if new_max < self.lines.max_length() {
            let amount = self.lines.len().saturating_sub(new_max);
            if amount > 0 {
                self.lines.trim_start(amount);
                self.ybase = self.ybase.saturating_sub(amount);
                self.ydisp = self.ydisp.saturating_sub(amount);
                self.saved.row = self.saved.row.saturating_sub(amount);
                first_reflow = first_reflow.map(|idx| idx.saturating_sub(amount));
                self.repair_head();
            }
            self.lines.set_max_length(new_max);
        }

        self.y = (self.y.min(new_rows - 1) + add_to_y).min(new_rows - 1);
        self.scroll_top = 0;
        self.scroll_bottom = new_rows - 1;
        self.rows = new_rows;

        if new_cols != old_cols {
            if self.config.reflow_enabled() {
                if let Some(start) = first_reflow {
                    self.reflow_region(start, new_cols, new_rows);
                }
            }
            // Narrow rows now that chains are repartitioned (or reflow
            // is disabled and hard-wrapped rows simply truncate).
            if new_cols < old_cols {
                for idx in 0..self.lines.len() {
                    if let Some(line) = self.lines.get_mut(idx) {
                        line.resize(new_cols, Cell::BLANK);
                    }
                }
            }
            if new_cols > old_cols {
                let old_len = self.tab_stops.len();
                let tab_width = usize::from(self.config.tab_width.max(1));
                self.tab_stops.resize(usize::from(new_cols), false);
                for col in old_len..self.tab_stops.len() {
                    self.tab_stops[col] = col > 0 && col % tab_width == 0;
                }
            } else {
                self.tab_stops.truncate(usize::from(new_cols));
            }
        }

        self.cols = new_cols;
        // Clamped only now: reflow re-anchors the cursor from its
        // pre-clamp logical offset.
        self.x = self.x.min(new_cols);
        self.saved.x = self.saved.x.min(new_cols.saturating_sub(1));
        self.fixup_positions();
        Ok(())
    }

    /// Promote a headless continuation row at index 0 (left behind by
    /// a trim that cut through a wrap chain) to a logical head.
    fn repair_head(&mut self) {
        if self.lines.get(0).is_some_and(Line::is_wrapped) {
            if let Some(first) = self.lines.get_mut(0) {
                first.make_logical(0);
            }
            self.rebuild_chain(0);
        }
    }

    /// Post-resize fix-up: drop removable blank lines beyond the
    /// viewport, pad the history up to the viewport height, and clamp
    /// cursor and display offsets back into range.
    fn fixup_positions(&mut self) {
        let rows = usize::from(self.rows);
        let cursor_abs = self.cursor_abs();
        let saved_abs = if self.saved.valid {
            Some(self.saved.row)
        } else {
            None
        };

        // Pop trailing blank logical lines beyond the viewport unless
        // a cursor is anchored there.
        while self.lines.len() > self.ybase + rows && self.lines.len() > rows {
            let last = self.lines.len() - 1;
            let removable = self
                .lines
                .get(last)
                .is_some_and(|l| !l.is_wrapped() && l.is_blank())
                && cursor_abs != last
                && saved_abs != Some(last);
            if !removable {
                break;
            }
            self.lines.pop();
        }

        // Keep the viewport within capacity.
        let max_ybase = self.lines.max_length().saturating_sub(rows);
        self.ybase = self.ybase.min(max_ybase);

        // Pad until the viewport is backed by real lines.
        while self.lines.len() < self.ybase + rows {
            self.lines.push(Line::new(self.cols));
        }

        // Clamp the cursor into the viewport by shifting ybase.
        let cursor_abs = cursor_abs.min(self.lines.len().saturating_sub(1));
        if cursor_abs < self.ybase {
            self.ybase = cursor_abs;
        } else if cursor_abs >= self.ybase + rows {
            self.ybase = cursor_abs - rows + 1;
        }
        self.y = u16::try_from(cursor_abs - self.ybase).unwrap_or(u16::MAX);
        self.ydisp = self.ydisp.min(self.ybase);
        if self.saved.valid {
            self.saved.row = self.saved.row.min(self.lines.len().saturating_sub(1));
        }
    }

    /// Validate buffer invariants in debug builds.
    ///
    /// # Panics
    ///
    /// Panics in debug builds when an invariant is violated. Does
    /// nothing in release builds.
    pub fn assert_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            assert!(self.y < self.rows, "cursor row {} >= rows {}", self.y, self.rows);
            assert!(self.x <= self.cols, "cursor col {} > cols {}", self.x, self.cols);
            assert!(
                self.ydisp <= self.ybase,
                "ydisp {} > ybase {}",
                self.ydisp,
                self.ybase
            );
            assert!(
                self.ybase + usize::from(self.rows) <= self.lines.len(),
                "viewport {}..{} not backed by history of {}",
                self.ybase,
                self.ybase + usize::from(self.rows),
                self.lines.len()
            );
            assert!(
                self.lines.len() <= self.lines.max_length(),
                "history over capacity"
            );

            for idx in 0..self.lines.len() {
                let line = self.lines.get(idx).expect("indexed line");
                for col in 0..line.len().saturating_sub(1) {
                    let cell = line.get(col).expect("indexed cell");
                    if cell.is_wide() {
                        assert!(
                            line.get(col + 1).is_some_and(Cell::is_wide_continuation),
                            "wide cell at ({idx}, {col}) missing placeholder"
                        );
                    }
                }
                if line.is_wrapped() && idx > 0 {
                    let prev = self.lines.get(idx - 1).expect("indexed line");
                    if prev.is_wrapped() {
                        assert!(
                            prev.start_column() < line.start_column(),
                            "non-increasing start_column at {idx}"
                        );
                    }
                }
            }

            if let Some(first) = self.lines.get(0) {
                assert!(!first.is_wrapped(), "history starts with a wrapped row: {first:?}");
            }
        }
    }
}
