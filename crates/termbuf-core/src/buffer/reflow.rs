//! Wrap-chain repartitioning on column resize.
//!
//! ## Design
//!
//! One pass handles both growth and shrink. Every paragraph whose wrap
//! boundaries the new width invalidates is flattened to its logical
//! cell sequence, repartitioned at the new width (never splitting a
//! wide pair), and written back reusing the old row objects. The
//! cursor and saved cursor are carried through as logical offsets
//! within their paragraph, so they land on the same character after
//! the rows around them move.
//!
//! Structural deltas are recorded per paragraph at the position the
//! paragraph will occupy once all earlier deltas apply, the whole
//! region is committed with one suppressed-event splice, and the
//! recorded events are replayed in order afterwards. Markers therefore
//! see exactly the per-paragraph inserts and deletes, in top-to-bottom
//! order, against coordinates that are correct at each step.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::cell::Cell;
use crate::history::HistoryEvent;
use crate::line::Line;

use super::Buffer;

/// A paragraph flattened to its logical content.
struct FlatParagraph {
    cells: Vec<Cell>,
    /// Cluster strings keyed by logical offset.
    combined: Vec<(usize, String)>,
}

/// One row's slice of a repartitioned paragraph.
#[derive(Debug, Clone, Copy)]
struct Partition {
    start: usize,
    len: usize,
}

impl Buffer {
    /// Repartition every invalidated wrap chain in `[start, len)` for
    /// the new column count.
    ///
    /// Called from `resize` after capacity and row-count adjustments,
    /// before rows are narrowed. Rows still carry
    /// `max(old_cols, new_cols)` cells here.
    pub(super) fn reflow_region(&mut self, start: usize, new_cols: u16, new_rows: u16) {
        let old_len = self.lines.len();
        let pinned_to_bottom = self.ydisp == self.ybase;

        let cursor_abs = self.ybase + usize::from(self.y);
        let saved_abs = self.saved.valid.then_some(self.saved.row);

        let mut region: Vec<Line> = Vec::with_capacity(old_len - start);
        let mut events: Vec<HistoryEvent> = Vec::new();
        let mut delta: isize = 0;

        // Resolved positions after the splice, in post-reflow absolute
        // coordinates.
        let mut cursor_new = (cursor_abs, self.x);
        let mut saved_new = saved_abs.map(|row| (row, self.saved.x));

        let mut head = start;
        while head < old_len {
            let end = self.chain_end(head);
            let old_count = end - head + 1;
            let new_head_pos = usize::try_from(head as isize + delta).unwrap_or(0);

            if !self.lines.get(head).is_some_and(Line::reflow_needed) {
                // Boundaries still valid; the paragraph only shifts.
                if (head..=end).contains(&cursor_abs) {
                    cursor_new = (new_head_pos + (cursor_abs - head), self.x);
                }
                if let Some(row) = saved_abs {
                    if (head..=end).contains(&row) {
                        saved_new = Some((new_head_pos + (row - head), self.saved.x));
                    }
                }
                for idx in head..=end {
                    region.push(self.take_line(idx));
                }
                head = end + 1;
                continue;
            }

            let flat = self.flatten_paragraph(head, end);
            let partitions = partition_content(&flat.cells, new_cols);
            let new_count = partitions.len();

            if (head..=end).contains(&cursor_abs) {
                let offset = self
                    .lines
                    .get(cursor_abs)
                    .map_or(0, Line::start_column)
                    .saturating_add(usize::from(self.x))
                    .min(flat.cells.len());
                cursor_new = place_offset(&partitions, offset, new_cols, new_head_pos);
            }
            if let Some(row) = saved_abs {
                if (head..=end).contains(&row) {
                    let offset = self
                        .lines
                        .get(row)
                        .map_or(0, Line::start_column)
                        .saturating_add(usize::from(self.saved.x))
                        .min(flat.cells.len());
                    saved_new = Some(place_offset(&partitions, offset, new_cols, new_head_pos));
                }
            }

            if new_count > old_count {
                events.push(HistoryEvent::Insert {
                    index: new_head_pos + old_count,
                    amount: new_count - old_count,
                });
            } else if new_count < old_count {
                events.push(HistoryEvent::Delete {
                    index: new_head_pos + new_count,
                    amount: old_count - new_count,
                });
            }
            delta += new_count as isize - old_count as isize;

            let mut reclaimed: Vec<Line> = (head..=end).map(|idx| self.take_line(idx)).collect();
            reclaimed.reverse();
            for (j, part) in partitions.iter().enumerate() {
                let husk = reclaimed.pop().unwrap_or_else(|| Line::new(new_cols));
                region.push(rebuild_row(husk, &flat, *part, j == 0, new_cols));
            }

            head = end + 1;
        }

        trace!(
            start,
            old = old_len - start,
            new = region.len(),
            events = events.len(),
            "reflow repartitioned region"
        );

        // Trailing blank viewport filler is expendable when the region
        // grew past capacity.
        let max_length = self.lines.max_length();
        while start + region.len() > max_length {
            let last_abs = start + region.len() - 1;
            let removable = region
                .last()
                .is_some_and(|line| !line.is_wrapped() && line.is_blank())
                && cursor_new.0 != last_abs
                && saved_new.map_or(true, |(row, _)| row != last_abs);
            if !removable {
                break;
            }
            region.pop();
        }

        self.lines.splice_no_trim(start, old_len - start, region, false);

        // Still over capacity: evict from the top like any other
        // overflow, markers included.
        let over = self.lines.len().saturating_sub(max_length);
        if over > 0 {
            self.lines.trim_start(over);
            self.repair_head();
            cursor_new.0 = cursor_new.0.saturating_sub(over);
            if let Some(saved) = &mut saved_new {
                saved.0 = saved.0.saturating_sub(over);
            }
        }

        for event in events {
            let event = if over > 0 {
                shift_event(event, over)
            } else {
                event
            };
            self.lines.fire_event(event);
        }

        // Re-anchor the viewport around the moved cursor.
        let rows = usize::from(new_rows);
        let cursor_abs = cursor_new.0.min(self.lines.len().saturating_sub(1));

        // Growth below the viewport: drop blank filler rows rather
        // than sliding content into scrollback.
        while self.lines.len() > self.ybase + rows {
            let last = self.lines.len() - 1;
            let removable = self
                .lines
                .get(last)
                .is_some_and(|line| !line.is_wrapped() && line.is_blank())
                && last != cursor_abs
                && saved_new.map_or(true, |(row, _)| row != last);
            if !removable {
                break;
            }
            self.lines.pop();
        }
        // Whatever still overhangs becomes scrollback; contraction
        // above the viewport reveals scrollback instead.
        if self.lines.len() != self.ybase + rows {
            self.ybase = self.lines.len().saturating_sub(rows);
        }
        if cursor_abs < self.ybase {
            self.ybase = cursor_abs;
        } else if cursor_abs >= self.ybase + rows {
            self.ybase = cursor_abs + 1 - rows;
        }

        let len = self.lines.len();
        self.y = u16::try_from(cursor_abs - self.ybase).unwrap_or(u16::MAX);
        self.x = cursor_new.1.min(new_cols);
        self.ydisp = if pinned_to_bottom {
            self.ybase
        } else {
            self.ydisp.min(self.ybase)
        };
        if let Some((row, x)) = saved_new {
            self.saved.row = row.min(len.saturating_sub(1));
            self.saved.x = x.min(new_cols.saturating_sub(1));
        }
    }

    /// Move the line at `index` out of the history, leaving an empty
    /// husk behind until the splice replaces the region.
    fn take_line(&mut self, index: usize) -> Line {
        match self.lines.get_mut(index) {
            Some(slot) => std::mem::replace(slot, Line::new(0)),
            None => Line::new(0),
        }
    }

    /// Flatten a chain into its logical cell sequence.
    ///
    /// Interior rows contribute `row_content_len` cells (full width,
    /// minus the pad blank before a wide wrap); the last row its
    /// trimmed content. Cluster strings are re-keyed by logical
    /// offset.
    fn flatten_paragraph(&self, head: usize, end: usize) -> FlatParagraph {
        let mut cells = Vec::new();
        let mut combined = Vec::new();
        for idx in head..=end {
            let take = self.row_content_len(idx, end);
            let Some(line) = self.lines.get(idx) else {
                continue;
            };
            for col in 0..take {
                let col16 = u16::try_from(col).unwrap_or(u16::MAX);
                let Some(cell) = line.get(col16) else { break };
                if cell.is_combined() {
                    if let Some(cluster) = line.combined(col16) {
                        combined.push((cells.len(), cluster.to_string()));
                    }
                }
                cells.push(*cell);
            }
        }
        FlatParagraph { cells, combined }
    }
}

/// Split logical content into rows of at most `cols` cells, never
/// splitting a wide cell from its placeholder.
///
/// Empty content yields a single empty partition. At `cols == 1` a
/// wide pair cannot be kept together and is split anyway rather than
/// looping.
fn partition_content(cells: &[Cell], cols: u16) -> SmallVec<[Partition; 4]> {
    let cols = usize::from(cols.max(1));
    let mut partitions = SmallVec::new();
    if cells.is_empty() {
        partitions.push(Partition { start: 0, len: 0 });
        return partitions;
    }
    let mut offset = 0;
    while offset < cells.len() {
        let mut take = cols.min(cells.len() - offset);
        if offset + take < cells.len() && cells[offset + take - 1].is_wide() {
            take -= 1;
        }
        if take == 0 {
            take = 1;
        }
        partitions.push(Partition { start: offset, len: take });
        offset += take;
    }
    partitions
}

/// Map a logical offset to `(absolute row, column)` within the
/// repartitioned paragraph.
fn place_offset(partitions: &[Partition], offset: usize, cols: u16, head_pos: usize) -> (usize, u16) {
    let mut row = 0;
    for (idx, part) in partitions.iter().enumerate() {
        if part.start <= offset {
            row = idx;
        } else {
            break;
        }
    }
    let col = (offset - partitions[row].start).min(usize::from(cols));
    (head_pos + row, u16::try_from(col).unwrap_or(u16::MAX))
}

/// Refill a reclaimed row with one partition's cells.
fn rebuild_row(mut row: Line, flat: &FlatParagraph, part: Partition, is_head: bool, cols: u16) -> Line {
    row.resize(cols, Cell::BLANK);
    row.clear();
    if is_head {
        row.make_logical(flat.cells.len());
    } else {
        row.make_wrapped(part.start);
    }

    let slice = &flat.cells[part.start..part.start + part.len];
    for (i, cell) in slice.iter().enumerate() {
        let col = u16::try_from(i).unwrap_or(u16::MAX);
        if let Some(slot) = row.get_mut(col) {
            *slot = *cell;
        }
    }
    // A forced split at cols == 1 can strand half a wide pair.
    if let Some(first) = row.get_mut(0) {
        if first.is_wide_continuation() {
            *first = Cell::BLANK;
        }
    }
    let last_col = u16::try_from(part.len.saturating_sub(1)).unwrap_or(u16::MAX);
    let placeholder_in_row = part.len >= 2
        && row.get(last_col).is_some_and(Cell::is_wide_continuation);
    if let Some(last) = row.get_mut(last_col) {
        if last.is_wide() && !placeholder_in_row && usize::from(last_col) + 1 >= usize::from(cols) {
            last.detach_wide();
        }
    }

    let mut map = FxHashMap::default();
    for (offset, cluster) in &flat.combined {
        if *offset >= part.start && *offset < part.start + part.len {
            let col = u16::try_from(offset - part.start).unwrap_or(u16::MAX);
            map.insert(col, cluster.clone());
        }
    }
    row.set_combined_map(map);
    row
}

/// Adjust a recorded event for lines evicted after it was recorded.
fn shift_event(event: HistoryEvent, trimmed: usize) -> HistoryEvent {
    match event {
        HistoryEvent::Trim(n) => HistoryEvent::Trim(n),
        HistoryEvent::Insert { index, amount } => HistoryEvent::Insert {
            index: index.saturating_sub(trimmed),
            amount,
        },
        HistoryEvent::Delete { index, amount } => HistoryEvent::Delete {
            index: index.saturating_sub(trimmed),
            amount,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn narrow(text: &str) -> Vec<Cell> {
        text.chars().map(|ch| Cell::new(ch, 1)).collect()
    }

    #[test]
    fn partition_exact_multiple() {
        let parts = partition_content(&narrow("abcdefgh"), 4);
        assert_eq!(parts.len(), 2);
        assert_eq!((parts[0].start, parts[0].len), (0, 4));
        assert_eq!((parts[1].start, parts[1].len), (4, 4));
    }

    #[test]
    fn partition_with_remainder() {
        let parts = partition_content(&narrow("abcdefghij"), 4);
        assert_eq!(parts.len(), 3);
        assert_eq!((parts[2].start, parts[2].len), (8, 2));
    }

    #[test]
    fn partition_empty_content_yields_one_row() {
        let parts = partition_content(&[], 10);
        assert_eq!(parts.len(), 1);
        assert_eq!((parts[0].start, parts[0].len), (0, 0));
    }

    #[test]
    fn partition_never_splits_wide_pair() {
        // "abc" + wide pair: the wide cell would land in the last
        // column, so the row breaks early.
        let mut cells = narrow("abc");
        let wide = Cell::new('漢', 2);
        cells.push(wide);
        cells.push(Cell::wide_placeholder(&wide));
        cells.extend(narrow("xy"));

        let parts = partition_content(&cells, 4);
        assert_eq!((parts[0].start, parts[0].len), (0, 3));
        assert_eq!((parts[1].start, parts[1].len), (3, 4));
    }

    #[test]
    fn partition_single_column_degenerate() {
        let wide = Cell::new('漢', 2);
        let cells = vec![wide, Cell::wide_placeholder(&wide)];
        let parts = partition_content(&cells, 1);
        // Forced split rather than an infinite loop.
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn place_offset_maps_to_row_and_column() {
        let parts = partition_content(&narrow("abcdefghij"), 4);
        assert_eq!(place_offset(&parts, 0, 4, 7), (7, 0));
        assert_eq!(place_offset(&parts, 5, 4, 7), (8, 1));
        assert_eq!(place_offset(&parts, 8, 4, 7), (9, 0));
        // One past the end of content stays writable on the last row.
        assert_eq!(place_offset(&parts, 10, 4, 7), (9, 2));
    }
}
