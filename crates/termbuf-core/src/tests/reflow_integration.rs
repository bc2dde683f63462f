//! Integration tests for resize reflow.
//!
//! These drive the full pipeline: write content through the cursor,
//! resize the buffer, and check wrap linkage, cursor anchoring, marker
//! re-anchoring, and rendered content.

use crate::buffer::Buffer;
use crate::cell::Cell;
use crate::config::{BufferConfig, WindowsPty, WindowsPtyBackend, CONPTY_REFLOW_MIN_BUILD};

fn ascii(buffer: &mut Buffer, text: &str) {
    buffer.write_str_with(text, &|_ch: char| 1u8);
}

fn crlf(buffer: &mut Buffer) {
    buffer.carriage_return();
    buffer.line_feed();
}

fn row_text(buffer: &Buffer, index: usize) -> String {
    buffer.translate_buffer_line_to_string(index, true, 0, None)
}

fn cursor_char(buffer: &Buffer) -> Option<char> {
    let abs = buffer.ybase() + usize::from(buffer.cursor_y());
    let col = buffer.cursor_x().checked_sub(1)?;
    let cell = buffer.get_line(abs)?.get(col)?;
    cell.has_content().then(|| cell.char())
}

// ============================================================================
// Shrink (wrap) and grow (unwrap)
// ============================================================================

#[test]
fn grow_merges_wrapped_rows() {
    let mut buffer = Buffer::new(5, 10);
    ascii(&mut buffer, "0123456789ABCDEFGHI"); // 19 chars -> 2 rows

    assert!(buffer.get_line(1).unwrap().is_wrapped());
    buffer.resize(19, 5).unwrap();

    assert_eq!(row_text(&buffer, 0), "0123456789ABCDEFGHI");
    assert!(!buffer.get_line(1).unwrap().is_wrapped());
    assert_eq!(buffer.get_line(0).unwrap().logical_width(), 19);
    buffer.assert_invariants();
}

#[test]
fn shrink_splits_into_continuation_rows() {
    let mut buffer = Buffer::new(5, 10);
    ascii(&mut buffer, "0123456789"); // exactly one full row
    crlf(&mut buffer);

    buffer.resize(4, 5).unwrap();

    assert_eq!(row_text(&buffer, 0), "0123");
    assert_eq!(row_text(&buffer, 1), "4567");
    assert_eq!(row_text(&buffer, 2), "89");
    assert!(buffer.get_line(1).unwrap().is_wrapped());
    assert!(buffer.get_line(2).unwrap().is_wrapped());
    assert_eq!(buffer.get_line(1).unwrap().start_column(), 4);
    assert_eq!(buffer.get_line(2).unwrap().start_column(), 8);
    assert_eq!(buffer.get_line(0).unwrap().logical_width(), 10);
    buffer.assert_invariants();
}

#[test]
fn hard_wrapped_lines_never_merge() {
    let mut buffer = Buffer::new(5, 10);
    ascii(&mut buffer, "aaaaaaaaa"); // 9 chars, no wrap
    crlf(&mut buffer);
    ascii(&mut buffer, "bbbbbbbbb");

    buffer.resize(40, 5).unwrap();

    assert_eq!(row_text(&buffer, 0), "aaaaaaaaa");
    assert_eq!(row_text(&buffer, 1), "bbbbbbbbb");
    assert!(!buffer.get_line(1).unwrap().is_wrapped());
    buffer.assert_invariants();
}

#[test]
fn shrink_then_grow_round_trips_content() {
    let mut buffer = Buffer::new(6, 20);
    ascii(&mut buffer, "the quick brown fox");
    crlf(&mut buffer);
    ascii(&mut buffer, "jumps");

    buffer.resize(7, 6).unwrap();
    buffer.resize(20, 6).unwrap();

    assert_eq!(buffer.logical_content()[0], "the quick brown fox");
    assert!(buffer
        .logical_content()
        .iter()
        .any(|line| line == "jumps"));
    buffer.assert_invariants();
}

#[test]
fn repeated_shrink_reflows_previous_chains() {
    let mut buffer = Buffer::new(8, 16);
    ascii(&mut buffer, "0123456789ABCDEF0123");
    crlf(&mut buffer);

    buffer.resize(8, 8).unwrap();
    buffer.resize(5, 8).unwrap();

    assert_eq!(row_text(&buffer, 0), "01234");
    assert_eq!(row_text(&buffer, 1), "56789");
    assert_eq!(row_text(&buffer, 2), "ABCDE");
    assert_eq!(row_text(&buffer, 3), "F0123");
    assert_eq!(buffer.get_line(0).unwrap().logical_width(), 20);
    buffer.assert_invariants();
}

// ============================================================================
// Cursor anchoring
// ============================================================================

#[test]
fn cursor_stays_on_same_character_through_shrink() {
    let mut buffer = Buffer::new(6, 12);
    ascii(&mut buffer, "abcdefgh");
    // Cursor sits just after 'h'.
    assert_eq!(cursor_char(&buffer), Some('h'));

    buffer.resize(5, 6).unwrap();

    assert_eq!(cursor_char(&buffer), Some('h'));
    assert_eq!(buffer.cursor_y(), 1);
    assert_eq!(buffer.cursor_x(), 3);
    buffer.assert_invariants();
}

#[test]
fn cursor_stays_on_same_character_through_grow() {
    let mut buffer = Buffer::new(6, 5);
    ascii(&mut buffer, "abcdefgh");
    assert_eq!(buffer.cursor_y(), 1);

    buffer.resize(12, 6).unwrap();

    assert_eq!(cursor_char(&buffer), Some('h'));
    assert_eq!(buffer.cursor_y(), 0);
    assert_eq!(buffer.cursor_x(), 8);
    buffer.assert_invariants();
}

#[test]
fn saved_cursor_follows_reflow() {
    let mut buffer = Buffer::new(6, 12);
    ascii(&mut buffer, "abcdefgh");
    buffer.save_cursor();
    crlf(&mut buffer);
    ascii(&mut buffer, "next");

    buffer.resize(5, 6).unwrap();
    buffer.restore_cursor();

    assert_eq!(cursor_char(&buffer), Some('h'));
    buffer.assert_invariants();
}

#[test]
fn writes_continue_correctly_after_reflow() {
    let mut buffer = Buffer::new(6, 10);
    ascii(&mut buffer, "abcdef");
    buffer.resize(4, 6).unwrap();
    ascii(&mut buffer, "gh");

    assert_eq!(buffer.logical_content()[0], "abcdefgh");
    buffer.assert_invariants();
}

// ============================================================================
// Markers
// ============================================================================

#[test]
fn marker_shifts_when_earlier_paragraph_wraps() {
    let mut buffer = Buffer::new(8, 10);
    ascii(&mut buffer, "0123456789"); // will split on shrink
    crlf(&mut buffer);
    ascii(&mut buffer, "target");
    let marker = buffer.add_marker(1);

    buffer.resize(5, 8).unwrap();

    // Paragraph above grew from 1 row to 2.
    assert!(!marker.is_disposed());
    assert_eq!(marker.line(), 2);
    assert_eq!(row_text(&buffer, marker.line()), "targe");
    buffer.assert_invariants();
}

#[test]
fn marker_shifts_up_when_earlier_paragraph_unwraps() {
    let mut buffer = Buffer::new(8, 5);
    ascii(&mut buffer, "0123456789"); // two rows at cols=5
    crlf(&mut buffer);
    ascii(&mut buffer, "tgt");
    let marker = buffer.add_marker(2);

    buffer.resize(10, 8).unwrap();

    assert!(!marker.is_disposed());
    assert_eq!(marker.line(), 1);
    assert_eq!(row_text(&buffer, marker.line()), "tgt");
    buffer.assert_invariants();
}

#[test]
fn marker_on_removed_continuation_row_is_disposed() {
    let mut buffer = Buffer::new(8, 5);
    ascii(&mut buffer, "0123456789");
    let marker = buffer.add_marker(1); // continuation row

    buffer.resize(10, 8).unwrap();

    assert!(marker.is_disposed());
}

#[test]
fn marker_survives_scrollback_eviction_during_reflow() {
    let mut buffer = Buffer::with_config(
        4,
        10,
        BufferConfig {
            scrollback: 4,
            ..BufferConfig::default()
        },
    );
    for i in 0..7 {
        ascii(&mut buffer, &format!("line-{i}"));
        crlf(&mut buffer);
    }
    let ybase = buffer.ybase();
    let marker = buffer.add_marker(ybase);

    // Shrinking the width wraps every line; overflow evicts from the
    // top and the marker must either track or dispose, never dangle.
    buffer.resize(4, 4).unwrap();

    if !marker.is_disposed() {
        assert!(marker.line() < buffer.len());
    }
    buffer.assert_invariants();
}

#[test]
fn noop_resize_fires_no_marker_events() {
    let mut buffer = Buffer::new(6, 10);
    ascii(&mut buffer, "0123456789abc");
    let marker = buffer.add_marker(1);

    buffer.resize(10, 6).unwrap();

    assert_eq!(marker.line(), 1);
    assert!(!marker.is_disposed());
}

// ============================================================================
// Capacity
// ============================================================================

#[test]
fn reflow_overflow_evicts_oldest_lines() {
    let mut buffer = Buffer::with_config(
        4,
        20,
        BufferConfig {
            scrollback: 2,
            ..BufferConfig::default()
        },
    );
    ascii(&mut buffer, "aaaaaaaaaaaaaaaaaaaa"); // 20 chars
    crlf(&mut buffer);
    ascii(&mut buffer, "bbbbbbbbbbbbbbbbbbbb");
    crlf(&mut buffer);
    ascii(&mut buffer, "cccc");

    // At cols=5 the content needs 9 rows; capacity is 6.
    buffer.resize(5, 4).unwrap();

    assert!(buffer.len() <= buffer.max_length());
    // Newest content survives.
    let content = buffer.logical_content();
    assert!(content.iter().any(|line| line == "cccc"));
    buffer.assert_invariants();
}

#[test]
fn grow_rows_beyond_scrollback_stays_in_capacity() {
    let mut buffer = Buffer::with_config(
        3,
        10,
        BufferConfig {
            scrollback: 1,
            ..BufferConfig::default()
        },
    );
    for _ in 0..6 {
        buffer.line_feed();
    }
    buffer.resize(10, 8).unwrap();
    assert!(buffer.len() <= buffer.max_length());
    assert_eq!(buffer.rows(), 8);
    buffer.assert_invariants();
}

// ============================================================================
// Windows compatibility gate
// ============================================================================

#[test]
fn windows_mode_resize_truncates_without_reflow() {
    let mut buffer = Buffer::with_config(
        5,
        10,
        BufferConfig {
            windows_mode: true,
            ..BufferConfig::default()
        },
    );
    ascii(&mut buffer, "0123456789ABC");
    assert!(buffer.get_line(1).unwrap().is_wrapped());

    buffer.resize(6, 5).unwrap();

    // Rows truncated in place; wrap linkage untouched.
    assert_eq!(row_text(&buffer, 0), "012345");
    assert_eq!(row_text(&buffer, 1), "ABC");
    assert!(buffer.get_line(1).unwrap().is_wrapped());
    buffer.assert_invariants();
}

#[test]
fn old_conpty_build_disables_reflow() {
    let mut buffer = Buffer::with_config(
        5,
        10,
        BufferConfig {
            windows_pty: Some(WindowsPty {
                backend: WindowsPtyBackend::Conpty,
                build_number: Some(CONPTY_REFLOW_MIN_BUILD - 1),
            }),
            ..BufferConfig::default()
        },
    );
    ascii(&mut buffer, "0123456789ABC");

    buffer.resize(13, 5).unwrap();

    // Still two rows: no merge happened.
    assert_eq!(row_text(&buffer, 0), "0123456789");
    assert_eq!(row_text(&buffer, 1), "ABC");
    assert!(buffer.get_line(1).unwrap().is_wrapped());
}

#[test]
fn new_conpty_build_reflows() {
    let mut buffer = Buffer::with_config(
        5,
        10,
        BufferConfig {
            windows_pty: Some(WindowsPty {
                backend: WindowsPtyBackend::Conpty,
                build_number: Some(CONPTY_REFLOW_MIN_BUILD),
            }),
            ..BufferConfig::default()
        },
    );
    ascii(&mut buffer, "0123456789ABC");

    buffer.resize(13, 5).unwrap();

    assert_eq!(row_text(&buffer, 0), "0123456789ABC");
    assert!(!buffer.get_line(1).unwrap().is_wrapped());
}

// ============================================================================
// Wide characters and clusters
// ============================================================================

#[test]
fn wide_pair_is_never_split_by_reflow() {
    let mut buffer = Buffer::new(5, 10);
    ascii(&mut buffer, "abc");
    buffer.write_char('漢', 2);
    buffer.write_char('字', 2);
    ascii(&mut buffer, "de");

    // At cols=4 the first wide char would straddle the boundary.
    buffer.resize(4, 5).unwrap();

    for idx in 0..buffer.len() {
        let line = buffer.get_line(idx).unwrap();
        for col in 0..line.len() {
            let cell = line.get(col).unwrap();
            if cell.is_wide() {
                assert!(
                    col + 1 < line.len()
                        && line.get(col + 1).is_some_and(Cell::is_wide_continuation),
                    "split wide pair at row {idx} col {col}"
                );
            }
        }
    }
    // The row that could not fit the wide char broke early.
    assert_eq!(row_text(&buffer, 0), "abc");
    assert_eq!(row_text(&buffer, 1), "漢字");
    assert_eq!(row_text(&buffer, 2), "de");
    buffer.assert_invariants();
}

#[test]
fn combined_cluster_travels_with_reflow() {
    let mut buffer = Buffer::new(5, 10);
    ascii(&mut buffer, "abcde");
    buffer.write_char('e', 1);
    buffer.write_char('\u{0301}', 0); // combining acute on the 'e'
    ascii(&mut buffer, "fgh");

    buffer.resize(4, 5).unwrap();

    let content = buffer.logical_content();
    assert_eq!(content[0], "abcdee\u{0301}fgh");
    buffer.assert_invariants();
}

// ============================================================================
// Display offset
// ============================================================================

#[test]
fn display_pinned_to_bottom_stays_pinned_through_resize() {
    let mut buffer = Buffer::new(4, 10);
    for i in 0..8 {
        ascii(&mut buffer, &format!("0123456789-{i}"));
        crlf(&mut buffer);
    }
    assert_eq!(buffer.ydisp(), buffer.ybase());

    buffer.resize(6, 4).unwrap();

    assert_eq!(buffer.ydisp(), buffer.ybase());
    buffer.assert_invariants();
}

#[test]
fn scrolled_back_display_is_clamped_not_snapped() {
    let mut buffer = Buffer::new(4, 5);
    for _ in 0..10 {
        ascii(&mut buffer, "0123456789"); // wraps into two rows each
        crlf(&mut buffer);
    }
    buffer.scroll_display(100);
    assert_eq!(buffer.ydisp(), 0);

    buffer.resize(10, 4).unwrap();

    assert!(buffer.ydisp() <= buffer.ybase());
    buffer.assert_invariants();
}
