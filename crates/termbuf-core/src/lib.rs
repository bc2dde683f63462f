//! Terminal screen buffer and reflow engine.
//!
//! This crate implements the storage layer of a terminal emulator: a
//! scrollback-backed grid of cells, a viewport over it, and resize
//! with line-wrap reflow. It contains no escape-sequence parsing and
//! no rendering; an input layer feeds it already-classified
//! characters and a renderer reads lines back out.
//!
//! ## Architecture
//!
//! - [`Buffer`] — the public surface: cursor, writes, scrolling, tab
//!   stops, resize
//! - [`History`] — bounded line ring with structural change
//!   notifications
//! - [`Line`] / [`Cell`] — fixed-width rows of packed cells with wrap
//!   linkage metadata
//! - [`Marker`] — caller-held line anchors that survive eviction and
//!   reflow
//!
//! Reflow repartitions wrapped paragraphs on column changes so that
//! logical content, cursor position, and markers are preserved; see
//! the `buffer` module docs for the invariants involved.
//!
//! ## Example
//!
//! ```
//! use termbuf_core::Buffer;
//!
//! let mut buffer = Buffer::new(24, 80);
//! buffer.write_str_with("hello", &|_ch: char| 1u8);
//! buffer.resize(40, 24)?;
//! assert_eq!(
//!     buffer.translate_buffer_line_to_string(0, true, 0, None),
//!     "hello"
//! );
//! # Ok::<(), termbuf_core::BufferError>(())
//! ```

pub mod buffer;
pub mod cell;
pub mod config;
pub mod extra;
pub mod history;
pub mod line;
pub mod marker;
pub mod unicode;

#[cfg(test)]
mod tests;

pub use buffer::{Buffer, BufferError};
pub use cell::{Cell, CellFlags, PackedColor};
pub use config::{BufferConfig, WindowsPty, WindowsPtyBackend, CONPTY_REFLOW_MIN_BUILD};
pub use extra::{ExtendedAttrTable, ExtendedAttrs, ExtendedId, UnderlineStyle};
pub use history::{History, HistoryEvent};
pub use line::{Line, LineKind};
pub use marker::Marker;
pub use unicode::UnicodeWidth;
