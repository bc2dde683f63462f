//! Packed terminal cell.
//!
//! ## Design
//!
//! - 16-byte `Copy` cells: codepoint + flags packed into one `u32`,
//!   fg/bg as [`PackedColor`], extended attributes as an [`ExtendedId`]
//!   index into the buffer-owned table
//! - A width-2 character occupies two column slots: the cell itself
//!   (flagged [`CellFlags::WIDE`]) and a zero-width placeholder to its
//!   right (flagged [`CellFlags::WIDE_CONTINUATION`])
//! - Grapheme clusters that do not fit a single codepoint are flagged
//!   [`CellFlags::COMBINED`] and resolved through the owning line's
//!   overflow table

use crate::extra::ExtendedId;

/// Codepoint mask (Unicode scalar values fit in 21 bits).
const CODEPOINT_MASK: u32 = 0x001F_FFFF;

/// Shift for the flag bits in the content word.
const FLAGS_SHIFT: u32 = 24;

bitflags::bitflags! {
    /// Per-cell flags stored in the high byte of the content word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CellFlags: u8 {
        /// Cell holds a width-2 character.
        const WIDE = 1 << 0;
        /// Cell is the zero-width right half of a wide character.
        const WIDE_CONTINUATION = 1 << 1;
        /// Cell content is a multi-codepoint cluster; the real string
        /// lives in the owning line's combined-overflow table.
        const COMBINED = 1 << 2;
    }
}

/// Packed color value.
///
/// Encodes default / 256-indexed / 24-bit RGB in a single `u32`:
/// the top byte is a mode tag, the low bytes hold the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct PackedColor(pub u32);

const COLOR_MODE_SHIFT: u32 = 24;
const COLOR_MODE_DEFAULT: u32 = 0;
const COLOR_MODE_INDEXED: u32 = 1;
const COLOR_MODE_RGB: u32 = 2;

impl PackedColor {
    /// The terminal default color (fg or bg, depending on position).
    pub const DEFAULT: Self = Self(0);

    /// A 256-palette indexed color.
    #[must_use]
    #[inline]
    pub const fn indexed(idx: u8) -> Self {
        Self((COLOR_MODE_INDEXED << COLOR_MODE_SHIFT) | idx as u32)
    }

    /// A 24-bit RGB color.
    #[must_use]
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self((COLOR_MODE_RGB << COLOR_MODE_SHIFT) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Check if this is the default color.
    #[must_use]
    #[inline]
    pub const fn is_default(self) -> bool {
        self.0 >> COLOR_MODE_SHIFT == COLOR_MODE_DEFAULT
    }
}

/// One terminal cell.
///
/// Cells are plain `Copy` values; rows own them in a flat `Vec`. The
/// `content` word packs the codepoint (low 21 bits) and [`CellFlags`]
/// (high byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    content: u32,
    fg: PackedColor,
    bg: PackedColor,
    extended: ExtendedId,
}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

impl Cell {
    /// The null cell: no codepoint, width 1, default attributes.
    ///
    /// Rows are padded with this; it renders as nothing and does not
    /// count toward a line's trimmed length.
    pub const BLANK: Self = Self {
        content: 0,
        fg: PackedColor::DEFAULT,
        bg: PackedColor::DEFAULT,
        extended: ExtendedId::NONE,
    };

    /// Create a cell holding `ch` with the given display width (1 or 2).
    ///
    /// Width-0 placeholders are created with [`Cell::wide_placeholder`].
    #[must_use]
    pub fn new(ch: char, width: u8) -> Self {
        let flags = if width == 2 {
            CellFlags::WIDE
        } else {
            CellFlags::empty()
        };
        Self {
            content: (ch as u32 & CODEPOINT_MASK) | (u32::from(flags.bits()) << FLAGS_SHIFT),
            fg: PackedColor::DEFAULT,
            bg: PackedColor::DEFAULT,
            extended: ExtendedId::NONE,
        }
    }

    /// Create a cell with explicit attributes.
    #[must_use]
    pub fn with_attrs(ch: char, width: u8, fg: PackedColor, bg: PackedColor, extended: ExtendedId) -> Self {
        let mut cell = Self::new(ch, width);
        cell.fg = fg;
        cell.bg = bg;
        cell.extended = extended;
        cell
    }

    /// Create the zero-width placeholder for the right half of a wide
    /// cell, inheriting its attributes.
    #[must_use]
    pub fn wide_placeholder(wide: &Self) -> Self {
        Self {
            content: u32::from(CellFlags::WIDE_CONTINUATION.bits()) << FLAGS_SHIFT,
            fg: wide.fg,
            bg: wide.bg,
            extended: wide.extended,
        }
    }

    /// The cell's codepoint (0 for null and placeholder cells).
    #[must_use]
    #[inline]
    pub fn codepoint(&self) -> u32 {
        self.content & CODEPOINT_MASK
    }

    /// The cell's character, or NUL for empty/placeholder cells.
    #[must_use]
    #[inline]
    pub fn char(&self) -> char {
        char::from_u32(self.codepoint()).unwrap_or('\u{FFFD}')
    }

    /// The cell's flags.
    #[must_use]
    #[inline]
    pub fn flags(&self) -> CellFlags {
        CellFlags::from_bits_truncate((self.content >> FLAGS_SHIFT) as u8)
    }

    fn set_flags(&mut self, flags: CellFlags) {
        self.content = (self.content & CODEPOINT_MASK) | (u32::from(flags.bits()) << FLAGS_SHIFT);
    }

    /// Display width of this cell: 0, 1, or 2.
    #[must_use]
    #[inline]
    pub fn width(&self) -> u8 {
        let flags = self.flags();
        if flags.contains(CellFlags::WIDE_CONTINUATION) {
            0
        } else if flags.contains(CellFlags::WIDE) {
            2
        } else {
            1
        }
    }

    /// Check if this cell holds a width-2 character.
    #[must_use]
    #[inline]
    pub fn is_wide(&self) -> bool {
        self.flags().contains(CellFlags::WIDE)
    }

    /// Check if this cell is the right-half placeholder of a wide cell.
    #[must_use]
    #[inline]
    pub fn is_wide_continuation(&self) -> bool {
        self.flags().contains(CellFlags::WIDE_CONTINUATION)
    }

    /// Check if this cell's content is a multi-codepoint cluster.
    #[must_use]
    #[inline]
    pub fn is_combined(&self) -> bool {
        self.flags().contains(CellFlags::COMBINED)
    }

    /// Mark this cell as holding a combined cluster.
    pub fn set_combined(&mut self, combined: bool) {
        let mut flags = self.flags();
        flags.set(CellFlags::COMBINED, combined);
        self.set_flags(flags);
    }

    /// Demote a wide cell to a plain width-1 cell.
    ///
    /// Used when its placeholder is overwritten and the left half must
    /// not keep claiming two columns.
    pub fn detach_wide(&mut self) {
        let mut flags = self.flags();
        flags.remove(CellFlags::WIDE);
        self.set_flags(flags);
    }

    /// Foreground color.
    #[must_use]
    #[inline]
    pub fn fg(&self) -> PackedColor {
        self.fg
    }

    /// Background color.
    #[must_use]
    #[inline]
    pub fn bg(&self) -> PackedColor {
        self.bg
    }

    /// Extended attribute id (`ExtendedId::NONE` when absent).
    #[must_use]
    #[inline]
    pub fn extended(&self) -> ExtendedId {
        self.extended
    }

    /// Check if the cell has printable content.
    #[must_use]
    #[inline]
    pub fn has_content(&self) -> bool {
        self.codepoint() != 0 || self.is_combined()
    }

    /// Check if the cell matters for trimming: printable content or a
    /// non-default background that must still be painted.
    #[must_use]
    #[inline]
    pub fn occupies(&self) -> bool {
        self.has_content() || !self.bg.is_default()
    }
}
