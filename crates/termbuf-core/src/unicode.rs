//! Width/classification collaborator interface.
//!
//! Display width and grapheme joining are version-dependent Unicode
//! policy that lives outside this crate. The buffer consumes them as a
//! pure function: given a codepoint, return its column width and
//! whether it joins the preceding cell.

/// Unicode width and joining classification.
///
/// Implementations must be pure: the same codepoint always maps to the
/// same answer within one buffer's lifetime.
pub trait UnicodeWidth {
    /// Display width of `ch` in columns: 0, 1, or 2.
    fn char_width(&self, ch: char) -> u8;

    /// Check if `ch` joins the preceding cell (combining marks, ZWJ).
    ///
    /// Defaults to treating every width-0 codepoint as joining.
    fn is_joining(&self, ch: char) -> bool {
        self.char_width(ch) == 0
    }
}

impl<F> UnicodeWidth for F
where
    F: Fn(char) -> u8,
{
    fn char_width(&self, ch: char) -> u8 {
        self(ch)
    }
}
