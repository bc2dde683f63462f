//! Extended cell attributes with interned storage.
//!
//! ## Design
//!
//! Most cells never carry underline colors or hyperlinks, so storing
//! them inline would bloat every cell. Instead unique attribute sets are
//! interned once in an [`ExtendedAttrTable`] and cells reference them by
//! a 4-byte [`ExtendedId`]. Id 0 is reserved for "no extended attrs".
//!
//! Real sessions produce a handful of unique attribute sets, not
//! millions, so the table stays tiny.

use rustc_hash::FxHashMap;

/// Index of an interned [`ExtendedAttrs`] entry. Zero means none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ExtendedId(pub u32);

impl ExtendedId {
    /// No extended attributes.
    pub const NONE: Self = Self(0);

    /// Check if this id refers to no attributes.
    #[must_use]
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Underline rendering style (SGR 4:x).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnderlineStyle {
    /// Plain single underline.
    #[default]
    Single,
    /// Double underline.
    Double,
    /// Curly (undercurl) underline.
    Curly,
    /// Dotted underline.
    Dotted,
    /// Dashed underline.
    Dashed,
}

/// Rarely-used attributes a cell may carry beyond fg/bg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExtendedAttrs {
    /// Underline color as RGB, if set via SGR 58.
    pub underline_color: Option<(u8, u8, u8)>,
    /// Underline style, if any underline is active.
    pub underline_style: Option<UnderlineStyle>,
    /// Hyperlink id assigned by the link-handling layer (OSC 8).
    pub link_id: Option<u32>,
}

impl ExtendedAttrs {
    /// Check if every field is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.underline_color.is_none() && self.underline_style.is_none() && self.link_id.is_none()
    }
}

/// Interning table for [`ExtendedAttrs`].
///
/// Entry 0 is always the empty attribute set.
#[derive(Debug)]
pub struct ExtendedAttrTable {
    entries: Vec<ExtendedAttrs>,
    lookup: FxHashMap<ExtendedAttrs, ExtendedId>,
}

impl Default for ExtendedAttrTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtendedAttrTable {
    /// Create a table containing only the empty entry.
    #[must_use]
    pub fn new() -> Self {
        let mut lookup = FxHashMap::default();
        lookup.insert(ExtendedAttrs::default(), ExtendedId::NONE);
        Self {
            entries: vec![ExtendedAttrs::default()],
            lookup,
        }
    }

    /// Intern an attribute set, returning its id.
    ///
    /// Empty sets always intern to [`ExtendedId::NONE`].
    pub fn intern(&mut self, attrs: ExtendedAttrs) -> ExtendedId {
        if attrs.is_empty() {
            return ExtendedId::NONE;
        }
        if let Some(&id) = self.lookup.get(&attrs) {
            return id;
        }
        let id = ExtendedId(u32::try_from(self.entries.len()).unwrap_or(u32::MAX));
        self.entries.push(attrs);
        self.lookup.insert(attrs, id);
        id
    }

    /// Look up an attribute set by id.
    #[must_use]
    pub fn get(&self, id: ExtendedId) -> Option<&ExtendedAttrs> {
        self.entries.get(id.0 as usize)
    }

    /// Number of interned entries, including the empty entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if only the empty entry exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }

    /// Drop all entries except the empty one.
    ///
    /// Invalidates outstanding ids; only call on full buffer reset.
    pub fn clear(&mut self) {
        self.entries.truncate(1);
        self.lookup.clear();
        self.lookup.insert(ExtendedAttrs::default(), ExtendedId::NONE);
    }
}
