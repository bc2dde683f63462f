//! Buffer configuration knobs.
//!
//! These are caller-supplied policy switches; the buffer never infers
//! PTY backend behavior on its own. The conpty gate mirrors the
//! observed behavior of Windows pseudo-console backends: older builds
//! hard-wrap every row themselves, so reflowing on top of that would
//! corrupt content.

/// Windows PTY backend kind, when one is in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowsPtyBackend {
    /// Windows pseudo-console.
    Conpty,
    /// winpty compatibility layer.
    Winpty,
}

/// Windows PTY description supplied by the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowsPty {
    /// Backend in use.
    pub backend: WindowsPtyBackend,
    /// OS build number, if known.
    pub build_number: Option<u32>,
}

/// First Windows build whose conpty reprints without hard-wrapping,
/// making client-side reflow safe.
pub const CONPTY_REFLOW_MIN_BUILD: u32 = 21376;

/// Buffer construction and resize policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Maximum scrollback lines kept above the viewport.
    pub scrollback: usize,
    /// Distance between default tab stops.
    pub tab_width: u16,
    /// Legacy Windows compatibility mode: rows arrive pre-wrapped, so
    /// reflow must not run.
    pub windows_mode: bool,
    /// Windows PTY description, if the session runs through one.
    pub windows_pty: Option<WindowsPty>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            scrollback: 1000,
            tab_width: 8,
            windows_mode: false,
            windows_pty: None,
        }
    }
}

impl BufferConfig {
    /// Check whether resize may reflow wrap chains.
    ///
    /// Requires scrollback, and is vetoed by windows mode or a conpty
    /// backend older than [`CONPTY_REFLOW_MIN_BUILD`].
    #[must_use]
    pub fn reflow_enabled(&self) -> bool {
        if self.scrollback == 0 {
            return false;
        }
        if let Some(pty) = self.windows_pty {
            if let Some(build) = pty.build_number {
                return pty.backend == WindowsPtyBackend::Conpty && build >= CONPTY_REFLOW_MIN_BUILD;
            }
            return false;
        }
        !self.windows_mode
    }
}
