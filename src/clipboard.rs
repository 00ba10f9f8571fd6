use parking_lot::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("clipboard backend unavailable: {0}")]
    Unavailable(String),
}

/// The shared-surface clipboard collaborator. The desktop integration lives
/// behind this trait; the server itself only needs set/get.
pub trait Clipboard: Send + Sync {
    fn set_text(&self, text: String) -> Result<(), ClipboardError>;
    fn text(&self) -> Result<String, ClipboardError>;
}

/// In-memory clipboard backing, used when no desktop integration is wired
/// up (headless servers, tests).
#[derive(Default)]
pub struct MemoryClipboard {
    inner: RwLock<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for MemoryClipboard {
    fn set_text(&self, text: String) -> Result<(), ClipboardError> {
        *self.inner.write() = text;
        Ok(())
    }

    fn text(&self) -> Result<String, ClipboardError> {
        Ok(self.inner.read().clone())
    }
}
