//! System clipboard access for the `copy` command.

use crate::{Error, Result};

/// Somewhere the last response can be copied to.
pub trait Clipboard {
    /// Replace the clipboard contents with `text`.
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// The platform clipboard.
///
/// The connection is opened on first use so that sessions that never copy anything (and
/// headless machines) do not pay for it.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Result<&mut arboard::Clipboard> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| Error::clipboard(format!("clipboard unavailable: {e}")))?;
            self.inner = Some(clipboard);
        }
        self.inner
            .as_mut()
            .ok_or_else(|| Error::clipboard("clipboard unavailable"))
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        let clipboard = self.handle()?;
        if let Err(e) = clipboard.set_text(text.to_string()) {
            // A broken connection is reopened on the next attempt.
            self.inner = None;
            return Err(Error::clipboard(format!("failed to set clipboard: {e}")));
        }
        tracing::debug!(bytes = text.len(), "copied to clipboard");
        Ok(())
    }
}
