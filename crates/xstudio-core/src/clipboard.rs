//! Clipboard access with a fallback transport.
//!
//! The system clipboard (`arboard`) is tried first. When it is unavailable
//! (headless session, SSH) the OSC 52 terminal escape sequence is written
//! instead, which most terminals turn into a clipboard copy.

use std::io::Write;

use base64::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMethod {
    System,
    Osc52,
}

impl CopyMethod {
    pub fn label(self) -> &'static str {
        match self {
            CopyMethod::System => "system clipboard",
            CopyMethod::Osc52 => "terminal clipboard",
        }
    }
}

/// Clipboard operation errors.
#[derive(Debug, Clone)]
pub enum ClipboardError {
    /// System clipboard operation failed.
    System(String),
    /// OSC 52 write failed.
    Osc52(String),
}

impl std::fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClipboardError::System(msg) => write!(f, "System clipboard failed: {msg}"),
            ClipboardError::Osc52(msg) => write!(f, "OSC 52 clipboard failed: {msg}"),
        }
    }
}

impl std::error::Error for ClipboardError {}

/// One way of putting text on the clipboard.
pub trait ClipboardTransport: Send {
    fn method(&self) -> CopyMethod;

    fn copy(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// System clipboard via `arboard`.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardTransport for SystemClipboard {
    fn method(&self) -> CopyMethod {
        CopyMethod::System
    }

    fn copy(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::System(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| ClipboardError::System(e.to_string()))
    }
}

/// OSC 52 escape sequence written to a terminal.
#[derive(Debug)]
pub struct Osc52Clipboard<W: Write + Send> {
    out: W,
}

impl Osc52Clipboard<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write + Send> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ClipboardTransport for Osc52Clipboard<W> {
    fn method(&self) -> CopyMethod {
        CopyMethod::Osc52
    }

    fn copy(&mut self, text: &str) -> Result<(), ClipboardError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(text);
        // ESC ] 52 ; c ; <base64> ESC \
        write!(self.out, "\x1b]52;c;{encoded}\x1b\\")
            .map_err(|e| ClipboardError::Osc52(e.to_string()))?;
        self.out
            .flush()
            .map_err(|e| ClipboardError::Osc52(e.to_string()))
    }
}

/// Primary transport with an optional fallback.
pub struct Clipboard {
    primary: Box<dyn ClipboardTransport>,
    fallback: Option<Box<dyn ClipboardTransport>>,
}

impl std::fmt::Debug for Clipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clipboard")
            .field("primary", &self.primary.method())
            .field("fallback", &self.fallback.as_ref().map(|t| t.method()))
            .finish()
    }
}

impl Default for Clipboard {
    /// System clipboard, falling back to OSC 52 on stdout.
    fn default() -> Self {
        Self::new(
            Box::new(SystemClipboard),
            Some(Box::new(Osc52Clipboard::stdout())),
        )
    }
}

impl Clipboard {
    pub fn new(
        primary: Box<dyn ClipboardTransport>,
        fallback: Option<Box<dyn ClipboardTransport>>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Copies text, trying the fallback if the primary transport fails.
    ///
    /// The returned error is the fallback's when both fail.
    pub fn copy(&mut self, text: &str) -> Result<CopyMethod, ClipboardError> {
        match self.primary.copy(text) {
            Ok(()) => Ok(self.primary.method()),
            Err(primary_err) => {
                tracing::debug!(error = %primary_err, "primary clipboard failed");
                match &mut self.fallback {
                    Some(fallback) => fallback.copy(text).map(|()| fallback.method()),
                    None => Err(primary_err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl ClipboardTransport for Broken {
        fn method(&self) -> CopyMethod {
            CopyMethod::System
        }

        fn copy(&mut self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::System("no display".into()))
        }
    }

    #[test]
    fn test_osc52_sequence() {
        let mut osc = Osc52Clipboard::new(Vec::new());
        osc.copy("/r/a[2]").unwrap();
        let written = String::from_utf8(osc.into_inner()).unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode("/r/a[2]");
        assert_eq!(written, format!("\x1b]52;c;{encoded}\x1b\\"));
    }

    #[test]
    fn test_fallback_used_when_primary_fails() {
        let mut clipboard = Clipboard::new(
            Box::new(Broken),
            Some(Box::new(Osc52Clipboard::new(Vec::new()))),
        );
        assert_eq!(clipboard.copy("x").unwrap(), CopyMethod::Osc52);
    }

    #[test]
    fn test_error_without_fallback() {
        let mut clipboard = Clipboard::new(Box::new(Broken), None);
        let err = clipboard.copy("x").unwrap_err();
        assert_eq!(err.to_string(), "System clipboard failed: no display");
    }
}
