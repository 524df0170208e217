//! Cross-view navigation: diagnostics and preview clicks jump into the source
//! buffers and briefly highlight the target line.
//!
//! Two highlight slots exist, one for diagnostic jumps and one for preview
//! jumps. Each slot holds at most one mark; a new jump in a slot clears that
//! slot's previous mark right away. The slots never touch each other.

use std::time::Duration;

use crate::buffer::{Position, SourceBuffer, SourceBuffers, SourceKind};
use crate::debounce::Debounce;
use crate::diagnostics::SourceLocation;

/// Max chars of clicked text used for the first, exact lookup.
const PREFIX_CHARS: usize = 80;
/// Shorter words are too likely to match unrelated markup.
const MIN_WORD_CHARS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightKind {
    Diagnostic,
    PreviewJump,
}

impl HighlightKind {
    /// Line class applied to the highlighted line.
    pub fn class(self) -> &'static str {
        match self {
            HighlightKind::Diagnostic => "error-line",
            HighlightKind::PreviewJump => "preview-jump-line",
        }
    }
}

#[derive(Debug, Clone)]
struct HighlightSlot {
    kind: HighlightKind,
    mark: Option<(SourceKind, usize)>,
    timer: Debounce,
}

impl HighlightSlot {
    fn new(kind: HighlightKind, duration: Duration) -> Self {
        Self {
            kind,
            mark: None,
            timer: Debounce::new(duration),
        }
    }

    fn clear(&mut self, buffers: &mut SourceBuffers) {
        if let Some((source, line)) = self.mark.take() {
            buffers.get_mut(source).remove_line_mark(line, self.kind.class());
        }
    }

    fn set(&mut self, buffers: &mut SourceBuffers, source: SourceKind, line: usize) -> u64 {
        self.clear(buffers);
        if buffers.get_mut(source).add_line_mark(line, self.kind.class()) {
            self.mark = Some((source, line));
        }
        self.timer.arm()
    }
}

/// Result of a preview-to-stylesheet jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewJump {
    /// Clicked element had no text.
    EmptyText,
    /// Nothing in the stylesheet matched.
    NotFound,
    /// Cursor moved; the highlight expires with `generation`.
    Jumped { position: Position, generation: u64 },
}

#[derive(Debug, Clone)]
pub struct CrossViewNavigator {
    diagnostic: HighlightSlot,
    preview: HighlightSlot,
}

impl Default for CrossViewNavigator {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl CrossViewNavigator {
    pub fn new(highlight: Duration) -> Self {
        Self {
            diagnostic: HighlightSlot::new(HighlightKind::Diagnostic, highlight),
            preview: HighlightSlot::new(HighlightKind::PreviewJump, highlight),
        }
    }

    pub fn highlight_duration(&self) -> Duration {
        self.diagnostic.timer.delay()
    }

    fn slot_mut(&mut self, kind: HighlightKind) -> &mut HighlightSlot {
        match kind {
            HighlightKind::Diagnostic => &mut self.diagnostic,
            HighlightKind::PreviewJump => &mut self.preview,
        }
    }

    /// Current highlight of a slot as (buffer, 0-based line).
    pub fn highlighted(&self, kind: HighlightKind) -> Option<(SourceKind, usize)> {
        match kind {
            HighlightKind::Diagnostic => self.diagnostic.mark,
            HighlightKind::PreviewJump => self.preview.mark,
        }
    }

    /// Jumps to a diagnostic location.
    ///
    /// Returns the highlight generation, or `None` when the location does not
    /// exist in the buffer (nothing changes then).
    pub fn jump_to_location(
        &mut self,
        buffers: &mut SourceBuffers,
        location: SourceLocation,
    ) -> Option<u64> {
        let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
        if line >= buffers.get(location.source).line_count() {
            return None;
        }
        let col = location
            .column
            .and_then(|c| usize::try_from(c).ok())
            .map_or(0, |c| c.saturating_sub(1));
        let target = Position::new(line, col);

        let generation = self.diagnostic.set(buffers, location.source, line);
        let buffer = buffers.get_mut(location.source);
        buffer.set_cursor(target);
        buffer.scroll_into_view(target);
        buffers.xml.blur();
        buffers.xslt.blur();
        buffers.get_mut(location.source).focus();
        Some(generation)
    }

    /// Finds clicked preview text in the stylesheet and jumps there.
    pub fn jump_to_preview_text(&mut self, buffers: &mut SourceBuffers, text: &str) -> PreviewJump {
        let text = text.trim();
        if text.is_empty() {
            return PreviewJump::EmptyText;
        }
        let Some(offset) = locate_preview_text(&buffers.xslt, text) else {
            return PreviewJump::NotFound;
        };

        let position = buffers.xslt.position_from_offset(offset);
        let generation = self.preview.set(buffers, SourceKind::Xslt, position.line);
        buffers.xslt.set_cursor(position);
        buffers.xslt.scroll_into_view(position);
        buffers.xml.blur();
        buffers.xslt.focus();
        PreviewJump::Jumped {
            position,
            generation,
        }
    }

    /// Removes a highlight if `generation` is still its live one.
    pub fn expire(&mut self, kind: HighlightKind, generation: u64, buffers: &mut SourceBuffers) -> bool {
        let slot = self.slot_mut(kind);
        if !slot.timer.fire(generation) {
            return false;
        }
        slot.clear(buffers);
        true
    }
}

/// Best-effort lookup of rendered text in the stylesheet source.
///
/// Tries the first 80 chars verbatim, then each word of 4+ chars, longest
/// first. Returns the char offset of the first hit.
pub fn locate_preview_text(xslt: &SourceBuffer, clicked: &str) -> Option<usize> {
    let clicked = clicked.trim();
    if clicked.is_empty() {
        return None;
    }

    let prefix: String = clicked.chars().take(PREFIX_CHARS).collect();
    if let Some(offset) = xslt.find(&prefix) {
        return Some(offset);
    }

    let mut words: Vec<&str> = clicked
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_WORD_CHARS)
        .collect();
    words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
    words.dedup();
    words.into_iter().find_map(|w| xslt.find(w))
}
