//! Source buffers for the XML and XSLT editors.
//!
//! A `SourceBuffer` is the text model behind one editor pane. It stores the
//! text as lines with a (line, col) cursor in char units, plus the editor-side
//! state the studio drives from other views: selection, line marks used for
//! transient highlights, a scroll target and per-buffer search state.
//!
//! Every edit goes through a method that returns `Option<ChangeNotice>`.
//! A notice is produced exactly once per atomic edit and never for a no-op.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which of the two source buffers a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Xml,
    Xslt,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Xml => "xml",
            SourceKind::Xslt => "xslt",
        }
    }

    /// Human label used in diagnostics ("XML", "XSLT").
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Xml => "XML",
            SourceKind::Xslt => "XSLT",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(SourceKind::Xml),
            "xslt" | "xsl" => Ok(SourceKind::Xslt),
            other => Err(format!("unknown source '{other}' (expected xml or xslt)")),
        }
    }
}

/// A 0-based (line, col) position in char units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Selected range; `anchor` is where the selection started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub head: Position,
}

impl Selection {
    /// Returns (start, end) ordered by position.
    pub fn ordered(&self) -> (Position, Position) {
        if self.anchor <= self.head {
            (self.anchor, self.head)
        } else {
            (self.head, self.anchor)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }
}

/// Emitted once per effective edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotice {
    pub source: SourceKind,
    pub revision: u64,
}

/// An atomic edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Replace the whole text (paste-all, import, restore).
    SetText(String),
    /// Insert at the cursor, replacing the selection if any.
    Insert(String),
    /// Replace an explicit range.
    Replace {
        start: Position,
        end: Position,
        text: String,
    },
    /// Backspace semantics.
    DeleteBackward,
    /// Delete key semantics.
    DeleteForward,
}

/// A line decoration (e.g. a transient highlight).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMark {
    pub line: usize,
    pub class: &'static str,
}

/// Incremental search state for one buffer.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    query: String,
    /// Matches as (start, end) char offsets.
    matches: Vec<(usize, usize)>,
    index: Option<usize>,
}

impl SearchState {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Returns the "current/total" counter shown next to the search input.
    pub fn counter(&self) -> String {
        match self.index {
            Some(idx) if !self.matches.is_empty() => format!("{}/{}", idx + 1, self.matches.len()),
            _ => "0/0".to_string(),
        }
    }
}

/// Text model behind one editor pane.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    source: SourceKind,
    lines: Vec<String>,
    cursor: Position,
    selection: Option<Selection>,
    revision: u64,
    marks: Vec<LineMark>,
    scroll_target: Option<Position>,
    focused: bool,
    search: SearchState,
}

impl SourceBuffer {
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            lines: vec![String::new()],
            cursor: Position::default(),
            selection: None,
            revision: 0,
            marks: Vec::new(),
            scroll_target: None,
            focused: false,
            search: SearchState::default(),
        }
    }

    pub fn with_text(source: SourceKind, text: &str) -> Self {
        let mut buffer = Self::new(source);
        buffer.lines = split_lines(text);
        buffer
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// Returns the full text. Lines are joined with `\n`, so any `\r` kept at
    /// line ends survives a set/get round trip unchanged.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, idx: usize) -> Option<&str> {
        self.lines.get(idx).map(String::as_str)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn scroll_target(&self) -> Option<Position> {
        self.scroll_target
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    // ------------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------------

    /// Applies an edit, returning a notice if the text changed.
    pub fn apply(&mut self, edit: Edit) -> Option<ChangeNotice> {
        match edit {
            Edit::SetText(text) => self.set_text(&text),
            Edit::Insert(text) => self.insert_str(&text),
            Edit::Replace { start, end, text } => self.replace_range(start, end, &text),
            Edit::DeleteBackward => self.delete_prev_char(),
            Edit::DeleteForward => self.delete_next_char(),
        }
    }

    /// Replaces the whole text. The cursor moves to the start.
    pub fn set_text(&mut self, text: &str) -> Option<ChangeNotice> {
        let lines = split_lines(text);
        if lines == self.lines {
            return None;
        }
        self.lines = lines;
        self.cursor = Position::default();
        self.selection = None;
        Some(self.changed())
    }

    /// Inserts text at the cursor, replacing the selection if present.
    pub fn insert_str(&mut self, text: &str) -> Option<ChangeNotice> {
        let (start, end) = match self.selection.take() {
            Some(sel) if !sel.is_empty() => sel.ordered(),
            _ => (self.cursor, self.cursor),
        };
        if text.is_empty() && start == end {
            return None;
        }
        self.replace_range(start, end, text)
    }

    /// Replaces the text between two positions (clamped to the buffer).
    pub fn replace_range(
        &mut self,
        start: Position,
        end: Position,
        text: &str,
    ) -> Option<ChangeNotice> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let start = self.clamp(start);
        let end = self.clamp(end);

        let start_off = self.offset_from_position(start);
        let end_off = self.offset_from_position(end);
        let current = self.text();
        let start_byte = char_to_byte_index(&current, start_off);
        let end_byte = char_to_byte_index(&current, end_off);
        if &current[start_byte..end_byte] == text {
            return None;
        }

        let mut next = String::with_capacity(current.len() + text.len());
        next.push_str(&current[..start_byte]);
        next.push_str(text);
        next.push_str(&current[end_byte..]);

        self.lines = split_lines(&next);
        self.selection = None;
        self.cursor = self.position_from_offset(start_off + text.chars().count());
        Some(self.changed())
    }

    /// Deletes the character before the cursor (or the selection).
    pub fn delete_prev_char(&mut self) -> Option<ChangeNotice> {
        if let Some(sel) = self.selection.take()
            && !sel.is_empty()
        {
            let (start, end) = sel.ordered();
            return self.replace_range(start, end, "");
        }
        let offset = self.offset_from_position(self.cursor);
        if offset == 0 {
            return None;
        }
        let start = self.position_from_offset(offset - 1);
        self.replace_range(start, self.cursor, "")
    }

    /// Deletes the character at the cursor (or the selection).
    pub fn delete_next_char(&mut self) -> Option<ChangeNotice> {
        if let Some(sel) = self.selection.take()
            && !sel.is_empty()
        {
            let (start, end) = sel.ordered();
            return self.replace_range(start, end, "");
        }
        let offset = self.offset_from_position(self.cursor);
        if offset >= self.char_len() {
            return None;
        }
        let end = self.position_from_offset(offset + 1);
        self.replace_range(self.cursor, end, "")
    }

    fn changed(&mut self) -> ChangeNotice {
        self.revision += 1;
        let line_count = self.lines.len();
        self.marks.retain(|m| m.line < line_count);
        if !self.search.query.is_empty() {
            let query = self.search.query.clone();
            self.rebuild_search(&query);
        }
        ChangeNotice {
            source: self.source,
            revision: self.revision,
        }
    }

    // ------------------------------------------------------------------------
    // Cursor, selection, view
    // ------------------------------------------------------------------------

    /// Moves the cursor, clamping to the buffer bounds. Clears the selection.
    pub fn set_cursor(&mut self, pos: Position) {
        self.cursor = self.clamp(pos);
        self.selection = None;
    }

    pub fn set_selection(&mut self, anchor: Position, head: Position) {
        let anchor = self.clamp(anchor);
        let head = self.clamp(head);
        self.selection = Some(Selection { anchor, head });
        self.cursor = head;
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selected_text(&self) -> Option<String> {
        let sel = self.selection.filter(|s| !s.is_empty())?;
        let (start, end) = sel.ordered();
        let text = self.text();
        let start_byte = char_to_byte_index(&text, self.offset_from_position(start));
        let end_byte = char_to_byte_index(&text, self.offset_from_position(end));
        Some(text[start_byte..end_byte].to_string())
    }

    /// Records the position the view should scroll to.
    pub fn scroll_into_view(&mut self, pos: Position) {
        self.scroll_target = Some(self.clamp(pos));
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    // ------------------------------------------------------------------------
    // Line marks
    // ------------------------------------------------------------------------

    /// Adds a line mark. Returns false if the line does not exist.
    pub fn add_line_mark(&mut self, line: usize, class: &'static str) -> bool {
        if line >= self.lines.len() {
            return false;
        }
        let mark = LineMark { line, class };
        if !self.marks.contains(&mark) {
            self.marks.push(mark);
        }
        true
    }

    pub fn remove_line_mark(&mut self, line: usize, class: &'static str) {
        self.marks.retain(|m| !(m.line == line && m.class == class));
    }

    pub fn has_line_mark(&self, line: usize, class: &str) -> bool {
        self.marks.iter().any(|m| m.line == line && m.class == class)
    }

    pub fn line_marks(&self) -> &[LineMark] {
        &self.marks
    }

    // ------------------------------------------------------------------------
    // Offsets
    // ------------------------------------------------------------------------

    /// Total length in chars, counting one per line break.
    pub fn char_len(&self) -> usize {
        let chars: usize = self.lines.iter().map(|l| l.chars().count()).sum();
        chars + self.lines.len().saturating_sub(1)
    }

    /// Converts a char offset into a position (clamped to the end).
    pub fn position_from_offset(&self, offset: usize) -> Position {
        let mut remaining = offset;
        for (idx, line) in self.lines.iter().enumerate() {
            let len = line.chars().count();
            if remaining <= len {
                return Position::new(idx, remaining);
            }
            remaining -= len + 1;
        }
        let last = self.lines.len().saturating_sub(1);
        Position::new(last, self.lines.get(last).map_or(0, |l| l.chars().count()))
    }

    /// Converts a position into a char offset (position is clamped first).
    pub fn offset_from_position(&self, pos: Position) -> usize {
        let pos = self.clamp(pos);
        let before: usize = self.lines[..pos.line]
            .iter()
            .map(|l| l.chars().count() + 1)
            .sum();
        before + pos.col
    }

    /// Finds `needle` verbatim, returning the char offset of the first hit.
    pub fn find(&self, needle: &str) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        let text = self.text();
        text.find(needle).map(|byte| text[..byte].chars().count())
    }

    fn clamp(&self, pos: Position) -> Position {
        let line = pos.line.min(self.lines.len().saturating_sub(1));
        let len = self.lines.get(line).map_or(0, |l| l.chars().count());
        Position::new(line, pos.col.min(len))
    }

    // ------------------------------------------------------------------------
    // Search bar
    // ------------------------------------------------------------------------

    /// Runs a case-insensitive search, selecting the first match.
    ///
    /// Returns the number of matches.
    pub fn search_for(&mut self, query: &str) -> usize {
        let query = query.trim().to_string();
        self.rebuild_search(&query);
        if let Some(&(start, end)) = self.search.matches.first() {
            self.search.index = Some(0);
            self.select_offsets(start, end);
        }
        self.search.matches.len()
    }

    /// Moves to the next (`+1`) or previous (`-1`) match, wrapping around.
    pub fn search_step(&mut self, forward: bool) -> Option<Position> {
        let len = self.search.matches.len();
        if len == 0 {
            return None;
        }
        let current = self.search.index.unwrap_or(0);
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        self.search.index = Some(next);
        let (start, end) = self.search.matches[next];
        self.select_offsets(start, end);
        Some(self.position_from_offset(start))
    }

    pub fn clear_search(&mut self) {
        self.search = SearchState::default();
    }

    fn rebuild_search(&mut self, query: &str) {
        self.search.query = query.to_string();
        self.search.matches.clear();
        self.search.index = None;
        if query.is_empty() {
            return;
        }

        let hay: Vec<char> = self.text().chars().collect();
        let needle: Vec<char> = query.chars().collect();
        let n = needle.len();
        let mut i = 0;
        while i + n <= hay.len() {
            let hit = hay[i..i + n]
                .iter()
                .zip(&needle)
                .all(|(a, b)| a.eq_ignore_ascii_case(b));
            if hit {
                self.search.matches.push((i, i + n));
                i += n;
            } else {
                i += 1;
            }
        }
        if !self.search.matches.is_empty() {
            self.search.index = Some(0);
        }
    }

    fn select_offsets(&mut self, start: usize, end: usize) {
        let from = self.position_from_offset(start);
        let to = self.position_from_offset(end);
        self.set_selection(from, to);
        self.scroll_into_view(from);
    }
}

/// The XML and XSLT buffers of one session.
#[derive(Debug, Clone)]
pub struct SourceBuffers {
    pub xml: SourceBuffer,
    pub xslt: SourceBuffer,
}

impl Default for SourceBuffers {
    fn default() -> Self {
        Self {
            xml: SourceBuffer::new(SourceKind::Xml),
            xslt: SourceBuffer::new(SourceKind::Xslt),
        }
    }
}

impl SourceBuffers {
    pub fn get(&self, source: SourceKind) -> &SourceBuffer {
        match source {
            SourceKind::Xml => &self.xml,
            SourceKind::Xslt => &self.xslt,
        }
    }

    pub fn get_mut(&mut self, source: SourceKind) -> &mut SourceBuffer {
        match source {
            SourceKind::Xml => &mut self.xml,
            SourceKind::Xslt => &mut self.xslt,
        }
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map_or(s.len(), |(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_text_round_trips_exactly() {
        let text = "<a>\r\n  <b>ü</b>\r\n</a>\n";
        let mut buffer = SourceBuffer::new(SourceKind::Xml);
        buffer.set_text(text);
        assert_eq!(buffer.text(), text);
    }

    #[test]
    fn test_change_notice_once_per_edit() {
        let mut buffer = SourceBuffer::new(SourceKind::Xml);
        let notice = buffer.set_text("<a/>").unwrap();
        assert_eq!(notice.revision, 1);
        assert!(buffer.set_text("<a/>").is_none());
        assert_eq!(buffer.revision(), 1);

        buffer.set_cursor(Position::new(0, 4));
        let notice = buffer.insert_str("\n<b/>").unwrap();
        assert_eq!(notice.revision, 2);
        assert_eq!(buffer.text(), "<a/>\n<b/>");
        assert_eq!(buffer.cursor(), Position::new(1, 4));
    }

    #[test]
    fn test_insert_replaces_selection() {
        let mut buffer = SourceBuffer::with_text(SourceKind::Xslt, "hello world");
        buffer.set_selection(Position::new(0, 6), Position::new(0, 11));
        buffer.insert_str("there");
        assert_eq!(buffer.text(), "hello there");
    }

    #[test]
    fn test_delete_prev_joins_lines() {
        let mut buffer = SourceBuffer::with_text(SourceKind::Xml, "ab\ncd");
        buffer.set_cursor(Position::new(1, 0));
        buffer.delete_prev_char();
        assert_eq!(buffer.text(), "abcd");
        assert_eq!(buffer.cursor(), Position::new(0, 2));
        assert!(
            SourceBuffer::with_text(SourceKind::Xml, "x")
                .delete_prev_char()
                .is_none()
        );
    }

    #[test]
    fn test_delete_next_at_end_is_noop() {
        let mut buffer = SourceBuffer::with_text(SourceKind::Xml, "ab");
        buffer.set_cursor(Position::new(0, 2));
        assert!(buffer.delete_next_char().is_none());
        buffer.set_cursor(Position::new(0, 0));
        buffer.delete_next_char();
        assert_eq!(buffer.text(), "b");
    }

    #[test]
    fn test_offset_position_conversion() {
        let buffer = SourceBuffer::with_text(SourceKind::Xml, "abc\nde\nf");
        assert_eq!(buffer.position_from_offset(0), Position::new(0, 0));
        assert_eq!(buffer.position_from_offset(4), Position::new(1, 0));
        assert_eq!(buffer.position_from_offset(6), Position::new(1, 2));
        assert_eq!(buffer.position_from_offset(7), Position::new(2, 0));
        assert_eq!(buffer.position_from_offset(99), Position::new(2, 1));
        assert_eq!(buffer.offset_from_position(Position::new(2, 1)), 8);
    }

    #[test]
    fn test_find_returns_char_offset() {
        let buffer = SourceBuffer::with_text(SourceKind::Xslt, "äöü\nTotal: 5");
        assert_eq!(buffer.find("Total"), Some(4));
        assert_eq!(buffer.find("missing"), None);
        assert_eq!(buffer.find(""), None);
    }

    #[test]
    fn test_line_marks_dropped_when_lines_removed() {
        let mut buffer = SourceBuffer::with_text(SourceKind::Xml, "a\nb\nc");
        assert!(buffer.add_line_mark(2, "error-line"));
        assert!(!buffer.add_line_mark(9, "error-line"));
        buffer.set_text("a");
        assert!(buffer.line_marks().is_empty());
    }

    #[test]
    fn test_search_is_case_insensitive_and_wraps() {
        let mut buffer = SourceBuffer::with_text(SourceKind::Xml, "<ID>1</ID>\n<id>2</id>");
        assert_eq!(buffer.search_for("id"), 4);
        assert_eq!(buffer.search().counter(), "1/4");
        assert_eq!(buffer.selected_text().as_deref(), Some("ID"));

        buffer.search_step(false);
        assert_eq!(buffer.search().counter(), "4/4");
        buffer.search_step(true);
        assert_eq!(buffer.search().counter(), "1/4");

        buffer.clear_search();
        assert_eq!(buffer.search().counter(), "0/0");
    }

    #[test]
    fn test_blank_detection() {
        assert!(SourceBuffer::with_text(SourceKind::Xml, "  \n\t").is_blank());
        assert!(!SourceBuffer::with_text(SourceKind::Xml, " <a/> ").is_blank());
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("XSLT".parse::<SourceKind>().unwrap(), SourceKind::Xslt);
        assert_eq!("xml".parse::<SourceKind>().unwrap(), SourceKind::Xml);
        assert!("html".parse::<SourceKind>().is_err());
    }
}
