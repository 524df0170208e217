//! Diagnostics: engine log parsing and the studio's message log.
//!
//! Engine messages come in a few well-known shapes that point at a source
//! line. `parse_location` recognizes them so a diagnostic can be clicked to
//! jump into the XML or XSLT buffer.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Local};
use regex::Regex;
use serde::Serialize;

use crate::buffer::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

impl DiagnosticLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticLevel::Info => "info",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Error => "error",
        }
    }
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A clickable source location. `line` and `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub source: SourceKind,
    pub line: u32,
    pub column: Option<u32>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} line {}", self.source.label(), self.line)?;
        if let Some(col) = self.column {
            write!(f, ", col {col}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub timestamp: DateTime<Local>,
    pub level: DiagnosticLevel,
    /// Message as displayed (engine tags stripped).
    pub message: String,
    /// Message as received.
    pub raw_message: String,
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            timestamp: Local::now(),
            level,
            location: parse_location(&message),
            raw_message: message.clone(),
            message,
        }
    }

    /// Builds a diagnostic from one engine log line.
    ///
    /// Lines containing `ERROR` are errors, everything else is info. A leading
    /// `[ERROR]` tag is dropped from the displayed message.
    pub fn from_engine_line(line: &str) -> Self {
        let level = if line.contains("ERROR") {
            DiagnosticLevel::Error
        } else {
            DiagnosticLevel::Info
        };
        let message = line
            .strip_prefix("[ERROR]")
            .map_or(line, str::trim_start)
            .to_string();
        Self {
            timestamp: Local::now(),
            level,
            location: parse_location(line),
            raw_message: line.to_string(),
            message,
        }
    }

    pub fn is_clickable(&self) -> bool {
        self.location.is_some()
    }

    /// One-line rendering used by the CLI log panel.
    pub fn display_line(&self) -> String {
        let time = self.timestamp.format("%H:%M:%S");
        match self.location {
            Some(loc) => format!("[{time}] {:<7} {} ({loc})", self.level.as_str(), self.message),
            None => format!("[{time}] {:<7} {}", self.level.as_str(), self.message),
        }
    }
}

fn saxon_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)error on line (\d+)(?:\s+column (\d+))?\s+of\s+(\S+)")
            .expect("valid saxon location regex")
    })
}

fn sax_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)lineNumber:\s*(\d+);\s*columnNumber:\s*(\d+)")
            .expect("valid lineNumber regex")
    })
}

fn src_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[SRC:(xml|xslt)\s+L:(\d+)(?:\s+C:(\w+))?\]").expect("valid SRC tag regex")
    })
}

/// Extracts a source location from an engine message.
///
/// Recognized shapes, tried in order:
/// 1. `Error on line L column C of FILE:`
/// 2. `lineNumber: L; columnNumber: C` with a file name elsewhere in the message
/// 3. `[SRC:xml L:12 C:3]` tags added by the transform service
pub fn parse_location(message: &str) -> Option<SourceLocation> {
    let mut line = None;
    let mut column = None;
    let mut source = None;

    if let Some(caps) = saxon_regex().captures(message) {
        line = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        column = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
        let file = caps
            .get(3)
            .map(|m| m.as_str().trim_end_matches(':').to_ascii_lowercase())
            .unwrap_or_default();
        source = source_from_extension(&file);
    }

    if (line.is_none() || source.is_none())
        && let Some(caps) = sax_regex().captures(message)
    {
        line = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        column = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
        source = source_from_mention(message);
    }

    if (line.is_none() || source.is_none())
        && let Some(caps) = src_tag_regex().captures(message)
    {
        source = caps.get(1).and_then(|m| m.as_str().parse::<SourceKind>().ok());
        line = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
        column = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok());
    }

    let line = line.filter(|&l| l >= 1)?;
    Some(SourceLocation {
        source: source?,
        line,
        column: column.filter(|&c| c >= 1),
    })
}

fn source_from_extension(file: &str) -> Option<SourceKind> {
    if file.ends_with(".xslt") || file.ends_with(".xsl") {
        Some(SourceKind::Xslt)
    } else if file.ends_with(".xml") {
        Some(SourceKind::Xml)
    } else {
        None
    }
}

fn source_from_mention(message: &str) -> Option<SourceKind> {
    let lower = message.to_ascii_lowercase();
    if lower.contains("stylesheet.xslt") || lower.contains(".xslt") {
        Some(SourceKind::Xslt)
    } else if lower.contains("input.xml") || lower.contains(".xml") {
        Some(SourceKind::Xml)
    } else {
        None
    }
}

/// Ordered, timestamped message log.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: DiagnosticLevel, message: impl Into<String>) -> usize {
        let diagnostic = Diagnostic::new(level, message);
        tracing::debug!(level = %diagnostic.level, text = %diagnostic.message, "studio log");
        self.entries.push(diagnostic);
        self.entries.len() - 1
    }

    pub fn info(&mut self, message: impl Into<String>) -> usize {
        self.push(DiagnosticLevel::Info, message)
    }

    pub fn warn(&mut self, message: impl Into<String>) -> usize {
        self.push(DiagnosticLevel::Warning, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> usize {
        self.push(DiagnosticLevel::Error, message)
    }

    /// Appends one diagnostic per engine log line, skipping blank lines.
    pub fn extend_from_engine_log<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) {
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            self.entries.push(Diagnostic::from_engine_line(line));
        }
    }

    pub fn get(&self, index: usize) -> Option<&Diagnostic> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logged_diagnostic_parts_serialize() {
        let mut log = DiagnosticLog::new();
        log.error("Error on line 9 column 5 of stylesheet.xslt:");
        let entry = log.entries()[0].clone();
        let json = serde_json::json!({ "level": entry.level, "location": entry.location });
        assert_eq!(
            json,
            serde_json::json!({
                "level": "error",
                "location": { "source": "xslt", "line": 9, "column": 5 },
            })
        );
    }

    #[test]
    fn test_saxon_error_line() {
        let loc = parse_location("Error on line 9 column 5 of stylesheet.xslt:").unwrap();
        assert_eq!(
            loc,
            SourceLocation {
                source: SourceKind::Xslt,
                line: 9,
                column: Some(5)
            }
        );
    }

    #[test]
    fn test_saxon_error_without_column() {
        let loc = parse_location("  Error on line 3 of input.xml:").unwrap();
        assert_eq!(loc.source, SourceKind::Xml);
        assert_eq!(loc.line, 3);
        assert_eq!(loc.column, None);
    }

    #[test]
    fn test_sax_style_location() {
        let msg = "org.xml.sax.SAXParseException; systemId: file:/tmp/x/input.xml; lineNumber: 4; columnNumber: 12; bad";
        let loc = parse_location(msg).unwrap();
        assert_eq!(loc.source, SourceKind::Xml);
        assert_eq!((loc.line, loc.column), (4, Some(12)));

        let msg = "stylesheet.xslt lineNumber: 2; columnNumber: 1";
        assert_eq!(parse_location(msg).unwrap().source, SourceKind::Xslt);
    }

    #[test]
    fn test_src_tag_location() {
        let loc = parse_location("[ERROR] XSLT compile failed [SRC:xslt L:12 C:3]").unwrap();
        assert_eq!(loc.source, SourceKind::Xslt);
        assert_eq!((loc.line, loc.column), (12, Some(3)));
        let loc = parse_location("[SRC:xml L:7]").unwrap();
        assert_eq!((loc.source, loc.line, loc.column), (SourceKind::Xml, 7, None));
        let loc = parse_location("[ERROR] [SRC:xml L:5 C:None] Premature end").unwrap();
        assert_eq!((loc.line, loc.column), (5, None));
    }

    #[test]
    fn test_unrecognized_message_has_no_location() {
        assert!(parse_location("Transformation succeeded with lxml").is_none());
        assert!(parse_location("Error on line 4 of somefile.txt:").is_none());
    }

    #[test]
    fn test_line_zero_rejected() {
        assert!(parse_location("Error on line 0 column 1 of stylesheet.xslt:").is_none());
    }

    #[test]
    fn test_engine_line_levels() {
        let d = Diagnostic::from_engine_line("[ERROR] Error on line 2 of stylesheet.xsl:");
        assert_eq!(d.level, DiagnosticLevel::Error);
        assert_eq!(d.message, "Error on line 2 of stylesheet.xsl:");
        assert!(d.raw_message.starts_with("[ERROR]"));
        assert_eq!(d.location.unwrap().source, SourceKind::Xslt);

        let d = Diagnostic::from_engine_line("[INFO] Transformation ran with lxml");
        assert_eq!(d.level, DiagnosticLevel::Info);
        assert!(!d.is_clickable());
    }

    #[test]
    fn test_log_extend_skips_blank_lines() {
        let mut log = DiagnosticLog::new();
        log.info("Application initialized.");
        log.extend_from_engine_log(["first", "", "  ", "ERROR second"]);
        assert_eq!(log.len(), 3);
        assert_eq!(log.get(2).unwrap().level, DiagnosticLevel::Error);
        log.clear();
        assert!(log.is_empty());
    }
}
