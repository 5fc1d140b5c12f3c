//! Diagnostic reporting infrastructure.
//!
//! Diagnostics are built with a fluent API and rendered to stderr as an
//! ANSI-colored banner followed by source excerpts:
//!
//! ```text
//! error: got an unexpected ';' token
//!  1 | main :: proc() {
//!  2 |     return ;
//!    |            ~ unexpected token
//!  3 | }
//! help: expected an expression
//! ```
//!
//! Error excerpts underline the offending span with `~`, informational
//! excerpts with `-`. Line and column numbers are computed by a linear scan
//! from the start of the source buffer; diagnostics are rare enough that
//! this costs nothing in practice.

use std::fmt;
use std::fmt::Write as _;

use colored::{ColoredString, Colorize};

use crate::span::Span;

/// Lines of context shown above and below an excerpt's target line.
const CONTEXT_LINES: usize = 1;

/// Diagnostic severity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    /// An error that aborts the compilation.
    Error,
    /// Additional information attached to a diagnostic.
    Note,
    /// A suggestion for fixing the issue.
    Help,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Note => write!(f, "note"),
            Level::Help => write!(f, "help"),
        }
    }
}

/// Underline style of a source excerpt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UnderlineStyle {
    /// `~~~~` in red, for the primary span of an error.
    Error,
    /// `----` in blue, for secondary anchors ("perhaps you forgot ...").
    Info,
}

/// A source excerpt with an underlined span and a trailing label.
#[derive(Clone, Debug)]
struct Excerpt {
    span: Span,
    label: String,
    style: UnderlineStyle,
}

/// One ordered piece of a diagnostic's body.
#[derive(Clone, Debug)]
enum Part {
    Excerpt(Excerpt),
    Note(String),
    Help(String),
}

/// A diagnostic message with ordered excerpts, notes, and help lines.
///
/// Parts render in insertion order, so call sites control the layout the
/// same way the underlying messages are worded.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    level: Level,
    message: String,
    parts: Vec<Part>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
            parts: Vec::new(),
        }
    }

    /// Attaches a source excerpt underlined in the diagnostic's own style.
    pub fn with_snippet(mut self, span: Span, label: impl Into<String>) -> Self {
        self.parts.push(Part::Excerpt(Excerpt {
            span,
            label: label.into(),
            style: UnderlineStyle::Error,
        }));
        self
    }

    /// Attaches an informational excerpt (`----` underline).
    pub fn with_info_snippet(mut self, span: Span, label: impl Into<String>) -> Self {
        self.parts.push(Part::Excerpt(Excerpt {
            span,
            label: label.into(),
            style: UnderlineStyle::Info,
        }));
        self
    }

    /// Appends a `note:` line.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.parts.push(Part::Note(note.into()));
        self
    }

    /// Appends a `help:` line.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.parts.push(Part::Help(help.into()));
        self
    }

    /// Renders the diagnostic to stderr through `renderer`.
    pub fn emit(&self, renderer: &Renderer<'_>) {
        renderer.emit(self);
    }
}

/// Renders diagnostics against a source buffer.
pub struct Renderer<'src> {
    source: &'src str,
}

impl<'src> Renderer<'src> {
    /// Creates a renderer over `source`.
    pub fn new(source: &'src str) -> Self {
        Self { source }
    }

    /// Renders `diag` and writes it to stderr.
    pub fn emit(&self, diag: &Diagnostic) {
        eprint!("{}", self.render(diag));
    }

    /// Renders `diag` to a string.
    pub fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        let banner = match diag.level {
            Level::Error => "error".red().bold(),
            Level::Note => "note".blue().bold(),
            Level::Help => "help".blue().bold(),
        };
        let _ = writeln!(out, "{}: {}", banner, diag.message);

        let mut prev_was_excerpt = false;
        for part in &diag.parts {
            match part {
                Part::Excerpt(excerpt) => {
                    if prev_was_excerpt {
                        out.push('\n');
                    }
                    self.render_excerpt(&mut out, excerpt);
                    prev_was_excerpt = true;
                }
                Part::Note(note) => {
                    let _ = writeln!(out, "{}: {}", "note".blue().bold(), note);
                }
                Part::Help(help) => {
                    let _ = writeln!(out, "{}: {}", "help".blue().bold(), help);
                }
            }
        }

        out
    }

    fn render_excerpt(&self, out: &mut String, excerpt: &Excerpt) {
        let lines: Vec<&str> = self.source.split('\n').collect();

        let pos = excerpt.span.start.min(self.source.len());
        let line_idx = self.source[..pos].bytes().filter(|&b| b == b'\n').count();
        let line_start = self.source[..pos].rfind('\n').map_or(0, |i| i + 1);
        let col = pos - line_start;

        let first = line_idx.saturating_sub(CONTEXT_LINES);
        let last = (line_idx + CONTEXT_LINES).min(lines.len().saturating_sub(1));
        let gutter = (last + 1).to_string().len();

        let rule = "|".blue().bold();

        for idx in first..=last {
            let _ = writeln!(out, " {:>gutter$} {} {}", idx + 1, rule, lines[idx]);

            if idx == line_idx {
                // Underline clamped to the target line.
                let room = lines[idx].len().saturating_sub(col).max(1);
                let width = excerpt.span.len().max(1).min(room);
                let marker = match excerpt.style {
                    UnderlineStyle::Error => "~",
                    UnderlineStyle::Info => "-",
                };
                let text = format!("{} {}", marker.repeat(width), excerpt.label);
                let underline = colorize(&text, excerpt.style);
                let _ = writeln!(out, " {:>gutter$} {} {:col$}{}", "", rule, "", underline);
            }
        }
    }
}

fn colorize(text: &str, style: UnderlineStyle) -> ColoredString {
    match style {
        UnderlineStyle::Error => text.red().bold(),
        UnderlineStyle::Info => text.blue().bold(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(src: &str, diag: &Diagnostic) -> String {
        colored::control::set_override(false);
        Renderer::new(src).render(diag)
    }

    #[test]
    fn test_level_display() {
        assert_eq!(format!("{}", Level::Error), "error");
        assert_eq!(format!("{}", Level::Note), "note");
        assert_eq!(format!("{}", Level::Help), "help");
    }

    #[test]
    fn test_banner_only() {
        let diag = Diagnostic::error("something went wrong");
        assert_eq!(render("", &diag), "error: something went wrong\n");
    }

    #[test]
    fn test_excerpt_underlines_span() {
        let src = "first\nK :: zzz;\nlast";
        let diag = Diagnostic::error("undefined identifier")
            .with_snippet(Span::new(11, 14), "not found in this scope");
        let rendered = render(src, &diag);

        assert!(rendered.contains("error: undefined identifier"));
        assert!(rendered.contains(" 1 | first"));
        assert!(rendered.contains(" 2 | K :: zzz;"));
        assert!(rendered.contains("~~~ not found in this scope"));
        assert!(rendered.contains(" 3 | last"));
    }

    #[test]
    fn test_caret_column_matches_span() {
        let src = "return zzz;";
        let diag = Diagnostic::error("undefined identifier").with_snippet(Span::new(7, 10), "here");
        let rendered = render(src, &diag);

        let caret_line = rendered
            .lines()
            .find(|l| l.contains('~'))
            .expect("caret line");
        // "  | " prefix is 5 bytes wide for a 1-digit gutter, then 7 columns.
        assert_eq!(caret_line.find('~').unwrap(), 5 + 7);
        assert!(caret_line.contains("~~~ here"));
    }

    #[test]
    fn test_info_excerpt_uses_dashes() {
        let src = "x := 1";
        let diag = Diagnostic::error("oops").with_info_snippet(Span::new(0, 1), "declared here");
        let rendered = render(src, &diag);
        assert!(rendered.contains("- declared here"));
        assert!(!rendered.contains('~'));
    }

    #[test]
    fn test_notes_and_helps_in_order() {
        let diag = Diagnostic::error("use of invalid token")
            .with_help("perhaps you meant to use '!='")
            .with_note("only identifiers, keywords and integers are lexed");
        let rendered = render("", &diag);

        let help_at = rendered.find("help:").unwrap();
        let note_at = rendered.find("note:").unwrap();
        assert!(help_at < note_at);
    }

    #[test]
    fn test_span_past_end_of_source() {
        let src = "K :: 5";
        let diag = Diagnostic::error("input unexpectedly ended")
            .with_info_snippet(Span::point(src.len() + 3), "here");
        // Must clamp instead of panicking; anchored on the last line.
        let rendered = render(src, &diag);
        assert!(rendered.contains(" 1 | K :: 5"));
    }

    #[test]
    fn test_blank_line_between_excerpts() {
        let src = "a := 1;\nb := 2;";
        let diag = Diagnostic::error("two anchors")
            .with_snippet(Span::new(0, 1), "first")
            .with_info_snippet(Span::new(8, 9), "second");
        let rendered = render(src, &diag);
        assert!(rendered.contains("\n\n"));
    }
}
