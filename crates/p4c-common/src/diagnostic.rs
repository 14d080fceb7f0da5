//! Diagnostic accumulation and rendering.
//!
//! Passes never abort on a semantic error. They record a [`Diagnostic`] in
//! the [`Diagnostics`] accumulator owned by the pipeline context and keep
//! going so one run reports as much as possible. The pass manager checks
//! [`Diagnostics::error_count`] at every pass boundary.

use std::fmt;
use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::source::SourceMap;
use crate::span::SourceInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable code, e.g. `"E0001"`.
    pub code: &'static str,
    pub message: String,
    pub span: Option<SourceInfo>,
    /// Text attached to the primary span.
    pub label: Option<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span: None,
            label: None,
            help: None,
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn with_span(mut self, span: Option<SourceInfo>) -> Self {
        self.span = span;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(span) = &self.span {
            write!(f, " at {span}")?;
        }
        Ok(())
    }
}

/// Append-only diagnostic accumulator for one compilation.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    errors: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.errors += 1;
        }
        self.entries.push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.entries.len() - self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.is_error())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render every diagnostic, in report order.
    pub fn render_all(&self, sources: &SourceMap, options: &DiagnosticOptions) -> Vec<String> {
        self.entries
            .iter()
            .map(|d| render_diagnostic(d, sources, options))
            .collect()
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        for diagnostic in iter {
            self.report(diagnostic);
        }
    }
}

// ── Rendering ──────────────────────────────────────────────────────────

/// Rendering options.
#[derive(Debug, Clone)]
pub struct DiagnosticOptions {
    pub color: bool,
}

impl DiagnosticOptions {
    /// Colorless options for deterministic output (tests, dumps).
    pub fn colorless() -> Self {
        Self { color: false }
    }
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        Self { color: true }
    }
}

/// Render one diagnostic with ariadne.
///
/// Diagnostics without a position, or whose source is not in `sources`,
/// fall back to the one-line `Display` form.
pub fn render_diagnostic(
    diagnostic: &Diagnostic,
    sources: &SourceMap,
    options: &DiagnosticOptions,
) -> String {
    let Some((span, file)) = diagnostic
        .span
        .and_then(|span| sources.get(span.source).map(|file| (span, file)))
    else {
        return format!("{diagnostic}\n");
    };

    let source_len = file.text.len();
    let range = clamp(span.byte_range(), source_len);
    let kind = match diagnostic.severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    };
    let color = match diagnostic.severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
    };

    let mut builder = Report::build(kind, range.clone())
        .with_code(diagnostic.code)
        .with_message(&diagnostic.message)
        .with_config(Config::default().with_color(options.color));
    let label = diagnostic.label.as_deref().unwrap_or(&diagnostic.message);
    builder.add_label(Label::new(range).with_message(label).with_color(color));
    if let Some(help) = &diagnostic.help {
        builder.set_help(help);
    }

    let mut buf = Vec::new();
    if builder
        .finish()
        .write(Source::from(file.text.as_str()), &mut buf)
        .is_err()
    {
        return format!("{diagnostic}\n");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Clamp a range into the source; ariadne needs at least one character.
fn clamp(range: Range<usize>, source_len: usize) -> Range<usize> {
    let start = range.start.min(source_len);
    let end = range.end.min(source_len).max(start);
    if start == end {
        start..end.saturating_add(1).min(source_len)
    } else {
        start..end
    }
}
