use serde::{Deserialize, Serialize};
use std::fmt;
use stylescope_parser::ast::Span;

/// Severity level of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

/// Identity of a reported problem, with its parameters.
///
/// The code string and parameters are stable; callers match on them.
/// Wording of [`DiagnosticKind::message`] may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    CannotResolveExtend { name: String },
    UnknownVar { name: String },
    UnknownImportedFile { path: String },
    UnknownImportedSymbol { name: String, path: String },
    CyclicImport { name: String },
    UnknownCustomSelector { selector: String },
    UnknownMixin { name: String },
    FromPropertyMissingInImport,
    CannotExtendInComplexSelector { selector: String },
    InvalidSyntax { path: String, message: String },
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::CannotResolveExtend { .. } => "CANNOT_RESOLVE_EXTEND",
            DiagnosticKind::UnknownVar { .. } => "UNKNOWN_VAR",
            DiagnosticKind::UnknownImportedFile { .. } => "UNKNOWN_IMPORTED_FILE",
            DiagnosticKind::UnknownImportedSymbol { .. } => "UNKNOWN_IMPORTED_SYMBOL",
            DiagnosticKind::CyclicImport { .. } => "CYCLIC_IMPORT",
            DiagnosticKind::UnknownCustomSelector { .. } => "UNKNOWN_CUSTOM_SELECTOR",
            DiagnosticKind::UnknownMixin { .. } => "UNKNOWN_MIXIN",
            DiagnosticKind::FromPropertyMissingInImport => "FROM_PROPERTY_MISSING_IN_IMPORT",
            DiagnosticKind::CannotExtendInComplexSelector { .. } => {
                "CANNOT_EXTEND_IN_COMPLEX_SELECTOR"
            }
            DiagnosticKind::InvalidSyntax { .. } => "INVALID_SYNTAX",
        }
    }

    pub fn message(&self) -> String {
        match self {
            DiagnosticKind::CannotResolveExtend { name } => {
                format!("could not resolve '{}'", name)
            }
            DiagnosticKind::UnknownVar { name } => format!("unknown var \"{}\"", name),
            DiagnosticKind::UnknownImportedFile { path } => {
                format!("cannot resolve imported file: \"{}\"", path)
            }
            DiagnosticKind::UnknownImportedSymbol { name, path } => {
                format!("cannot resolve imported symbol \"{}\" from \"{}\"", name, path)
            }
            DiagnosticKind::CyclicImport { name } => {
                format!("cyclic import while resolving \"{}\"", name)
            }
            DiagnosticKind::UnknownCustomSelector { selector } => {
                format!("the selector '{}' is undefined", selector)
            }
            DiagnosticKind::UnknownMixin { name } => format!("unknown mixin: \"{}\"", name),
            DiagnosticKind::FromPropertyMissingInImport => {
                "\"-st-from\" is missing in :import block".to_string()
            }
            DiagnosticKind::CannotExtendInComplexSelector { selector } => {
                format!("cannot extend in complex selector \"{}\"", selector)
            }
            DiagnosticKind::InvalidSyntax { path, message } => {
                format!("invalid syntax in \"{}\": {}", path, message)
            }
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// Where a diagnostic points: file, byte range, and optionally the word
/// inside that range that caused it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Locator {
    pub path: Option<String>,
    pub span: Span,
    pub word: Option<String>,
}

impl Locator {
    pub fn new(path: Option<&str>, span: Span) -> Self {
        Self {
            path: path.map(str::to_string),
            span,
            word: None,
        }
    }

    pub fn with_word(mut self, word: impl Into<String>) -> Self {
        self.word = Some(word.into());
        self
    }
}

/// A reported problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub kind: DiagnosticKind,
    pub message: String,
    pub locator: Locator,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, locator: Locator) -> Self {
        Self::new(DiagnosticLevel::Error, kind, locator)
    }

    pub fn warning(kind: DiagnosticKind, locator: Locator) -> Self {
        Self::new(DiagnosticLevel::Warning, kind, locator)
    }

    fn new(level: DiagnosticLevel, kind: DiagnosticKind, locator: Locator) -> Self {
        Self {
            level,
            message: kind.message(),
            kind,
            locator,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Info => "info",
        };
        write!(f, "[{}] {}: {}", level, self.code(), self.message)?;
        if let Some(path) = &self.locator.path {
            write!(f, " ({}:{})", path, self.locator.span.start)?;
        }
        Ok(())
    }
}

/// Ordered, append-only collection of diagnostics for one compile session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn warn(&mut self, kind: DiagnosticKind, locator: Locator) {
        self.report(Diagnostic::warning(kind, locator));
    }

    pub fn error(&mut self, kind: DiagnosticKind, locator: Locator) {
        self.report(Diagnostic::error(kind, locator));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|d| d.level == DiagnosticLevel::Error)
    }

    /// Entries with the given code
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.entries.iter().filter(move |d| d.code() == code)
    }

    pub fn contains(&self, kind: &DiagnosticKind) -> bool {
        self.entries.iter().any(|d| &d.kind == kind)
    }

    /// Entries reported since `mark` (a previous `len()`)
    pub fn since(&self, mark: usize) -> &[Diagnostic] {
        &self.entries[mark.min(self.entries.len())..]
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Pretty-print a diagnostic with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_diagnostic(source: &str, diagnostic: &Diagnostic) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let filename = diagnostic.locator.path.as_deref().unwrap_or("<anonymous>");
    let span = diagnostic.locator.span;
    let start = span.start.min(source.len());
    let end = span.end.clamp(start, source.len());

    let (kind, color) = match diagnostic.level {
        DiagnosticLevel::Error => (ReportKind::Error, Color::Red),
        DiagnosticLevel::Warning => (ReportKind::Warning, Color::Yellow),
        DiagnosticLevel::Info => (ReportKind::Advice, Color::Blue),
    };

    let label = diagnostic
        .locator
        .word
        .clone()
        .unwrap_or_else(|| diagnostic.code().to_string());

    let mut output = Vec::new();
    let report = Report::build(kind, filename, start)
        .with_code(diagnostic.code())
        .with_message(&diagnostic.message)
        .with_label(
            Label::new((filename, start..end))
                .with_color(color)
                .with_message(label),
        )
        .finish();

    if report
        .write((filename, Source::from(source)), &mut output)
        .is_err()
    {
        return diagnostic.to_string();
    }

    String::from_utf8(output).unwrap_or_else(|_| diagnostic.to_string())
}
