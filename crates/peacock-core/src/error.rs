use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use peacock_lang::{LexError, LineIndex, ParseError, Span};
use thiserror::Error;

/// Core error type for peacock operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Lex error: {}", .0.message)]
    Lex(#[from] LexError),

    #[error("Parse error: {}", .0.message)]
    Parse(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Source span of a lex or parse error.
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lex(err) => Some(err.span),
            Self::Parse(err) => Some(err.span),
            _ => None,
        }
    }

    /// 1-based line and column of a lex or parse error in `source`.
    #[must_use]
    pub fn location(&self, source: &str) -> Option<(u32, u32)> {
        self.span()
            .map(|span| LineIndex::new(source).line_col(span.start))
    }

    /// Bare message without the error kind prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Lex(err) => err.message.clone(),
            Self::Parse(err) => err.message.clone(),
            other => other.to_string(),
        }
    }

    /// Attach the source text, for a report that points at the failing code.
    #[must_use]
    pub fn with_source(self, name: impl AsRef<str>, source: &str) -> SourceDiagnostic {
        let (line, column) = self.location(source).unwrap_or((1, 1));
        let span = self.span().unwrap_or_default();
        let label = match &self {
            Self::Lex(_) => "not valid here".to_string(),
            Self::Parse(err) => match &err.expected {
                Some(expected) => format!("expected {expected}"),
                None => "here".to_string(),
            },
            _ => String::new(),
        };

        SourceDiagnostic {
            message: format!("{} ({line}:{column})", self.message()),
            src: NamedSource::new(name, source.to_string()),
            span: (span.start as usize, span.len() as usize).into(),
            label,
            line,
            column,
        }
    }
}

/// A compile error rendered against its source file.
#[derive(Error, Debug, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(peacock::compile))]
pub struct SourceDiagnostic {
    pub message: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("{label}")]
    pub span: SourceSpan,
    pub label: String,
    pub line: u32,
    pub column: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error(source: &str) -> Error {
        peacock_lang::tokenize_parse(source).unwrap_err().into()
    }

    #[test]
    fn test_location_is_one_based() {
        let err = parse_error("a := 1\nb := )");
        assert_eq!(err.location("a := 1\nb := )"), Some((2, 6)));
    }

    #[test]
    fn test_source_diagnostic_carries_position() {
        let source = "x := [1,\n";
        let diagnostic = parse_error(source).with_source("main.pea", source);
        let position = format!("({}:{})", diagnostic.line, diagnostic.column);
        assert!(diagnostic.message.contains(&position), "{}", diagnostic.message);
    }

    #[test]
    fn test_io_error_has_no_location() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.location(""), None);
        assert!(err.to_string().contains("gone"));
    }
}
