//! The compile pipeline: tokenize, parse, generate, bundle.
//!
//! ```
//! use peacock_core::compiler::{compile, CompileOptions};
//!
//! let output = compile("a := 3", &CompileOptions::default().with_bundle(false)).unwrap();
//! assert_eq!(output.code, "const a = 3;\n");
//! ```

use std::time::Instant;

use peacock_lang::{parse, tokenize, Codegen, CodegenOptions, Expr, Token, Warning};
use serde::Serialize;
use tracing::{debug, debug_span, warn};

use crate::config::Config;
use crate::error::Error;
use crate::runtime;

/// Options for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Prepend the runtime so the output runs on its own.
    pub bundle: bool,
    /// Spaces per indentation level.
    pub indent: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            bundle: true,
            indent: 2,
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn with_bundle(mut self, bundle: bool) -> Self {
        self.bundle = bundle;
        self
    }

    #[must_use]
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }
}

impl From<&Config> for CompileOptions {
    fn from(config: &Config) -> Self {
        Self {
            bundle: config.bundle,
            indent: config.indent,
        }
    }
}

/// Result of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub code: String,
    pub warnings: Vec<Warning>,
}

/// A warning with its position resolved, for reports.
#[derive(Debug, Clone, Serialize)]
pub struct WarningInfo {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl WarningInfo {
    #[must_use]
    pub fn new(warning: &Warning, source: &str) -> Self {
        let (line, column) = peacock_lang::LineIndex::new(source).line_col(warning.span.start);
        Self {
            message: warning.message.clone(),
            line,
            column,
        }
    }
}

/// Token stream of `source`.
pub fn tokens(source: &str) -> Result<Vec<Token>, Error> {
    let _span = debug_span!("lex", bytes = source.len()).entered();
    let start = Instant::now();
    let tokens = tokenize(source)?;
    debug!(count = tokens.len(), elapsed_us = start.elapsed().as_micros() as u64, "tokenized");
    Ok(tokens)
}

/// AST of `source`.
pub fn ast(source: &str) -> Result<Vec<Expr>, Error> {
    let tokens = tokens(source)?;
    let _span = debug_span!("parse", tokens = tokens.len()).entered();
    let start = Instant::now();
    let program = parse(&tokens, source)?;
    debug!(nodes = program.len(), elapsed_us = start.elapsed().as_micros() as u64, "parsed");
    Ok(program)
}

/// Compile Peacock source to JavaScript.
pub fn compile(source: &str, options: &CompileOptions) -> Result<CompileOutput, Error> {
    let program = ast(source)?;

    let _span = debug_span!("codegen", bundle = options.bundle).entered();
    let start = Instant::now();
    let (code, warnings) = Codegen::new(
        &program,
        CodegenOptions {
            indent: options.indent,
        },
    )
    .generate_with_warnings();
    debug!(bytes = code.len(), elapsed_us = start.elapsed().as_micros() as u64, "generated");

    for warning in &warnings {
        let info = WarningInfo::new(warning, source);
        warn!(line = info.line, column = info.column, "{}", info.message);
    }

    let code = if options.bundle {
        runtime::bundle(&code)
    } else {
        code
    };
    Ok(CompileOutput { code, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standalone() -> CompileOptions {
        CompileOptions::default().with_bundle(false)
    }

    #[test]
    fn test_compile_standalone() {
        let output = compile("def add(a, b) = a + b", &standalone()).unwrap();
        assert!(output.code.contains("a.__plus__(b)"));
        assert!(!output.code.contains("class Schema"));
    }

    #[test]
    fn test_compile_bundled() {
        let output = compile("a := 3", &CompileOptions::default()).unwrap();
        assert!(output.code.starts_with(runtime::RUNTIME));
        assert!(output.code.ends_with("const a = 3;\n"));
    }

    #[test]
    fn test_indent_option() {
        let output = compile("def f = 1", &standalone().with_indent(4)).unwrap();
        assert!(output.code.contains("\n    return 1;"));
    }

    #[test]
    fn test_lex_error() {
        let err = compile("a := \"open", &standalone()).unwrap_err();
        assert!(matches!(err, Error::Lex(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = compile("def = 1", &standalone()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.location("def = 1").is_some());
    }

    #[test]
    fn test_warnings_are_returned() {
        let source = "case function f\nwhen (x)\n  x\nwhen (2)\n  2\nend";
        let output = compile(source, &standalone()).unwrap();
        assert_eq!(output.warnings.len(), 1);
        let info = WarningInfo::new(&output.warnings[0], source);
        assert_eq!(info.line, 4);
    }

    #[test]
    fn test_options_from_config() {
        let config = Config::new(".".into()).with_bundle(false).with_indent(3);
        assert_eq!(
            CompileOptions::from(&config),
            CompileOptions {
                bundle: false,
                indent: 3
            }
        );
    }
}
