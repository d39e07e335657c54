//! peacock-lang: the Peacock to JavaScript compiler front end.
//!
//! Compilation runs in three passes over the whole source:
//!
//! 1. **Lexing**: [`tokenize`] turns source text into a token vector with one
//!    `Newline` token per non-blank line.
//! 2. **Parsing**: [`parse`] builds the AST. Destructuring, `case` clauses and
//!    case functions are desugared into schema checks while parsing.
//! 3. **Code generation**: [`Codegen`] hoists reassigned names and writes
//!    JavaScript for the Peacock runtime.
//!
//! [`schema`] models the runtime's schema semantics so the generator can
//! spot `when` clauses that can never be reached.
//!
//! # Example
//!
//! ```
//! use peacock_lang::{compile, CodegenOptions};
//!
//! let output = compile("a := 3", CodegenOptions::default()).unwrap();
//! assert_eq!(output.code, "const a = 3;\n");
//! ```

mod ast;
mod class;
mod codegen;
mod hoist;
mod lexer;
mod parser;
mod pattern;
pub mod schema;
mod span;
mod token;

// Re-exports
pub use ast::*;
pub use codegen::{js_ident, Codegen, CodegenOptions, Warning};
pub use hoist::{hoist, hoist_block, hoist_block_in_scope, hoist_in_scope, Enclosing};
pub use lexer::{tokenize, LexError, Lexer};
pub use parser::{parse, ParseError, Parser};
pub use pattern::{args_schema, find_bound_variables, mark_pattern, path_lookup, to_schema};
pub use span::{LineIndex, Span};
pub use token::{StrSegment, Token, TokenKind};

/// Generated JavaScript plus the warnings found along the way.
#[derive(Debug, Clone)]
pub struct Output {
    pub code: String,
    pub warnings: Vec<Warning>,
}

/// Tokenize and parse `source`.
pub fn tokenize_parse(source: &str) -> Result<Vec<Expr>, ParseError> {
    let tokens = tokenize(source)?;
    parse(&tokens, source)
}

/// Compile Peacock source to JavaScript.
pub fn compile(source: &str, options: CodegenOptions) -> Result<Output, ParseError> {
    let program = tokenize_parse(source)?;
    let (code, warnings) = Codegen::new(&program, options).generate_with_warnings();
    Ok(Output { code, warnings })
}
