//! Token types for Peacock source.

use crate::span::Span;

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    #[inline]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// One piece of a string literal containing `#{...}` interpolation.
#[derive(Debug, Clone, PartialEq)]
pub enum StrSegment {
    /// Literal text, escapes already resolved.
    Text(String),
    /// Embedded source code and the byte offset where it starts.
    Code { source: String, offset: u32 },
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // === Literals ===
    /// Identifier: `foo`, `empty?`, `save!`
    Identifier(String),
    /// Integer literal: `42`
    Int(i64),
    /// Float literal: `3.14`
    Float(f64),
    /// String literal without interpolation
    Str(String),
    /// String literal with at least one `#{...}` segment
    InterpolatedStr(Vec<StrSegment>),
    /// Symbol literal: `:ok`
    Symbol(String),
    /// Instance property: `@name`
    InstanceProperty(String),
    /// Class property: `::name`
    ClassProperty(String),

    // === Keywords ===
    Def,
    Fn,
    Do,
    End,
    If,
    Else,
    Case,
    When,
    Function,
    Return,
    Schema,
    Class,
    For,
    In,
    Of,
    While,
    Import,
    Export,
    From,
    As,
    True,
    False,
    Nil,
    SelfKw,
    Throw,

    // === Punctuation ===
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }
    Comma,    // ,
    Dot,      // .
    Colon,    // :
    Semicolon, // ;
    ColonEq,  // :=
    Arrow,    // =>
    Question, // ?
    QuestionDot, // ?.
    DotDot,   // ..
    DotDotDot, // ...
    PercentBrace, // %{

    // === Operators ===
    Eq,       // =
    EqEq,     // ==
    BangEq,   // !=
    Lt,       // <
    LtEq,     // <=
    Gt,       // >
    GtEq,     // >=
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    Percent,  // %
    Bang,     // !
    AmpAmp,   // &&
    PipePipe, // ||
    Pipe,     // |
    Amp,      // &
    PipeGt,   // |>

    // === Layout ===
    /// End of a physical line that produced at least one token.
    Newline,
}

impl TokenKind {
    /// Check if this token can start an operand.
    pub fn can_start_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::InterpolatedStr(_)
                | TokenKind::Symbol(_)
                | TokenKind::InstanceProperty(_)
                | TokenKind::ClassProperty(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
                | TokenKind::SelfKw
                | TokenKind::Fn
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::PercentBrace
                | TokenKind::Bang
                | TokenKind::DotDotDot
        )
    }

    /// Check if this is a reserved word.
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Def
                | TokenKind::Fn
                | TokenKind::Do
                | TokenKind::End
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::Case
                | TokenKind::When
                | TokenKind::Function
                | TokenKind::Return
                | TokenKind::Schema
                | TokenKind::Class
                | TokenKind::For
                | TokenKind::In
                | TokenKind::Of
                | TokenKind::While
                | TokenKind::Import
                | TokenKind::Export
                | TokenKind::From
                | TokenKind::As
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
                | TokenKind::SelfKw
                | TokenKind::Throw
        )
    }

    /// Precedence of a binary operator (higher binds tighter), or `None`.
    pub fn binary_precedence(&self) -> Option<u8> {
        match self {
            TokenKind::PipeGt => Some(1),
            TokenKind::PipePipe => Some(2),
            TokenKind::AmpAmp => Some(3),
            TokenKind::Pipe => Some(4),
            TokenKind::Amp => Some(5),
            TokenKind::EqEq | TokenKind::BangEq => Some(6),
            TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq | TokenKind::In => {
                Some(7)
            }
            TokenKind::DotDot | TokenKind::DotDotDot => Some(8),
            TokenKind::Plus | TokenKind::Minus => Some(9),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some(10),
            _ => None,
        }
    }

    /// Short human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier `{name}`"),
            TokenKind::Int(n) => format!("integer `{n}`"),
            TokenKind::Float(n) => format!("float `{n}`"),
            TokenKind::Str(_) | TokenKind::InterpolatedStr(_) => "string".to_string(),
            TokenKind::Symbol(name) => format!("symbol `:{name}`"),
            TokenKind::InstanceProperty(name) => format!("`@{name}`"),
            TokenKind::ClassProperty(name) => format!("`::{name}`"),
            TokenKind::Newline => "end of line".to_string(),
            other => match other.text() {
                Some(text) => format!("`{text}`"),
                None => format!("{other:?}"),
            },
        }
    }

    /// Source text of fixed tokens.
    pub fn text(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Def => "def",
            TokenKind::Fn => "fn",
            TokenKind::Do => "do",
            TokenKind::End => "end",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Case => "case",
            TokenKind::When => "when",
            TokenKind::Function => "function",
            TokenKind::Return => "return",
            TokenKind::Schema => "schema",
            TokenKind::Class => "class",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Of => "of",
            TokenKind::While => "while",
            TokenKind::Import => "import",
            TokenKind::Export => "export",
            TokenKind::From => "from",
            TokenKind::As => "as",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Nil => "nil",
            TokenKind::SelfKw => "self",
            TokenKind::Throw => "throw",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::ColonEq => ":=",
            TokenKind::Arrow => "=>",
            TokenKind::Question => "?",
            TokenKind::QuestionDot => "?.",
            TokenKind::DotDot => "..",
            TokenKind::DotDotDot => "...",
            TokenKind::PercentBrace => "%{",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::AmpAmp => "&&",
            TokenKind::PipePipe => "||",
            TokenKind::Pipe => "|",
            TokenKind::Amp => "&",
            TokenKind::PipeGt => "|>",
            _ => return None,
        };
        Some(text)
    }
}

/// Look up a keyword from an identifier string.
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "def" => Some(TokenKind::Def),
        "fn" => Some(TokenKind::Fn),
        "do" => Some(TokenKind::Do),
        "end" => Some(TokenKind::End),
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        "case" => Some(TokenKind::Case),
        "when" => Some(TokenKind::When),
        "function" => Some(TokenKind::Function),
        "return" => Some(TokenKind::Return),
        "schema" => Some(TokenKind::Schema),
        "class" => Some(TokenKind::Class),
        "for" => Some(TokenKind::For),
        "in" => Some(TokenKind::In),
        "of" => Some(TokenKind::Of),
        "while" => Some(TokenKind::While),
        "import" => Some(TokenKind::Import),
        "export" => Some(TokenKind::Export),
        "from" => Some(TokenKind::From),
        "as" => Some(TokenKind::As),
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        "nil" => Some(TokenKind::Nil),
        "self" => Some(TokenKind::SelfKw),
        "throw" => Some(TokenKind::Throw),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_table_round_trips_text() {
        for word in ["def", "case", "function", "when", "schema", "self", "nil"] {
            let kind = keyword_from_str(word).unwrap();
            assert!(kind.is_keyword());
            assert_eq!(kind.text(), Some(word));
        }
        assert_eq!(keyword_from_str("define"), None);
    }

    #[test]
    fn test_precedence_ordering() {
        let add = TokenKind::Plus.binary_precedence().unwrap();
        let mul = TokenKind::Star.binary_precedence().unwrap();
        let or = TokenKind::PipePipe.binary_precedence().unwrap();
        assert!(mul > add);
        assert!(add > or);
        assert_eq!(TokenKind::Dot.binary_precedence(), None);
    }
}
