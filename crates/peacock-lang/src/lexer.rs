//! Lexer (tokenizer) for Peacock.
//!
//! The whole source is tokenized upfront, one physical line at a time. Each
//! line that produces tokens is terminated by a `Newline` token, so blank and
//! comment-only lines leave no trace in the stream. The parser relies on the
//! newlines to end statements.

use crate::span::Span;
use crate::token::{keyword_from_str, StrSegment, Token, TokenKind};

/// A character sequence no lexing rule accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl LexError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for LexError {}

/// Tokenize a whole source file.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

/// The lexer state.
pub struct Lexer<'a> {
    /// Source code as bytes (for fast indexing).
    source: &'a [u8],
    /// Current byte position.
    pos: usize,
    /// End of the line being scanned (exclusive, excludes the `\n`).
    line_end: usize,
    /// Start position of the current token.
    token_start: usize,
    /// Added to every span; non-zero for interpolated code.
    base_offset: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            line_end: 0,
            token_start: 0,
            base_offset: 0,
        }
    }

    /// Lexer for code embedded in a string at `offset` of the enclosing file.
    pub fn with_offset(source: &'a str, offset: u32) -> Self {
        Self {
            base_offset: offset,
            ..Self::new(source)
        }
    }

    /// Produce every token of the source.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while self.pos < self.source.len() {
            self.line_end = self.source[self.pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(self.source.len(), |i| self.pos + i);

            let before = tokens.len();
            while let Some(token) = self.next_in_line()? {
                tokens.push(token);
            }

            if tokens.len() > before && self.line_end < self.source.len() {
                tokens.push(Token::new(
                    TokenKind::Newline,
                    self.span(self.line_end, self.line_end + 1),
                ));
            }
            self.pos = self.line_end + 1;
        }

        Ok(tokens)
    }

    // === Helper methods ===

    fn at_line_end(&self) -> bool {
        self.pos >= self.line_end
    }

    fn current(&self) -> u8 {
        if self.at_line_end() {
            0
        } else {
            self.source[self.pos]
        }
    }

    fn peek_char(&self) -> u8 {
        self.peek_char_n(1)
    }

    fn peek_char_n(&self, n: usize) -> u8 {
        if self.pos + n < self.line_end {
            self.source[self.pos + n]
        } else {
            0
        }
    }

    fn previous(&self) -> u8 {
        if self.token_start == 0 {
            0
        } else {
            self.source[self.token_start - 1]
        }
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn advance_n(&mut self, n: usize) {
        self.pos += n;
    }

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(start as u32, end as u32).shifted(self.base_offset)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.span(self.token_start, self.pos))
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        let end = self.pos.max(self.token_start + 1).min(self.source.len().max(1));
        LexError::new(message, self.span(self.token_start, end))
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        // Only ever sliced at character boundaries, so the fallback is unreachable
        // for input that came from a `&str`.
        std::str::from_utf8(&self.source[start..end]).unwrap_or("")
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), b' ' | b'\t' | b'\r') {
            self.advance();
        }
    }

    // === Token scanning ===

    /// Next token on the current line, `None` at the line end or a comment.
    fn next_in_line(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();
        self.token_start = self.pos;

        if self.at_line_end() || self.current() == b'#' {
            return Ok(None);
        }

        let ch = self.current();
        let kind = match ch {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(),
            b'0'..=b'9' => self.scan_number()?,
            b'"' => self.scan_string()?,
            b'@' => self.scan_instance_property()?,

            b'(' => { self.advance(); TokenKind::LParen }
            b')' => { self.advance(); TokenKind::RParen }
            b'[' => { self.advance(); TokenKind::LBracket }
            b']' => { self.advance(); TokenKind::RBracket }
            b'{' => { self.advance(); TokenKind::LBrace }
            b'}' => { self.advance(); TokenKind::RBrace }
            b',' => { self.advance(); TokenKind::Comma }
            b';' => { self.advance(); TokenKind::Semicolon }
            b'+' => { self.advance(); TokenKind::Plus }
            b'-' => { self.advance(); TokenKind::Minus }
            b'*' => { self.advance(); TokenKind::Star }
            b'/' => { self.advance(); TokenKind::Slash }

            b':' => self.scan_colon()?,
            b'.' => self.scan_dot(),
            b'?' => self.scan_question(),
            b'%' => self.scan_percent(),
            b'=' => self.scan_equals(),
            b'!' => self.scan_bang(),
            b'<' => self.scan_less_than(),
            b'>' => self.scan_greater_than(),
            b'&' => self.scan_ampersand(),
            b'|' => self.scan_pipe(),

            _ => {
                self.advance();
                // Skip UTF-8 continuation bytes.
                while self.pos < self.line_end && (self.source[self.pos] & 0xC0) == 0x80 {
                    self.advance();
                }
                let found = self.slice(self.token_start, self.pos);
                return Err(self.error(format!("unexpected character `{found}`")));
            }
        };

        Ok(Some(self.make_token(kind)))
    }

    fn scan_identifier_body(&mut self) {
        while matches!(self.current(), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.advance();
        }
    }

    fn scan_identifier(&mut self) -> TokenKind {
        self.scan_identifier_body();

        // Trailing `?`/`!`, unless they begin `?.` or `!=`.
        match (self.current(), self.peek_char()) {
            (b'?', b'.') | (b'!', b'=') => {}
            (b'?' | b'!', _) => self.advance(),
            _ => {}
        }

        let ident = self.slice(self.token_start, self.pos);
        keyword_from_str(ident).unwrap_or_else(|| TokenKind::Identifier(ident.to_string()))
    }

    fn scan_number(&mut self) -> Result<TokenKind, LexError> {
        while self.current().is_ascii_digit() {
            self.advance();
        }

        // `1..5` is a range, not a float.
        if self.current() == b'.' && self.peek_char().is_ascii_digit() {
            self.advance();
            while self.current().is_ascii_digit() {
                self.advance();
            }
            let text = self.slice(self.token_start, self.pos);
            return text
                .parse()
                .map(TokenKind::Float)
                .map_err(|_| self.error(format!("invalid float literal `{text}`")));
        }

        let text = self.slice(self.token_start, self.pos);
        text.parse()
            .map(TokenKind::Int)
            .map_err(|_| self.error(format!("integer literal `{text}` is too large")))
    }

    fn scan_string(&mut self) -> Result<TokenKind, LexError> {
        self.advance(); // Skip opening quote

        let mut segments = Vec::new();
        let mut text = Vec::new();

        loop {
            match self.current() {
                _ if self.at_line_end() => {
                    return Err(self.error("unterminated string literal"));
                }
                b'"' => {
                    self.advance();
                    break;
                }
                b'\\' => {
                    self.advance();
                    if self.at_line_end() {
                        return Err(self.error("unterminated string literal"));
                    }
                    text.extend_from_slice(self.scan_escape_sequence().as_bytes());
                }
                b'#' if self.peek_char() == b'{' => {
                    if !text.is_empty() {
                        segments.push(StrSegment::Text(
                            String::from_utf8_lossy(&std::mem::take(&mut text)).into_owned(),
                        ));
                    }
                    segments.push(self.scan_interpolation()?);
                }
                byte => {
                    text.push(byte);
                    self.advance();
                }
            }
        }

        let text = String::from_utf8_lossy(&text).into_owned();
        if segments.is_empty() {
            return Ok(TokenKind::Str(text));
        }
        if !text.is_empty() {
            segments.push(StrSegment::Text(text));
        }
        Ok(TokenKind::InterpolatedStr(segments))
    }

    fn scan_escape_sequence(&mut self) -> &'static str {
        let ch = self.current();
        self.advance();

        match ch {
            b'n' => "\n",
            b'r' => "\r",
            b't' => "\t",
            b'0' => "\0",
            b'\\' => "\\",
            b'"' => "\"",
            b'#' => "#",
            // Unknown escapes keep the backslash.
            _ => {
                self.pos -= 1;
                "\\"
            }
        }
    }

    /// Scan `#{ ... }`, counting nested braces.
    fn scan_interpolation(&mut self) -> Result<StrSegment, LexError> {
        self.advance_n(2); // Skip #{
        let start = self.pos;
        let mut depth = 0usize;

        loop {
            match self.current() {
                _ if self.at_line_end() => {
                    return Err(self.error("unterminated `#{` in string literal"));
                }
                b'{' => depth += 1,
                b'}' if depth == 0 => break,
                b'}' => depth -= 1,
                _ => {}
            }
            self.advance();
        }

        let source = self.slice(start, self.pos).to_string();
        self.advance(); // Skip }
        Ok(StrSegment::Code {
            source,
            offset: start as u32 + self.base_offset,
        })
    }

    fn scan_instance_property(&mut self) -> Result<TokenKind, LexError> {
        self.advance(); // Skip @
        if !matches!(self.current(), b'a'..=b'z' | b'A'..=b'Z' | b'_') {
            return Err(self.error("expected a property name after `@`"));
        }
        let start = self.pos;
        self.scan_identifier_body();
        Ok(TokenKind::InstanceProperty(self.slice(start, self.pos).to_string()))
    }

    // === Multi-character operators ===

    fn scan_colon(&mut self) -> Result<TokenKind, LexError> {
        self.advance();
        match self.current() {
            b'=' => {
                self.advance();
                Ok(TokenKind::ColonEq)
            }
            b':' => {
                self.advance();
                if !matches!(self.current(), b'a'..=b'z' | b'A'..=b'Z' | b'_') {
                    return Err(self.error("expected a property name after `::`"));
                }
                let start = self.pos;
                self.scan_identifier_body();
                Ok(TokenKind::ClassProperty(self.slice(start, self.pos).to_string()))
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' if self.symbol_allowed() => {
                let start = self.pos;
                self.scan_identifier_body();
                if matches!(self.current(), b'?' | b'!') {
                    self.advance();
                }
                Ok(TokenKind::Symbol(self.slice(start, self.pos).to_string()))
            }
            _ => Ok(TokenKind::Colon),
        }
    }

    /// `:name` is a symbol only when the colon does not directly follow an
    /// operand, so `{a:b}` still lexes as a key/value pair.
    fn symbol_allowed(&self) -> bool {
        !matches!(
            self.previous(),
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'?' | b'!' | b')' | b']' | b'"'
        )
    }

    fn scan_dot(&mut self) -> TokenKind {
        self.advance();
        if self.current() == b'.' {
            self.advance();
            if self.current() == b'.' {
                self.advance();
                TokenKind::DotDotDot
            } else {
                TokenKind::DotDot
            }
        } else {
            TokenKind::Dot
        }
    }

    fn scan_question(&mut self) -> TokenKind {
        self.advance();
        if self.current() == b'.' {
            self.advance();
            TokenKind::QuestionDot
        } else {
            TokenKind::Question
        }
    }

    fn scan_percent(&mut self) -> TokenKind {
        self.advance();
        if self.current() == b'{' {
            self.advance();
            TokenKind::PercentBrace
        } else {
            TokenKind::Percent
        }
    }

    fn scan_equals(&mut self) -> TokenKind {
        self.advance();
        match self.current() {
            b'=' => { self.advance(); TokenKind::EqEq }
            b'>' => { self.advance(); TokenKind::Arrow }
            _ => TokenKind::Eq,
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        self.advance();
        if self.current() == b'=' {
            self.advance();
            TokenKind::BangEq
        } else {
            TokenKind::Bang
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        self.advance();
        if self.current() == b'=' {
            self.advance();
            TokenKind::LtEq
        } else {
            TokenKind::Lt
        }
    }

    fn scan_greater_than(&mut self) -> TokenKind {
        self.advance();
        if self.current() == b'=' {
            self.advance();
            TokenKind::GtEq
        } else {
            TokenKind::Gt
        }
    }

    fn scan_ampersand(&mut self) -> TokenKind {
        self.advance();
        if self.current() == b'&' {
            self.advance();
            TokenKind::AmpAmp
        } else {
            TokenKind::Amp
        }
    }

    fn scan_pipe(&mut self) -> TokenKind {
        self.advance();
        match self.current() {
            b'|' => { self.advance(); TokenKind::PipePipe }
            b'>' => { self.advance(); TokenKind::PipeGt }
            _ => TokenKind::Pipe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Identifier(name.into())
    }

    #[test]
    fn test_identifiers_with_suffixes() {
        assert_eq!(
            kinds("empty? save! x"),
            vec![ident("empty?"), ident("save!"), ident("x")]
        );
    }

    #[test]
    fn test_keywords_use_longest_match() {
        assert_eq!(
            kinds("def define end ending"),
            vec![TokenKind::Def, ident("define"), TokenKind::End, ident("ending")]
        );
    }

    #[test]
    fn test_numbers_and_ranges() {
        assert_eq!(
            kinds("30 30.5 1..5 1...5"),
            vec![
                TokenKind::Int(30),
                TokenKind::Float(30.5),
                TokenKind::Int(1),
                TokenKind::DotDot,
                TokenKind::Int(5),
                TokenKind::Int(1),
                TokenKind::DotDotDot,
                TokenKind::Int(5),
            ]
        );
    }

    #[test]
    fn test_multi_char_operators_before_prefixes() {
        assert_eq!(
            kinds("a := b == c => d = e != f"),
            vec![
                ident("a"),
                TokenKind::ColonEq,
                ident("b"),
                TokenKind::EqEq,
                ident("c"),
                TokenKind::Arrow,
                ident("d"),
                TokenKind::Eq,
                ident("e"),
                TokenKind::BangEq,
                ident("f"),
            ]
        );
        assert_eq!(
            kinds("a!=b x?.y |> %{"),
            vec![
                ident("a"),
                TokenKind::BangEq,
                ident("b"),
                ident("x"),
                TokenKind::QuestionDot,
                ident("y"),
                TokenKind::PipeGt,
                TokenKind::PercentBrace,
            ]
        );
    }

    #[test]
    fn test_symbols_and_colons() {
        assert_eq!(
            kinds("{a: :ok, b:c}"),
            vec![
                TokenKind::LBrace,
                ident("a"),
                TokenKind::Colon,
                TokenKind::Symbol("ok".into()),
                TokenKind::Comma,
                ident("b"),
                TokenKind::Colon,
                ident("c"),
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn test_class_dialect_tokens() {
        assert_eq!(
            kinds("@name ::count"),
            vec![
                TokenKind::InstanceProperty("name".into()),
                TokenKind::ClassProperty("count".into()),
            ]
        );
    }

    #[test]
    fn test_comments_and_blank_lines_are_dropped() {
        assert_eq!(
            kinds("a # trailing\n# only a comment\n\n   \nb\n"),
            vec![ident("a"), TokenKind::Newline, ident("b"), TokenKind::Newline]
        );
    }

    #[test]
    fn test_hash_inside_string_is_not_a_comment() {
        assert_eq!(kinds(r#""a # b""#), vec![TokenKind::Str("a # b".into())]);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""line\n\"q\" \#{x}""#),
            vec![TokenKind::Str("line\n\"q\" #{x}".into())]
        );
    }

    #[test]
    fn test_string_interpolation_segments() {
        let tokens = kinds(r#""hi #{name}! #{ {a: 1}.a }""#);
        assert_eq!(
            tokens,
            vec![TokenKind::InterpolatedStr(vec![
                StrSegment::Text("hi ".into()),
                StrSegment::Code { source: "name".into(), offset: 6 },
                StrSegment::Text("! ".into()),
                StrSegment::Code { source: " {a: 1}.a ".into(), offset: 15 },
            ])]
        );
    }

    #[test]
    fn test_spans_are_positive_and_increasing() {
        let tokens = tokenize("a := [1, 2]\nb := \"x\" # c\n").unwrap();
        let mut last_end = 0;
        for token in &tokens {
            assert!(token.span.start < token.span.end, "{token:?}");
            assert!(token.span.start >= last_end, "{token:?}");
            last_end = token.span.end;
        }
        assert_eq!(tokens[1].span, Span::new(2, 4));
    }

    #[test]
    fn test_unmatched_character_is_fatal() {
        let err = tokenize("a := 1\nb := $").unwrap_err();
        assert!(err.message.contains('$'));
        assert_eq!(err.span, Span::new(12, 13));
    }

    #[test]
    fn test_unmatched_multibyte_character() {
        let err = tokenize("a := 1\nb := \u{20ac}").unwrap_err();
        assert!(err.message.contains('\u{20ac}'), "{}", err.message);
        assert_eq!(err.span, Span::new(12, 15));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x := \"abc\ny").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_offset_lexer_shifts_spans() {
        let tokens = Lexer::with_offset("a", 10).tokenize().unwrap();
        assert_eq!(tokens[0].span, Span::new(10, 11));
    }
}
