//! Peacock parser.
//!
//! A recursive descent parser over the token vector produced by the lexer,
//! using precedence climbing for binary operators. Statements end at `Newline`
//! tokens. Destructuring and case functions are parsed in `pattern.rs`, class
//! bodies in `class.rs`.

use crate::ast::*;
use crate::lexer::{LexError, Lexer};
use crate::pattern::{args_schema, to_schema};
use crate::span::Span;
use crate::token::{StrSegment, Token, TokenKind};

/// Parse error.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// What the parser was looking for, if it knew.
    pub expected: Option<String>,
    /// Description of the token it found instead.
    pub found: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            expected: None,
            found: String::new(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        Self::new(err.message, err.span)
    }
}

/// Parse a token stream into top-level nodes.
pub fn parse(tokens: &[Token], source: &str) -> Result<Vec<Expr>, ParseError> {
    Parser::new(tokens, source).parse_program()
}

/// Header of a `def`, shared by top-level functions and class members.
pub(crate) struct DefHeader {
    pub start: u32,
    pub is_static: bool,
    pub name: String,
    pub params: Vec<Param>,
    pub has_parens: bool,
}

/// The parser. Cloning is cheap and is how speculative parses are done.
#[derive(Clone)]
pub struct Parser<'a> {
    /// Tokens being parsed.
    pub(crate) tokens: &'a [Token],
    /// Source code, for pattern text in match errors.
    pub(crate) source: &'a str,
    /// Index of the current token.
    pub(crate) pos: usize,
    /// Counter for `__match_N` temporaries.
    pub(crate) match_counter: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], source: &'a str) -> Self {
        Self {
            tokens,
            source,
            pos: 0,
            match_counter: 0,
        }
    }

    // =========================================================================
    // Token Handling
    // =========================================================================

    pub(crate) fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek(&self) -> Option<&'a TokenKind> {
        self.current().map(|t| &t.kind)
    }

    pub(crate) fn peek_nth(&self, n: usize) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    pub(crate) fn current_span(&self) -> Span {
        match self.current() {
            Some(token) => token.span,
            None => {
                let end = self
                    .tokens
                    .last()
                    .map_or(self.source.len() as u32, |t| t.span.end);
                Span::new(end, end)
            }
        }
    }

    /// Start offset of the current token.
    pub(crate) fn start(&self) -> u32 {
        self.current_span().start
    }

    /// Span from `start` to the end of the last consumed token.
    pub(crate) fn span_from(&self, start: u32) -> Span {
        let end = match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(token) => token.span.end,
            None => start,
        };
        Span::new(start, end.max(start))
    }

    /// Check if the current token matches the given kind.
    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek()
            .is_some_and(|k| std::mem::discriminant(k) == std::mem::discriminant(kind))
    }

    pub(crate) fn at_any(&self, kinds: &[TokenKind]) -> bool {
        kinds.iter().any(|k| self.check(k))
    }

    /// Consume a token if it matches, returning true if consumed.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a token if it matches, otherwise return an error.
    pub(crate) fn expect(&mut self, kind: &TokenKind) -> Result<&'a Token, ParseError> {
        match self.current() {
            Some(token) if self.check(kind) => {
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.unexpected(kind.describe())),
        }
    }

    pub(crate) fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(TokenKind::Identifier(name)) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// Error for the current token not being `expected`.
    pub(crate) fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        let expected = expected.into();
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_string(), TokenKind::describe);
        ParseError {
            message: format!("expected {expected}, found {found}"),
            span: self.current_span(),
            expected: Some(expected),
            found,
        }
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    fn skip_separators(&mut self) {
        while self.eat(&TokenKind::Newline) || self.eat(&TokenKind::Semicolon) {}
    }

    /// True when the current token starts right where the previous one ended.
    fn adjacent(&self) -> bool {
        match (self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)), self.current()) {
            (Some(prev), Some(current)) => prev.span.end == current.span.start,
            _ => false,
        }
    }

    // =========================================================================
    // Program & Blocks
    // =========================================================================

    /// Parse every statement until end of input.
    pub fn parse_program(mut self) -> Result<Vec<Expr>, ParseError> {
        let mut body = Vec::new();
        self.skip_separators();
        while self.current().is_some() {
            body.push(self.parse_stmt()?);
            self.end_stmt(&[])?;
            self.skip_separators();
        }
        Ok(body)
    }

    /// Parse statements up to one of `terminators`, which is left unconsumed.
    pub(crate) fn parse_block(&mut self, terminators: &[TokenKind]) -> Result<Vec<Expr>, ParseError> {
        let mut body = Vec::new();
        self.skip_separators();
        while !self.at_any(terminators) {
            if self.current().is_none() {
                let expected = terminators
                    .last()
                    .map_or_else(|| "a statement".to_string(), TokenKind::describe);
                return Err(self.unexpected(expected));
            }
            body.push(self.parse_stmt()?);
            self.end_stmt(terminators)?;
            self.skip_separators();
        }
        Ok(body)
    }

    fn end_stmt(&self, terminators: &[TokenKind]) -> Result<(), ParseError> {
        match self.peek() {
            None | Some(TokenKind::Newline | TokenKind::Semicolon) => Ok(()),
            _ if self.at_any(terminators) => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    // =========================================================================
    // Statement Parsing
    // =========================================================================

    pub(crate) fn parse_stmt(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(TokenKind::Def) => self.parse_def(),
            Some(TokenKind::Class) => self.parse_class(),
            Some(TokenKind::Schema) => self.parse_schema_definition(),
            Some(TokenKind::Case) if matches!(self.peek_nth(1), Some(TokenKind::Function)) => {
                self.parse_case_function()
            }
            Some(TokenKind::Return) => self.parse_return(),
            Some(TokenKind::Throw) => self.parse_throw(),
            Some(TokenKind::Import) => self.parse_import(),
            Some(TokenKind::Export) => self.parse_export(),
            Some(TokenKind::For) => self.parse_for(),
            Some(TokenKind::While) => self.parse_while(),
            _ => self.parse_expr_stmt(),
        }
    }

    /// Expression statement, or an assignment when followed by `:=` / `=`.
    fn parse_expr_stmt(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        let target = self.parse_expr()?;

        if self.eat(&TokenKind::ColonEq) {
            self.skip_newlines();
            let value = self.parse_expr()?;
            return self.make_binding(target, value, start);
        }
        if self.eat(&TokenKind::Eq) {
            self.skip_newlines();
            let value = self.parse_expr()?;
            return self.make_assignment(target, value, start);
        }
        Ok(target)
    }

    fn make_binding(&mut self, target: Expr, value: Expr, start: u32) -> Result<Expr, ParseError> {
        match target.kind {
            ExprKind::IdLookup(name) => Ok(Expr::new(
                ExprKind::Assign(Box::new(Assign { name, value })),
                self.span_from(start),
            )),
            ExprKind::ArrayLiteral(_) | ExprKind::ObjectLiteral(_) => {
                self.desugar_destructuring(target, value, start)
            }
            ExprKind::InstanceLookup(name) => Err(ParseError::new(
                format!("`@{name} :=` declares a property and is only allowed in a class body"),
                target.span,
            )),
            _ => Err(ParseError::new("invalid binding target for `:=`", target.span)),
        }
    }

    fn make_assignment(&self, target: Expr, value: Expr, start: u32) -> Result<Expr, ParseError> {
        let kind = match target.kind {
            ExprKind::IdLookup(name) => ExprKind::SimpleAssignment(Box::new(Assign { name, value })),
            ExprKind::DynamicLookup(lookup) => ExprKind::ArrayAssignment(Box::new(ArrayAssignment {
                target: lookup.target,
                index: lookup.index,
                value,
            })),
            ExprKind::PropertyLookup(lookup) => {
                ExprKind::PropertyAssignment(Box::new(PropertyAssignment {
                    target: lookup.target,
                    property: lookup.property,
                    value,
                }))
            }
            ExprKind::InstanceLookup(property) => {
                ExprKind::PropertyAssignment(Box::new(PropertyAssignment {
                    target: Expr::new(ExprKind::SelfRef, target.span),
                    property,
                    value,
                }))
            }
            _ => return Err(ParseError::new("invalid assignment target", target.span)),
        };
        Ok(Expr::new(kind, self.span_from(start)))
    }

    /// Parse `def` up to (not including) its body.
    pub(crate) fn parse_def_header(&mut self) -> Result<DefHeader, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::Def)?;

        let is_static =
            self.check(&TokenKind::SelfKw) && matches!(self.peek_nth(1), Some(TokenKind::Dot));
        if is_static {
            self.pos += 2;
        }

        let name = self.expect_identifier("a function name")?;
        let has_parens = self.eat(&TokenKind::LParen);
        let params = if has_parens {
            self.parse_params()?
        } else {
            Vec::new()
        };

        Ok(DefHeader {
            start,
            is_static,
            name,
            params,
            has_parens,
        })
    }

    /// Parse the `= expr` or block body of a `def` and pick its shape.
    pub(crate) fn parse_def_body(&mut self, header: DefHeader) -> Result<Expr, ParseError> {
        let args_schema = args_schema(&header.params);

        if self.eat(&TokenKind::Eq) {
            self.skip_newlines();
            let def = Box::new(Def {
                name: header.name,
                params: header.params,
                args_schema,
                body: FnBody::Expr(Box::new(self.parse_expr()?)),
            });
            let kind = if header.has_parens {
                ExprKind::SingleLineDefWithArgs(def)
            } else {
                ExprKind::SingleLineDefWithoutArgs(def)
            };
            return Ok(Expr::new(kind, self.span_from(header.start)));
        }

        let body = self.parse_block(&[TokenKind::End])?;
        self.expect(&TokenKind::End)?;
        let def = Box::new(Def {
            name: header.name,
            params: header.params,
            args_schema,
            body: FnBody::Block(body),
        });
        let kind = if header.has_parens {
            ExprKind::MultilineDefWithArgs(def)
        } else {
            ExprKind::MultilineDefWithoutArgs(def)
        };
        Ok(Expr::new(kind, self.span_from(header.start)))
    }

    fn parse_def(&mut self) -> Result<Expr, ParseError> {
        let header = self.parse_def_header()?;
        if header.is_static {
            return Err(ParseError::new(
                "`def self.` methods are only allowed in a class body",
                self.span_from(header.start),
            ));
        }
        reject_instance_params(&header.params)?;
        self.parse_def_body(header)
    }

    /// Parameter list after `(`, consuming the closing `)`.
    pub(crate) fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        self.skip_newlines();
        while !self.eat(&TokenKind::RParen) {
            params.push(self.parse_param()?);
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RParen)?;
                break;
            }
            self.skip_newlines();
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<Param, ParseError> {
        let start = self.start();
        let (name, instance) = match self.peek() {
            Some(TokenKind::Identifier(name)) => (name.clone(), false),
            Some(TokenKind::InstanceProperty(name)) => (name.clone(), true),
            _ => return Err(self.unexpected("a parameter name")),
        };
        self.pos += 1;

        let schema = if self.eat(&TokenKind::Colon) {
            Some(to_schema(self.parse_expr()?))
        } else {
            None
        };

        Ok(Param {
            name,
            schema,
            instance,
            span: self.span_from(start),
        })
    }

    fn parse_schema_definition(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::Schema)?;
        let name = self.expect_identifier("a schema name")?;
        self.expect(&TokenKind::Eq)?;
        self.skip_newlines();
        let schema = to_schema(self.parse_expr()?);
        Ok(Expr::new(
            ExprKind::SchemaDefinition(Box::new(SchemaDefinition { name, schema })),
            self.span_from(start),
        ))
    }

    fn parse_return(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::Return)?;
        let value = match self.peek() {
            None
            | Some(
                TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::End
                | TokenKind::Else
                | TokenKind::When,
            ) => None,
            Some(_) => Some(Box::new(self.parse_expr()?)),
        };
        Ok(Expr::new(ExprKind::Return(value), self.span_from(start)))
    }

    fn parse_throw(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::Throw)?;
        let value = self.parse_expr()?;
        Ok(Expr::new(ExprKind::Throw(Box::new(value)), self.span_from(start)))
    }

    fn parse_import(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::Import)?;

        let clause = if self.eat(&TokenKind::LBrace) {
            let mut specifiers = Vec::new();
            self.skip_newlines();
            while !self.eat(&TokenKind::RBrace) {
                let name = self.expect_identifier("an imported name")?;
                let alias = if self.eat(&TokenKind::As) {
                    Some(self.expect_identifier("an alias")?)
                } else {
                    None
                };
                specifiers.push(ImportSpecifier { name, alias });
                self.skip_newlines();
                if !self.eat(&TokenKind::Comma) {
                    self.expect(&TokenKind::RBrace)?;
                    break;
                }
                self.skip_newlines();
            }
            ImportClause::Named(specifiers)
        } else {
            ImportClause::Default(self.expect_identifier("an imported name")?)
        };

        self.expect(&TokenKind::From)?;
        let from = match self.peek() {
            Some(TokenKind::Str(path)) => path.clone(),
            _ => return Err(self.unexpected("a module path string")),
        };
        self.pos += 1;

        Ok(Expr::new(
            ExprKind::Import(Box::new(Import { clause, from })),
            self.span_from(start),
        ))
    }

    fn parse_export(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::Export)?;
        let inner = self.parse_stmt()?;
        match inner.kind {
            ExprKind::Assign(_)
            | ExprKind::SingleLineDefWithArgs(_)
            | ExprKind::SingleLineDefWithoutArgs(_)
            | ExprKind::MultilineDefWithArgs(_)
            | ExprKind::MultilineDefWithoutArgs(_)
            | ExprKind::CaseFunctionDefinition(_)
            | ExprKind::SchemaDefinition(_)
            | ExprKind::Class(_) => Ok(Expr::new(
                ExprKind::Export(Box::new(inner)),
                self.span_from(start),
            )),
            _ => Err(ParseError::new(
                "only definitions and `:=` bindings can be exported",
                inner.span,
            )),
        }
    }

    fn parse_for(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::For)?;

        if self.eat(&TokenKind::LBrace) {
            let mut names = Vec::new();
            while !self.eat(&TokenKind::RBrace) {
                names.push(self.expect_identifier("a field name")?);
                if !self.eat(&TokenKind::Comma) {
                    self.expect(&TokenKind::RBrace)?;
                    break;
                }
            }
            self.expect(&TokenKind::Of)?;
            let iterable = self.parse_expr()?;
            let body = self.parse_block(&[TokenKind::End])?;
            self.expect(&TokenKind::End)?;
            return Ok(Expr::new(
                ExprKind::ForOfObjDeconstructLoop(Box::new(ForObjLoop {
                    names,
                    iterable,
                    body,
                })),
                self.span_from(start),
            ));
        }

        let binding = self.expect_identifier("a loop variable")?;
        let is_of = if self.eat(&TokenKind::Of) {
            true
        } else if self.eat(&TokenKind::In) {
            false
        } else {
            return Err(self.unexpected("`of` or `in`"));
        };
        let iterable = self.parse_expr()?;
        let body = self.parse_block(&[TokenKind::End])?;
        self.expect(&TokenKind::End)?;

        let node = Box::new(ForLoop {
            binding,
            iterable,
            body,
        });
        let kind = if is_of {
            ExprKind::SimpleForOfLoop(node)
        } else {
            ExprKind::SimpleForInLoop(node)
        };
        Ok(Expr::new(kind, self.span_from(start)))
    }

    fn parse_while(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::While)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block(&[TokenKind::End])?;
        self.expect(&TokenKind::End)?;
        Ok(Expr::new(
            ExprKind::While(Box::new(While { cond, body })),
            self.span_from(start),
        ))
    }

    // =========================================================================
    // Expression Parsing
    // =========================================================================

    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let start = self.start();
        let mut left = self.parse_unary()?;

        while let Some(op) = self.peek() {
            let prec = match op.binary_precedence() {
                Some(prec) if prec >= min_prec => prec,
                _ => break,
            };
            self.pos += 1;
            self.skip_newlines();
            let right = self.parse_binary(prec + 1)?;
            left = make_binary(op, left, right, self.span_from(start));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        if self.eat(&TokenKind::Bang) {
            let operand = self.parse_unary()?;
            return Ok(Expr::new(ExprKind::Not(Box::new(operand)), self.span_from(start)));
        }
        if self.eat(&TokenKind::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::new(ExprKind::Negate(Box::new(operand)), self.span_from(start)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek() {
                Some(TokenKind::LParen) if self.adjacent() => {
                    self.pos += 1;
                    let args = self.parse_args(&TokenKind::RParen)?;
                    expr = Expr::new(
                        ExprKind::FnCall(Box::new(FnCall { callee: expr, args })),
                        self.span_from(start),
                    );
                }
                Some(TokenKind::LBracket) if self.adjacent() => {
                    self.pos += 1;
                    self.skip_newlines();
                    let index = self.parse_expr()?;
                    self.skip_newlines();
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expr::new(
                        ExprKind::DynamicLookup(Box::new(DynamicLookup {
                            target: expr,
                            index,
                        })),
                        self.span_from(start),
                    );
                }
                Some(TokenKind::Dot) => {
                    self.pos += 1;
                    let property = self.parse_property_name()?;
                    expr = Expr::new(
                        ExprKind::PropertyLookup(Box::new(PropertyLookup {
                            target: expr,
                            property,
                        })),
                        self.span_from(start),
                    );
                }
                Some(TokenKind::QuestionDot) => {
                    self.pos += 1;
                    let property = self.parse_property_name()?;
                    expr = Expr::new(
                        ExprKind::OptionalChain(Box::new(PropertyLookup {
                            target: expr,
                            property,
                        })),
                        self.span_from(start),
                    );
                }
                _ => break,
            }
        }

        if matches!(expr.kind, ExprKind::IdLookup(_) | ExprKind::PropertyLookup(_))
            && self.starts_parenless_argument()
        {
            return Ok(self.try_parenless_call(expr, start));
        }
        Ok(expr)
    }

    /// Property names after `.` may be keywords: `Schema.for`.
    fn parse_property_name(&mut self) -> Result<String, ParseError> {
        let name = match self.peek() {
            Some(TokenKind::Identifier(name)) => name.clone(),
            Some(kind) if kind.is_keyword() => match kind.text() {
                Some(text) => text.to_string(),
                None => return Err(self.unexpected("a property name")),
            },
            _ => return Err(self.unexpected("a property name")),
        };
        self.pos += 1;
        Ok(name)
    }

    fn starts_parenless_argument(&self) -> bool {
        self.peek().is_some_and(TokenKind::can_start_operand) && !self.adjacent()
    }

    /// `print x, y`: try the rest of the line as call arguments. The attempt
    /// runs on a clone and is only kept if it stops at a line end or a
    /// closing token, otherwise `callee` is a bare lookup.
    fn try_parenless_call(&mut self, callee: Expr, start: u32) -> Expr {
        let mut attempt = self.clone();
        match attempt.parse_parenless_args() {
            Ok(args) if attempt.at_call_boundary() => {
                *self = attempt;
                Expr::new(
                    ExprKind::FnCall(Box::new(FnCall { callee, args })),
                    self.span_from(start),
                )
            }
            _ => callee,
        }
    }

    fn parse_parenless_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = vec![self.parse_arg()?];
        while self.eat(&TokenKind::Comma) {
            self.skip_newlines();
            args.push(self.parse_arg()?);
        }
        Ok(args)
    }

    fn at_call_boundary(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(
                TokenKind::Newline
                    | TokenKind::Semicolon
                    | TokenKind::End
                    | TokenKind::RParen
                    | TokenKind::RBracket
                    | TokenKind::RBrace
            )
        )
    }

    fn parse_arg(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        if self.eat(&TokenKind::DotDotDot) {
            let inner = self.parse_expr()?;
            return Ok(Expr::new(ExprKind::Spread(Box::new(inner)), self.span_from(start)));
        }
        self.parse_expr()
    }

    /// Comma-separated arguments up to `close`, which is consumed. Newlines
    /// are allowed anywhere inside the delimiters.
    pub(crate) fn parse_args(&mut self, close: &TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        self.skip_newlines();
        while !self.eat(close) {
            args.push(self.parse_arg()?);
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                self.expect(close)?;
                break;
            }
            self.skip_newlines();
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        let Some(token) = self.current() else {
            return Err(self.unexpected("an expression"));
        };

        let kind = match &token.kind {
            TokenKind::Int(n) => ExprKind::Int(*n),
            TokenKind::Float(n) => ExprKind::Float(*n),
            TokenKind::Str(s) => ExprKind::Str(s.clone()),
            TokenKind::InterpolatedStr(segments) => ExprKind::StrTemplate(self.parse_template(segments)?),
            TokenKind::Symbol(name) => ExprKind::Sym(name.clone()),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Nil => ExprKind::Null,
            TokenKind::Identifier(name) => ExprKind::IdLookup(name.clone()),
            TokenKind::InstanceProperty(name) => ExprKind::InstanceLookup(name.clone()),
            TokenKind::ClassProperty(name) => ExprKind::ClassPropertyLookup(name.clone()),
            TokenKind::SelfKw => ExprKind::SelfRef,
            TokenKind::Percent => ExprKind::AnonIdLookup,
            TokenKind::LParen => {
                self.pos += 1;
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.pos += 1;
                let items = self.parse_args(&TokenKind::RBracket)?;
                return Ok(Expr::new(ExprKind::ArrayLiteral(items), self.span_from(start)));
            }
            TokenKind::LBrace => return self.parse_object_literal(),
            TokenKind::PercentBrace => {
                self.pos += 1;
                self.skip_newlines();
                let body = self.parse_expr()?;
                self.skip_newlines();
                self.expect(&TokenKind::RBrace)?;
                return Ok(Expr::new(ExprKind::ShortFn(Box::new(body)), self.span_from(start)));
            }
            TokenKind::Fn => return self.parse_fn(),
            TokenKind::If => return self.parse_if(),
            TokenKind::Case => return self.parse_case(),
            _ => return Err(self.unexpected("an expression")),
        };

        self.pos += 1;
        Ok(Expr::new(kind, self.span_from(start)))
    }

    /// Parse each `#{...}` segment of a string on its own.
    fn parse_template(&self, segments: &[StrSegment]) -> Result<Vec<StrPart>, ParseError> {
        segments
            .iter()
            .map(|segment| match segment {
                StrSegment::Text(text) => Ok(StrPart::Text(text.clone())),
                StrSegment::Code { source, offset } => {
                    let tokens = Lexer::with_offset(source, *offset).tokenize()?;
                    let mut inner = Parser::new(&tokens, self.source);
                    inner.skip_newlines();
                    let expr = inner.parse_expr()?;
                    inner.skip_newlines();
                    if inner.current().is_some() {
                        return Err(inner.unexpected("`}`"));
                    }
                    Ok(StrPart::Code(expr))
                }
            })
            .collect()
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::LBrace)?;

        let mut entries = Vec::new();
        self.skip_newlines();
        while !self.eat(&TokenKind::RBrace) {
            entries.push(self.parse_object_entry()?);
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBrace)?;
                break;
            }
            self.skip_newlines();
        }

        Ok(Expr::new(ExprKind::ObjectLiteral(entries), self.span_from(start)))
    }

    fn parse_object_entry(&mut self) -> Result<ObjectEntry, ParseError> {
        if self.eat(&TokenKind::DotDotDot) {
            return Ok(ObjectEntry::Spread(self.parse_expr()?));
        }

        let (key, shorthand_ok) = match self.peek() {
            Some(TokenKind::Identifier(name)) => (name.clone(), true),
            Some(TokenKind::Str(s)) => (s.clone(), false),
            Some(kind) if kind.is_keyword() => match kind.text() {
                Some(text) => (text.to_string(), false),
                None => return Err(self.unexpected("an object key")),
            },
            _ => return Err(self.unexpected("an object key")),
        };
        self.pos += 1;

        if self.eat(&TokenKind::Colon) {
            self.skip_newlines();
            return Ok(ObjectEntry::Pair {
                key,
                value: self.parse_expr()?,
            });
        }
        if shorthand_ok {
            Ok(ObjectEntry::Shorthand(key))
        } else {
            Err(self.unexpected("`:`"))
        }
    }

    fn parse_fn(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::Fn)?;

        let params = if self.eat(&TokenKind::LParen) {
            self.parse_params()?
        } else {
            let mut params = Vec::new();
            if matches!(self.peek(), Some(TokenKind::Identifier(_))) {
                params.push(self.parse_param()?);
                while self.eat(&TokenKind::Comma) {
                    params.push(self.parse_param()?);
                }
            }
            params
        };
        reject_instance_params(&params)?;

        let body = if self.eat(&TokenKind::Arrow) {
            self.skip_newlines();
            FnBody::Expr(Box::new(self.parse_expr()?))
        } else if self.eat(&TokenKind::Do) {
            let body = self.parse_block(&[TokenKind::End])?;
            self.expect(&TokenKind::End)?;
            FnBody::Block(body)
        } else {
            return Err(self.unexpected("`=>` or `do`"));
        };

        Ok(Expr::new(
            ExprKind::Fn(Box::new(FnExpr { params, body })),
            self.span_from(start),
        ))
    }

    fn parse_if(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::If)?;
        let node = self.parse_if_rest()?;
        self.expect(&TokenKind::End)?;
        Ok(Expr::new(ExprKind::If(Box::new(node)), self.span_from(start)))
    }

    /// Condition, branch and `else` chain of an `if`. The chain shares the
    /// single closing `end`, which the outermost `if` consumes.
    fn parse_if_rest(&mut self) -> Result<If, ParseError> {
        let cond = self.parse_expr()?;
        let pass = self.parse_block(&[TokenKind::Else, TokenKind::End])?;

        let else_start = self.start();
        let fail = if self.eat(&TokenKind::Else) {
            if self.eat(&TokenKind::If) {
                let inner = self.parse_if_rest()?;
                Some(Expr::new(ExprKind::ElseIf(Box::new(inner)), self.span_from(else_start)))
            } else {
                let body = self.parse_block(&[TokenKind::End])?;
                Some(Expr::new(ExprKind::Else(body), self.span_from(else_start)))
            }
        } else {
            None
        };

        Ok(If { cond, pass, fail })
    }

    fn parse_case(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::Case)?;

        if self.check(&TokenKind::Function) {
            return Err(ParseError::new(
                "a case function must be defined as a statement",
                self.current_span(),
            ));
        }
        if self.check(&TokenKind::Newline) {
            return self.parse_empty_case(start);
        }
        self.parse_case_expr(start)
    }

    /// `case` without a subject: a chain of boolean `when` conditions.
    fn parse_empty_case(&mut self, start: u32) -> Result<Expr, ParseError> {
        let mut clauses = Vec::new();
        self.skip_newlines();

        loop {
            let clause_start = self.start();
            if self.eat(&TokenKind::When) {
                let cond = self.parse_expr()?;
                let body =
                    self.parse_block(&[TokenKind::When, TokenKind::Else, TokenKind::End])?;
                clauses.push(Expr::new(
                    ExprKind::SimpleWhen(Box::new(SimpleWhen { cond, body })),
                    self.span_from(clause_start),
                ));
            } else if self.eat(&TokenKind::Else) {
                let body = self.parse_block(&[TokenKind::End])?;
                clauses.push(Expr::new(ExprKind::CaseElse(body), self.span_from(clause_start)));
                self.expect(&TokenKind::End)?;
                break;
            } else {
                self.expect(&TokenKind::End)?;
                break;
            }
        }

        if !clauses.iter().any(|c| matches!(c.kind, ExprKind::SimpleWhen(_))) {
            return Err(ParseError::new(
                "`case` needs at least one `when` clause",
                self.span_from(start),
            ));
        }
        Ok(Expr::new(ExprKind::EmptyCaseExpr(clauses), self.span_from(start)))
    }
}

/// Build the node for a binary operator token.
fn make_binary(op: &TokenKind, lhs: Expr, rhs: Expr, span: Span) -> Expr {
    let kind = match op {
        TokenKind::PipeGt => ExprKind::Bind(Box::new(Bind {
            value: lhs,
            call: rhs,
        })),
        TokenKind::Pipe => match lhs.kind {
            ExprKind::SchemaUnion(mut items) => {
                items.push(rhs);
                ExprKind::SchemaUnion(items)
            }
            kind => ExprKind::SchemaUnion(vec![Expr::new(kind, lhs.span), rhs]),
        },
        TokenKind::Amp => match lhs.kind {
            ExprKind::SchemaIntersect(mut items) => {
                items.push(rhs);
                ExprKind::SchemaIntersect(items)
            }
            kind => ExprKind::SchemaIntersect(vec![Expr::new(kind, lhs.span), rhs]),
        },
        TokenKind::DotDot | TokenKind::DotDotDot => ExprKind::Range(Box::new(RangeExpr {
            from: lhs,
            to: rhs,
            exclusive: matches!(op, TokenKind::DotDotDot),
        })),
        _ => {
            let op = match op {
                TokenKind::Plus => BinaryOp::Plus,
                TokenKind::Minus => BinaryOp::Minus,
                TokenKind::Star => BinaryOp::Mult,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Mod,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::GtEq => BinaryOp::Gte,
                TokenKind::LtEq => BinaryOp::Lte,
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::NotEq,
                TokenKind::In => BinaryOp::In,
                TokenKind::AmpAmp => BinaryOp::And,
                TokenKind::PipePipe => BinaryOp::Or,
                other => unreachable!("{other:?} has a binary precedence but no operator"),
            };
            ExprKind::OpCall(Box::new(OpCall { op, lhs, rhs }))
        }
    };
    Expr::new(kind, span)
}

pub(crate) fn reject_instance_params(params: &[Param]) -> Result<(), ParseError> {
    match params.iter().find(|p| p.instance) {
        Some(param) => Err(ParseError::new(
            format!("`@{}` parameters are only allowed in `def init`", param.name),
            param.span,
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_source(source: &str) -> Vec<Expr> {
        let tokens = tokenize(source).unwrap();
        parse(&tokens, source).unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        let tokens = tokenize(source).unwrap();
        parse(&tokens, source).unwrap_err()
    }

    fn single(source: &str) -> ExprKind {
        let mut body = parse_source(source);
        assert_eq!(body.len(), 1, "{body:?}");
        body.remove(0).kind
    }

    fn id(expr: &Expr) -> &str {
        match &expr.kind {
            ExprKind::IdLookup(name) => name,
            other => panic!("expected identifier, got {other:?}"),
        }
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(single("30"), ExprKind::Int(30));
        assert_eq!(single("30.5"), ExprKind::Float(30.5));
    }

    #[test]
    fn test_assign() {
        let ExprKind::Assign(assign) = single("a := 3") else {
            panic!("expected assign");
        };
        assert_eq!(assign.name, "a");
        assert_eq!(assign.value.kind, ExprKind::Int(3));
    }

    #[test]
    fn test_assignment_targets() {
        assert!(matches!(single("a = 1"), ExprKind::SimpleAssignment(_)));
        assert!(matches!(single("xs[0] = 1"), ExprKind::ArrayAssignment(_)));
        assert!(matches!(single("user.name = \"x\""), ExprKind::PropertyAssignment(_)));
        let ExprKind::PropertyAssignment(assign) = single("@count = 0") else {
            panic!("expected property assignment");
        };
        assert_eq!(assign.target.kind, ExprKind::SelfRef);
        assert_eq!(assign.property, "count");
    }

    #[test]
    fn test_precedence() {
        let ExprKind::OpCall(add) = single("1 + 2 * 3") else {
            panic!("expected op call");
        };
        assert_eq!(add.op, BinaryOp::Plus);
        assert!(matches!(&add.rhs.kind, ExprKind::OpCall(mul) if mul.op == BinaryOp::Mult));

        let ExprKind::OpCall(or) = single("a && b || c") else {
            panic!("expected op call");
        };
        assert_eq!(or.op, BinaryOp::Or);
    }

    #[test]
    fn test_ranges_and_unions() {
        let ExprKind::Range(range) = single("1...5") else {
            panic!("expected range");
        };
        assert!(range.exclusive);
        let ExprKind::SchemaUnion(items) = single("Int | Str | nil") else {
            panic!("expected union");
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_postfix_chain() {
        let ExprKind::FnCall(call) = single("user.friends[0].greet(1)") else {
            panic!("expected call");
        };
        let ExprKind::PropertyLookup(lookup) = &call.callee.kind else {
            panic!("expected property lookup");
        };
        assert_eq!(lookup.property, "greet");
        assert!(matches!(lookup.target.kind, ExprKind::DynamicLookup(_)));
    }

    #[test]
    fn test_keyword_property_names() {
        let ExprKind::PropertyLookup(lookup) = single("Schema.for") else {
            panic!("expected property lookup");
        };
        assert_eq!(lookup.property, "for");
    }

    #[test]
    fn test_parenless_call() {
        let ExprKind::FnCall(call) = single("print x, y + 1") else {
            panic!("expected call");
        };
        assert_eq!(id(&call.callee), "print");
        assert_eq!(call.args.len(), 2);

        let ExprKind::FnCall(call) = single("console.log \"hi\"") else {
            panic!("expected call");
        };
        assert!(matches!(call.callee.kind, ExprKind::PropertyLookup(_)));
    }

    #[test]
    fn test_parenless_call_is_bounded_to_the_line() {
        let body = parse_source("print\nx\n");
        assert_eq!(body.len(), 2);
        assert!(matches!(body[0].kind, ExprKind::IdLookup(_)));
    }

    #[test]
    fn test_index_needs_adjacent_bracket() {
        assert!(matches!(single("xs[0]"), ExprKind::DynamicLookup(_)));
        let ExprKind::FnCall(call) = single("f [0]") else {
            panic!("expected call");
        };
        assert!(matches!(call.args[0].kind, ExprKind::ArrayLiteral(_)));
    }

    #[test]
    fn test_failed_parenless_attempt_reports_error() {
        let err = parse_err("a b c d :=");
        assert!(err.message.contains("expected"));
    }

    #[test]
    fn test_object_literal_entries() {
        let ExprKind::ObjectLiteral(entries) = single("{a: 1, b, ...rest, \"c d\": 2}") else {
            panic!("expected object");
        };
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1], ObjectEntry::Shorthand("b".into()));
        assert!(matches!(entries[2], ObjectEntry::Spread(_)));
    }

    #[test]
    fn test_string_template() {
        let ExprKind::StrTemplate(parts) = single("\"hi #{name + 1}!\"") else {
            panic!("expected template");
        };
        assert_eq!(parts.len(), 3);
        let StrPart::Code(code) = &parts[1] else {
            panic!("expected code part");
        };
        assert!(matches!(code.kind, ExprKind::OpCall(_)));
        assert_eq!(code.span, Span::new(6, 14));
    }

    #[test]
    fn test_def_shapes() {
        assert!(matches!(single("def add(a, b) = a + b"), ExprKind::SingleLineDefWithArgs(_)));
        assert!(matches!(single("def answer = 42"), ExprKind::SingleLineDefWithoutArgs(_)));
        assert!(matches!(
            single("def add(a, b)\n  a + b\nend"),
            ExprKind::MultilineDefWithArgs(_)
        ));
        assert!(matches!(
            single("def main\n  print 1\nend"),
            ExprKind::MultilineDefWithoutArgs(_)
        ));
    }

    #[test]
    fn test_typed_params_build_args_schema() {
        let ExprKind::SingleLineDefWithArgs(def) = single("def inc(n: Int, by) = n + by") else {
            panic!("expected def");
        };
        let Some(Expr { kind: ExprKind::ArgsSchema(items), .. }) = &def.args_schema else {
            panic!("expected args schema");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].kind, ExprKind::SchemaCapture(None));
    }

    #[test]
    fn test_fn_forms() {
        let ExprKind::Fn(f) = single("fn a, b => a + b") else {
            panic!("expected fn");
        };
        assert_eq!(f.params.len(), 2);
        let ExprKind::Fn(f) = single("fn(x) do\n  x\nend") else {
            panic!("expected fn");
        };
        assert!(matches!(f.body, FnBody::Block(_)));
        assert!(matches!(single("%{ % * 2 }"), ExprKind::ShortFn(_)));
    }

    #[test]
    fn test_if_else_chain() {
        let ExprKind::If(node) = single("if a\n  1\nelse if b\n  2\nelse\n  3\nend") else {
            panic!("expected if");
        };
        let Some(Expr { kind: ExprKind::ElseIf(inner), .. }) = &node.fail else {
            panic!("expected else if");
        };
        assert!(matches!(
            inner.fail.as_ref().map(|e| &e.kind),
            Some(ExprKind::Else(_))
        ));
    }

    #[test]
    fn test_empty_case() {
        let ExprKind::EmptyCaseExpr(clauses) =
            single("case\nwhen a > 1\n  :big\nelse\n  :small\nend")
        else {
            panic!("expected case");
        };
        assert!(matches!(clauses[0].kind, ExprKind::SimpleWhen(_)));
        assert!(matches!(clauses[1].kind, ExprKind::CaseElse(_)));
    }

    #[test]
    fn test_loops() {
        assert!(matches!(single("for x of xs\n  print x\nend"), ExprKind::SimpleForOfLoop(_)));
        assert!(matches!(single("for k in obj\n  print k\nend"), ExprKind::SimpleForInLoop(_)));
        let ExprKind::ForOfObjDeconstructLoop(node) = single("for {a, b} of pairs\n  print a\nend")
        else {
            panic!("expected loop");
        };
        assert_eq!(node.names, vec!["a", "b"]);
        assert!(matches!(single("while i < 3\n  i = i + 1\nend"), ExprKind::While(_)));
    }

    #[test]
    fn test_modules() {
        let ExprKind::Import(import) = single("import { a, b as c } from \"./lib\"") else {
            panic!("expected import");
        };
        assert_eq!(import.from, "./lib");
        let ImportClause::Named(specifiers) = &import.clause else {
            panic!("expected named import");
        };
        assert_eq!(specifiers[1].alias.as_deref(), Some("c"));
        assert!(matches!(single("export x := 1"), ExprKind::Export(_)));
        assert!(parse_err("export print 1").message.contains("exported"));
    }

    #[test]
    fn test_schema_definition_converts_objects() {
        let ExprKind::SchemaDefinition(def) = single("schema User = { id, name: Str }") else {
            panic!("expected schema");
        };
        assert!(matches!(def.schema.kind, ExprKind::SchemaObjectLiteral(_)));
    }

    #[test]
    fn test_error_reports_expected_and_found() {
        let err = parse_err("foo(1, 2");
        assert_eq!(err.expected.as_deref(), Some("`)`"));
        assert_eq!(err.found, "end of input");
    }

    #[test]
    fn test_missing_end() {
        let err = parse_err("if a\n  1\n");
        assert!(err.message.contains("`end`"), "{}", err.message);
    }

    #[test]
    fn test_statements_separated_by_newlines_and_semicolons() {
        let body = parse_source("a := 1; b := 2\nc := 3");
        assert_eq!(body.len(), 3);
    }
}
