//! Class body parsing.
//!
//! A class body is a list of members:
//!
//! - `def init(@a, @b)`: shorthand constructor assigning its arguments
//! - `def name = expr`: getter
//! - `def self.name ...`: static method
//! - `def name(args) ... end`: method
//! - `@name := expr`: instance property with an initial value

use crate::ast::*;
use crate::parser::{reject_instance_params, ParseError, Parser};
use crate::token::TokenKind;

impl<'a> Parser<'a> {
    pub(crate) fn parse_class(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::Class)?;
        let name = self.expect_identifier("a class name")?;
        let parent = if self.eat(&TokenKind::Lt) {
            Some(self.expect_identifier("a parent class name")?)
        } else {
            None
        };

        let mut members = Vec::new();
        self.skip_newlines();
        while !self.eat(&TokenKind::End) {
            if self.current().is_none() {
                return Err(self.unexpected("`end`"));
            }
            members.push(self.parse_class_member()?);
            match self.peek() {
                Some(TokenKind::Newline | TokenKind::Semicolon) => self.pos += 1,
                Some(TokenKind::End) => {}
                _ => return Err(self.unexpected("end of line")),
            }
            self.skip_newlines();
        }

        Ok(Expr::new(
            ExprKind::Class(Box::new(Class {
                name,
                parent,
                members,
            })),
            self.span_from(start),
        ))
    }

    fn parse_class_member(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        match self.peek() {
            Some(TokenKind::Def) => self.parse_method(),
            Some(TokenKind::InstanceProperty(name))
                if matches!(self.peek_nth(1), Some(TokenKind::ColonEq)) =>
            {
                self.pos += 2;
                self.skip_newlines();
                let value = self.parse_expr()?;
                Ok(Expr::new(
                    ExprKind::InstanceProperty(Box::new(Assign {
                        name: name.clone(),
                        value,
                    })),
                    self.span_from(start),
                ))
            }
            _ => Err(self.unexpected("a method or `@property :=` in class body")),
        }
    }

    fn parse_method(&mut self) -> Result<Expr, ParseError> {
        let header = self.parse_def_header()?;

        let shorthand = !header.params.is_empty() && header.params.iter().all(|p| p.instance);
        if shorthand {
            if header.name != "init" || header.is_static {
                return Err(ParseError::new(
                    "only `def init` can take `@` parameters",
                    self.span_from(header.start),
                ));
            }
            return Ok(Expr::new(
                ExprKind::ShortHandConstructor(Box::new(ShortHandConstructor {
                    params: header.params,
                })),
                self.span_from(header.start),
            ));
        }
        reject_instance_params(&header.params)?;

        let is_static = header.is_static;
        let start = header.start;
        let method = self.parse_def_body(header)?;
        let span = self.span_from(start);

        Ok(match method.kind {
            ExprKind::SingleLineDefWithArgs(def)
            | ExprKind::SingleLineDefWithoutArgs(def)
            | ExprKind::MultilineDefWithArgs(def)
            | ExprKind::MultilineDefWithoutArgs(def)
                if is_static =>
            {
                Expr::new(ExprKind::StaticMethod(def), span)
            }
            ExprKind::SingleLineDefWithoutArgs(def) => Expr::new(ExprKind::OneLineGetter(def), span),
            kind => Expr::new(kind, span),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn parse_class(source: &str) -> Class {
        let tokens = tokenize(source).unwrap();
        let mut body = parse(&tokens, source).unwrap();
        match body.remove(0).kind {
            ExprKind::Class(class) => *class,
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn test_class_members() {
        let class = parse_class(
            "class Point < Shape\n  @label := \"p\"\n  def init(@x, @y)\n  def norm = @x * @x + @y * @y\n  def self.origin = Point(0, 0)\n  def move(dx)\n    @x = @x + dx\n  end\nend",
        );
        assert_eq!(class.name, "Point");
        assert_eq!(class.parent.as_deref(), Some("Shape"));
        assert!(matches!(class.members[0].kind, ExprKind::InstanceProperty(_)));
        assert!(matches!(class.members[1].kind, ExprKind::ShortHandConstructor(_)));
        assert!(matches!(class.members[2].kind, ExprKind::OneLineGetter(_)));
        assert!(matches!(class.members[3].kind, ExprKind::StaticMethod(_)));
        assert!(matches!(class.members[4].kind, ExprKind::MultilineDefWithArgs(_)));
    }

    #[test]
    fn test_instance_params_outside_init() {
        let source = "class A\n  def set(@x)\nend";
        let tokens = tokenize(source).unwrap();
        assert!(parse(&tokens, source).is_err());
    }

    #[test]
    fn test_static_def_outside_class() {
        let source = "def self.make = 1";
        let tokens = tokenize(source).unwrap();
        let err = parse(&tokens, source).unwrap_err();
        assert!(err.message.contains("class"));
    }
}
