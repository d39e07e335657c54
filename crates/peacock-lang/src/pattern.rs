//! Pattern sub-grammar.
//!
//! Patterns are parsed as ordinary expressions and then rewritten: lower-case
//! identifiers become `SchemaCapture` nodes, object literals become
//! `SchemaObjectLiteral`, and everything else (literals, schema names, calls)
//! is left for the runtime's `Schema.for` to interpret.
//!
//! `pattern := value` is desugared here into an explicit validation:
//!
//! ```text
//! if Schema.valid_q(Schema.for(<pattern>), value)
//!   name := value[0] ...
//! else
//!   throw MatchError.new(value, "<pattern>")
//! end
//! ```

use crate::ast::*;
use crate::parser::{ParseError, Parser};
use crate::span::Span;
use crate::token::TokenKind;

impl<'a> Parser<'a> {
    /// Rewrite `pattern := value` into validation and bindings.
    pub(crate) fn desugar_destructuring(
        &mut self,
        pattern: Expr,
        value: Expr,
        start: u32,
    ) -> Result<Expr, ParseError> {
        let span = self.span_from(start);
        let marked = mark_pattern(&pattern)?;
        let pattern_source = pattern.span.slice(self.source).to_string();

        // The subject is referenced once per binding, so anything but a plain
        // name the pattern does not rebind is evaluated into a temporary first.
        let captures = pattern.captures();
        let reuse = matches!(&value.kind, ExprKind::IdLookup(name) if !captures.contains(name));
        let (setup, subject) = if reuse {
            (None, value)
        } else {
            let name = format!("__match_{}", self.match_counter);
            self.match_counter += 1;
            let value_span = value.span;
            let setup = Expr::new(
                ExprKind::Assign(Box::new(Assign {
                    name: name.clone(),
                    value,
                })),
                value_span,
            );
            (Some(setup), Expr::new(ExprKind::IdLookup(name), value_span))
        };

        let pass = find_bound_variables(&marked)
            .into_iter()
            .map(|binding| {
                Expr::new(
                    ExprKind::Assign(Box::new(Assign {
                        value: path_lookup(&subject, &binding.path),
                        name: binding.name,
                    })),
                    span,
                )
            })
            .collect();

        let error = call(
            Expr::new(ExprKind::IdLookup("MatchError".into()), span),
            vec![subject.clone(), Expr::new(ExprKind::Str(pattern_source), pattern.span)],
            span,
        );
        let fail = Expr::new(
            ExprKind::Else(vec![Expr::new(ExprKind::Throw(Box::new(error)), span)]),
            span,
        );
        let check = Expr::new(
            ExprKind::If(Box::new(If {
                cond: valid_q(schema_for(marked, span), subject, span),
                pass,
                fail: Some(fail),
            })),
            span,
        );

        Ok(match setup {
            Some(setup) => Expr::new(ExprKind::Seq(vec![setup, check]), span),
            None => check,
        })
    }

    /// `case subject` followed by pattern `when` clauses.
    pub(crate) fn parse_case_expr(&mut self, start: u32) -> Result<Expr, ParseError> {
        let subject = self.parse_expr()?;
        self.skip_newlines();

        let mut clauses = Vec::new();
        let mut fallback = None;
        loop {
            let clause_start = self.start();
            if self.eat(&TokenKind::When) {
                let pattern = self.parse_expr()?;
                let marked = mark_pattern(&pattern)?;
                let bindings = find_bound_variables(&marked);
                let body =
                    self.parse_block(&[TokenKind::When, TokenKind::Else, TokenKind::End])?;
                let span = self.span_from(clause_start);
                clauses.push(MatchClause {
                    patterns: vec![pattern],
                    schema: schema_for(marked, span),
                    bindings,
                    body,
                    span,
                });
            } else if self.eat(&TokenKind::Else) {
                fallback = Some(self.parse_block(&[TokenKind::End])?);
                self.expect(&TokenKind::End)?;
                break;
            } else {
                self.expect(&TokenKind::End)?;
                break;
            }
        }

        if clauses.is_empty() {
            return Err(ParseError::new(
                "`case` needs at least one `when` clause",
                self.span_from(start),
            ));
        }

        Ok(Expr::new(
            ExprKind::CaseExpr(Box::new(CaseExpr {
                subject,
                clauses,
                fallback,
            })),
            self.span_from(start),
        ))
    }

    /// `case function name` with one `when (patterns)` clause per overload.
    /// Clauses stay in source order; the first one that matches wins.
    pub(crate) fn parse_case_function(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.expect(&TokenKind::Case)?;
        self.expect(&TokenKind::Function)?;
        let name = self.expect_identifier("a function name")?;
        self.skip_newlines();

        let mut clauses = Vec::new();
        while !self.eat(&TokenKind::End) {
            let clause_start = self.start();
            self.expect(&TokenKind::When)?;
            self.expect(&TokenKind::LParen)?;
            let patterns = self.parse_args(&TokenKind::RParen)?;
            let marked = patterns
                .iter()
                .map(mark_pattern)
                .collect::<Result<Vec<_>, _>>()?;
            let schema = Expr::new(ExprKind::ArgsSchema(marked), self.span_from(clause_start));
            let bindings = find_bound_variables(&schema);
            let body = self.parse_block(&[TokenKind::When, TokenKind::End])?;

            clauses.push(MatchClause {
                patterns,
                schema,
                bindings,
                body,
                span: self.span_from(clause_start),
            });
        }

        if clauses.is_empty() {
            return Err(ParseError::new(
                format!("case function `{name}` has no `when` clauses"),
                self.span_from(start),
            ));
        }

        Ok(Expr::new(
            ExprKind::CaseFunctionDefinition(Box::new(CaseFunction { name, clauses })),
            self.span_from(start),
        ))
    }
}

/// Rewrite a parsed expression into pattern form.
pub fn mark_pattern(expr: &Expr) -> Result<Expr, ParseError> {
    let kind = match &expr.kind {
        ExprKind::IdLookup(name) if name == "_" => ExprKind::SchemaCapture(None),
        ExprKind::IdLookup(name) if is_capture_name(name) => {
            ExprKind::SchemaCapture(Some(name.clone()))
        }
        ExprKind::ArrayLiteral(items) => ExprKind::ArrayLiteral(
            items.iter().map(mark_pattern).collect::<Result<_, _>>()?,
        ),
        ExprKind::ObjectLiteral(entries) => {
            let mut fields = Vec::with_capacity(entries.len());
            for entry in entries {
                fields.push(match entry {
                    ObjectEntry::Pair { key, value } => SchemaEntry {
                        key: key.clone(),
                        schema: mark_pattern(value)?,
                    },
                    ObjectEntry::Shorthand(key) => SchemaEntry {
                        key: key.clone(),
                        schema: Expr::new(
                            ExprKind::SchemaCapture(is_capture_name(key).then(|| key.clone())),
                            expr.span,
                        ),
                    },
                    ObjectEntry::Spread(inner) => return Err(spread_error(inner.span)),
                });
            }
            ExprKind::SchemaObjectLiteral(fields)
        }
        ExprKind::SchemaUnion(items) => ExprKind::SchemaUnion(
            items.iter().map(mark_pattern).collect::<Result<_, _>>()?,
        ),
        ExprKind::SchemaIntersect(items) => ExprKind::SchemaIntersect(
            items.iter().map(mark_pattern).collect::<Result<_, _>>()?,
        ),
        ExprKind::Spread(_) => return Err(spread_error(expr.span)),
        _ => return Ok(expr.clone()),
    };
    Ok(Expr::new(kind, expr.span))
}

fn spread_error(span: Span) -> ParseError {
    ParseError::new("`...` is not allowed in a pattern", span)
}

/// Convert an expression in schema position (`schema X = ...`, `x: ...`).
/// Object literals become schema objects whose shorthand keys accept anything.
/// A `...Base` entry turns the object into an intersection, so later keys
/// replace the ones `Base` brings in.
pub fn to_schema(expr: Expr) -> Expr {
    let span = expr.span;
    let kind = match expr.kind {
        ExprKind::ObjectLiteral(entries) => return object_schema(entries, span),
        ExprKind::ArrayLiteral(items) => {
            ExprKind::ArrayLiteral(items.into_iter().map(to_schema).collect())
        }
        ExprKind::SchemaUnion(items) => {
            ExprKind::SchemaUnion(items.into_iter().map(to_schema).collect())
        }
        ExprKind::SchemaIntersect(items) => {
            ExprKind::SchemaIntersect(items.into_iter().map(to_schema).collect())
        }
        other => other,
    };
    Expr::new(kind, span)
}

fn object_schema(entries: Vec<ObjectEntry>, span: Span) -> Expr {
    let mut parts = Vec::new();
    let mut fields = Vec::new();
    for entry in entries {
        match entry {
            ObjectEntry::Pair { key, value } => fields.push(SchemaEntry {
                key,
                schema: to_schema(value),
            }),
            ObjectEntry::Shorthand(key) => fields.push(SchemaEntry {
                key,
                schema: Expr::new(ExprKind::SchemaCapture(None), span),
            }),
            ObjectEntry::Spread(base) => {
                if !fields.is_empty() {
                    let kind = ExprKind::SchemaObjectLiteral(std::mem::take(&mut fields));
                    parts.push(Expr::new(kind, span));
                }
                parts.push(to_schema(base));
            }
        }
    }

    if parts.is_empty() {
        return Expr::new(ExprKind::SchemaObjectLiteral(fields), span);
    }
    if !fields.is_empty() {
        parts.push(Expr::new(ExprKind::SchemaObjectLiteral(fields), span));
    }
    Expr::new(ExprKind::SchemaIntersect(parts), span)
}

/// Every capture in a marked pattern, with the path to its value.
pub fn find_bound_variables(pattern: &Expr) -> Vec<Binding> {
    let mut bindings = Vec::new();
    collect_bindings(pattern, &mut Vec::new(), &mut bindings);
    bindings
}

fn collect_bindings(pattern: &Expr, path: &mut Vec<PathStep>, out: &mut Vec<Binding>) {
    match &pattern.kind {
        ExprKind::SchemaCapture(Some(name)) => out.push(Binding {
            path: Path::new(path.clone()),
            name: name.clone(),
        }),
        ExprKind::ArrayLiteral(items) | ExprKind::ArgsSchema(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(PathStep::Index(i));
                collect_bindings(item, path, out);
                path.pop();
            }
        }
        ExprKind::SchemaObjectLiteral(entries) => {
            for entry in entries {
                path.push(PathStep::Key(entry.key.clone()));
                collect_bindings(&entry.schema, path, out);
                path.pop();
            }
        }
        ExprKind::SchemaUnion(items) | ExprKind::SchemaIntersect(items) => {
            for item in items {
                collect_bindings(item, path, out);
            }
        }
        _ => {}
    }
}

/// Fold a binding path over `subject` as `.key` / `[index]` lookups.
pub fn path_lookup(subject: &Expr, path: &Path) -> Expr {
    path.steps().iter().fold(subject.clone(), |target, step| {
        let span = target.span;
        let kind = match step {
            PathStep::Key(key) => ExprKind::PropertyLookup(Box::new(PropertyLookup {
                target,
                property: key.clone(),
            })),
            PathStep::Index(i) => ExprKind::DynamicLookup(Box::new(DynamicLookup {
                target,
                index: Expr::new(ExprKind::Int(*i as i64), span),
            })),
        };
        Expr::new(kind, span)
    })
}

/// `ArgsSchema` guard for typed parameters, `None` if no parameter is typed.
pub fn args_schema(params: &[Param]) -> Option<Expr> {
    if params.iter().all(|p| p.schema.is_none()) {
        return None;
    }
    let items: Vec<Expr> = params
        .iter()
        .map(|p| {
            p.schema
                .clone()
                .unwrap_or_else(|| Expr::new(ExprKind::SchemaCapture(None), p.span))
        })
        .collect();
    let span = match (params.first(), params.last()) {
        (Some(first), Some(last)) => first.span.merge(last.span),
        _ => Span::default(),
    };
    Some(Expr::new(ExprKind::ArgsSchema(items), span))
}

fn call(callee: Expr, args: Vec<Expr>, span: Span) -> Expr {
    Expr::new(ExprKind::FnCall(Box::new(FnCall { callee, args })), span)
}

fn schema_member(name: &str, span: Span) -> Expr {
    Expr::new(
        ExprKind::PropertyLookup(Box::new(PropertyLookup {
            target: Expr::new(ExprKind::IdLookup("Schema".into()), span),
            property: name.into(),
        })),
        span,
    )
}

/// `Schema.for(pattern)`
pub fn schema_for(pattern: Expr, span: Span) -> Expr {
    call(schema_member("for", span), vec![pattern], span)
}

/// `Schema.valid_q(schema, subject)`
pub fn valid_q(schema: Expr, subject: Expr, span: Span) -> Expr {
    call(schema_member("valid_q", span), vec![schema, subject], span)
}
