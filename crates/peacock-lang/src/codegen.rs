//! JavaScript code generator.
//!
//! Walks the AST and writes JavaScript that runs against the Peacock runtime
//! (`Schema`, `MatchError`, `Range` and the operator methods). Each function
//! body and the program itself is a scope: names are hoisted into a leading
//! `let` and the last expression of a function body is returned.

use rustc_hash::FxHashSet;

use crate::ast::*;
use crate::hoist::{hoist_block_in_scope, Enclosing};
use crate::pattern::{args_schema, path_lookup};
use crate::schema::Schema;
use crate::span::Span;

/// Code generation options.
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Spaces per indentation level.
    pub indent: usize,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

/// A problem in the source that does not stop compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

/// Names that can be assigned without a declaration in a scope: hoisted
/// names and parameters.
#[derive(Debug)]
struct Scope {
    bindings: FxHashSet<String>,
    kind: ScopeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    /// A function body or the program. `:=` declares a new local here.
    Function,
    /// Control flow lifted into an arrow. `:=` still binds in the function.
    Block,
}

/// The code generator.
pub struct Codegen<'a> {
    /// The program to generate code from.
    program: &'a [Expr],
    /// Output buffer.
    output: String,
    /// Current indentation level.
    indent_level: usize,
    /// Indent string.
    indent_str: String,
    /// Enclosing scopes, innermost last.
    scopes: Vec<Scope>,
    /// Counter for generated names (`__args0`, `__case1`, ...).
    gensym_counter: usize,
    warnings: Vec<Warning>,
}

impl<'a> Codegen<'a> {
    /// Create a new code generator.
    pub fn new(program: &'a [Expr], options: CodegenOptions) -> Self {
        Self {
            program,
            output: String::new(),
            indent_level: 0,
            indent_str: " ".repeat(options.indent),
            scopes: Vec::new(),
            gensym_counter: 0,
            warnings: Vec::new(),
        }
    }

    /// Generate JavaScript source code.
    pub fn generate(self) -> String {
        self.generate_with_warnings().0
    }

    /// Generate JavaScript source code and collect warnings.
    pub fn generate_with_warnings(mut self) -> (String, Vec<Warning>) {
        let program = self.program;
        let body = hoist_block_in_scope(program, &[], &Enclosing::default());
        self.scopes.push(Scope {
            bindings: FxHashSet::default(),
            kind: ScopeKind::Function,
        });
        self.emit_stmts(&body, false);
        self.scopes.pop();

        let mut code = self.output.trim_start_matches('\n').to_string();
        if !code.is_empty() {
            code.push('\n');
        }
        (code, self.warnings)
    }

    // =========================================================================
    // Output Helpers
    // =========================================================================

    fn emit(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn emit_newline(&mut self) {
        self.output.push('\n');
        for _ in 0..self.indent_level {
            self.output.push_str(&self.indent_str);
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn gensym(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.gensym_counter);
        self.gensym_counter += 1;
        name
    }

    /// Scopes of the current function, innermost first.
    fn function_scopes(&self) -> impl Iterator<Item = &Scope> {
        let start = self
            .scopes
            .iter()
            .rposition(|scope| scope.kind == ScopeKind::Function)
            .unwrap_or(0);
        self.scopes[start..].iter().rev()
    }

    /// Whether `:=` on `name` assigns an existing binding of this function.
    fn is_bound_locally(&self, name: &str) -> bool {
        self.function_scopes().any(|scope| scope.bindings.contains(name))
    }

    fn enclosing(&self, kind: ScopeKind) -> Enclosing {
        let all = self
            .scopes
            .iter()
            .flat_map(|scope| scope.bindings.iter().cloned())
            .collect();
        let function = match kind {
            ScopeKind::Function => FxHashSet::default(),
            ScopeKind::Block => self
                .function_scopes()
                .flat_map(|scope| scope.bindings.iter().cloned())
                .collect(),
        };
        Enclosing { all, function }
    }

    fn emit_comma_separated(&mut self, items: &[Expr]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.emit(", ");
            }
            self.emit_expr(item);
        }
    }

    // =========================================================================
    // Blocks & Scopes
    // =========================================================================

    /// Each statement on its own line; the last one is returned when
    /// `implicit_return` is set.
    fn emit_stmts(&mut self, stmts: &[Expr], implicit_return: bool) {
        for (i, stmt) in stmts.iter().enumerate() {
            self.emit_newline();
            if implicit_return && i + 1 == stmts.len() {
                self.emit_return_position(stmt);
            } else {
                self.emit_stmt(stmt);
            }
        }
    }

    /// `{ ... }` in the current scope.
    fn emit_block(&mut self, stmts: &[Expr], implicit_return: bool) {
        if stmts.is_empty() {
            self.emit("{}");
            return;
        }
        self.emit("{");
        self.indent();
        self.emit_stmts(stmts, implicit_return);
        self.dedent();
        self.emit_newline();
        self.emit("}");
    }

    /// `{ ... }` opening a new scope: `params` are bound, hoisted names are
    /// declared first, then `prelude` runs before the body.
    fn emit_scope(
        &mut self,
        body: &[Expr],
        params: Vec<String>,
        kind: ScopeKind,
        implicit_return: bool,
        prelude: impl FnOnce(&mut Self),
    ) {
        let body = hoist_block_in_scope(body, &params, &self.enclosing(kind));
        self.scopes.push(Scope {
            bindings: params.into_iter().collect(),
            kind,
        });

        self.emit("{");
        self.indent();
        prelude(self);
        self.emit_stmts(&body, implicit_return);
        self.dedent();
        self.emit_newline();
        self.emit("}");

        self.scopes.pop();
    }

    fn emit_return_position(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::If(node) => self.emit_if(node, true),
            ExprKind::EmptyCaseExpr(clauses) => self.emit_empty_case(clauses, true),
            ExprKind::CaseExpr(case) => self.emit_case(case, true),
            ExprKind::Seq(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.emit_newline();
                    }
                    if i + 1 == items.len() {
                        self.emit_return_position(item);
                    } else {
                        self.emit_stmt(item);
                    }
                }
            }
            _ if expr.is_statement() => self.emit_stmt(expr),
            _ => {
                self.emit("return ");
                self.emit_expr(expr);
                self.emit(";");
            }
        }
    }

    // =========================================================================
    // Statement Emission
    // =========================================================================

    fn emit_stmt(&mut self, stmt: &Expr) {
        match &stmt.kind {
            ExprKind::Declare(names) => {
                if let Some(scope) = self.scopes.last_mut() {
                    scope.bindings.extend(names.iter().cloned());
                }
                let names: Vec<String> = names.iter().map(|n| js_ident(n)).collect();
                self.emit("let ");
                self.emit(&names.join(", "));
                self.emit(";");
            }
            ExprKind::Assign(assign) => {
                if !self.is_bound_locally(&assign.name) {
                    self.emit("const ");
                }
                self.emit(&js_ident(&assign.name));
                self.emit(" = ");
                self.emit_expr(&assign.value);
                self.emit(";");
            }
            ExprKind::SimpleAssignment(assign) => {
                self.emit(&js_ident(&assign.name));
                self.emit(" = ");
                self.emit_expr(&assign.value);
                self.emit(";");
            }
            ExprKind::ArrayAssignment(assign) => {
                self.emit_operand(&assign.target);
                self.emit("[");
                self.emit_expr(&assign.index);
                self.emit("] = ");
                self.emit_expr(&assign.value);
                self.emit(";");
            }
            ExprKind::PropertyAssignment(assign) => {
                self.emit_operand(&assign.target);
                self.emit(".");
                self.emit(&js_ident(&assign.property));
                self.emit(" = ");
                self.emit_expr(&assign.value);
                self.emit(";");
            }
            ExprKind::If(node) => self.emit_if(node, false),
            ExprKind::EmptyCaseExpr(clauses) => self.emit_empty_case(clauses, false),
            ExprKind::CaseExpr(case) => self.emit_case(case, false),
            ExprKind::While(node) => {
                self.emit("while (");
                self.emit_expr(&node.cond);
                self.emit(") ");
                self.emit_block(&node.body, false);
            }
            ExprKind::Return(value) => match value {
                Some(value) => {
                    self.emit("return ");
                    self.emit_expr(value);
                    self.emit(";");
                }
                None => self.emit("return;"),
            },
            ExprKind::Throw(value) => {
                self.emit("throw ");
                self.emit_expr(value);
                self.emit(";");
            }
            ExprKind::Seq(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.emit_newline();
                    }
                    self.emit_stmt(item);
                }
            }
            ExprKind::SingleLineDefWithArgs(def)
            | ExprKind::SingleLineDefWithoutArgs(def)
            | ExprKind::MultilineDefWithArgs(def)
            | ExprKind::MultilineDefWithoutArgs(def) => {
                self.emit("function ");
                self.emit_def(def, &js_ident(&def.name), true);
            }
            ExprKind::CaseFunctionDefinition(def) => self.emit_case_function(def),
            ExprKind::SchemaDefinition(def) => {
                self.emit("const ");
                self.emit(&js_ident(&def.name));
                self.emit(" = Schema.for(");
                self.emit_expr(&def.schema);
                self.emit(");");
            }
            ExprKind::Class(class) => self.emit_class(class),
            ExprKind::SimpleForOfLoop(node) => self.emit_for(&js_ident(&node.binding), "of", node),
            ExprKind::SimpleForInLoop(node) => self.emit_for(&js_ident(&node.binding), "in", node),
            ExprKind::ForOfObjDeconstructLoop(node) => {
                let names: Vec<String> = node.names.iter().map(|n| js_ident(n)).collect();
                self.emit("for (const { ");
                self.emit(&names.join(", "));
                self.emit(" } of ");
                self.emit_expr(&node.iterable);
                self.emit(") ");
                self.emit_block(&node.body, false);
            }
            ExprKind::Import(import) => self.emit_import(import),
            ExprKind::Export(inner) => {
                self.emit("export ");
                self.emit_stmt(inner);
            }
            ExprKind::ElseIf(_)
            | ExprKind::Else(_)
            | ExprKind::SimpleWhen(_)
            | ExprKind::CaseElse(_)
            | ExprKind::InstanceProperty(_)
            | ExprKind::ShortHandConstructor(_)
            | ExprKind::StaticMethod(_)
            | ExprKind::OneLineGetter(_) => {
                unreachable!("{:?} outside of its parent node at {:?}", stmt.kind, stmt.span)
            }
            ExprKind::ObjectLiteral(_) => {
                self.emit("(");
                self.emit_expr(stmt);
                self.emit(");");
            }
            _ => {
                self.emit_expr(stmt);
                self.emit(";");
            }
        }
    }

    fn emit_if(&mut self, node: &If, implicit_return: bool) {
        self.emit("if (");
        self.emit_expr(&node.cond);
        self.emit(") ");
        self.emit_block(&node.pass, implicit_return);

        match node.fail.as_ref().map(|fail| &fail.kind) {
            Some(ExprKind::ElseIf(inner)) => {
                self.emit(" else ");
                self.emit_if(inner, implicit_return);
            }
            Some(ExprKind::Else(body)) => {
                self.emit(" else ");
                self.emit_block(body, implicit_return);
            }
            Some(other) => unreachable!("if branch must be `else if` or `else`, got {other:?}"),
            None => {}
        }
    }

    fn emit_empty_case(&mut self, clauses: &[Expr], implicit_return: bool) {
        for (i, clause) in clauses.iter().enumerate() {
            match &clause.kind {
                ExprKind::SimpleWhen(when) => {
                    if i > 0 {
                        self.emit(" else ");
                    }
                    self.emit("if (");
                    self.emit_expr(&when.cond);
                    self.emit(") ");
                    self.emit_block(&when.body, implicit_return);
                }
                ExprKind::CaseElse(body) => {
                    self.emit(" else ");
                    self.emit_block(body, implicit_return);
                }
                other => unreachable!("case clause must be `when` or `else`, got {other:?}"),
            }
        }
    }

    fn emit_case(&mut self, case: &CaseExpr, implicit_return: bool) {
        self.check_reachability(&case.clauses, false);

        // A clause capturing the subject's own name would shadow it while
        // its bindings are still being read.
        let rebinds = |name: &String| {
            case.clauses
                .iter()
                .any(|clause| clause.patterns.iter().any(|p| p.captures().contains(name)))
        };
        let subject = match &case.subject.kind {
            ExprKind::IdLookup(name) if !rebinds(name) => js_ident(name),
            _ => {
                let name = self.gensym("__case");
                self.emit("const ");
                self.emit(&name);
                self.emit(" = ");
                self.emit_expr(&case.subject);
                self.emit(";");
                self.emit_newline();
                name
            }
        };
        let subject_expr = Expr::new(ExprKind::IdLookup(subject.clone()), case.subject.span);

        for (i, clause) in case.clauses.iter().enumerate() {
            if i > 0 {
                self.emit(" else ");
            }
            self.emit("if (Schema.valid_q(");
            self.emit_expr(&clause.schema);
            self.emit(", ");
            self.emit(&subject);
            self.emit(")) ");

            self.emit("{");
            self.indent();
            self.emit_clause_bindings(clause, &subject_expr);
            self.emit_stmts(&clause.body, implicit_return);
            self.dedent();
            self.emit_newline();
            self.emit("}");
        }

        self.emit(" else ");
        match &case.fallback {
            Some(body) => self.emit_block(body, implicit_return),
            None => {
                self.emit("{");
                self.indent();
                self.emit_newline();
                self.emit("throw MatchError.new(");
                self.emit(&subject);
                self.emit(", \"case\");");
                self.dedent();
                self.emit_newline();
                self.emit("}");
            }
        }
    }

    fn emit_clause_bindings(&mut self, clause: &MatchClause, subject: &Expr) {
        for binding in &clause.bindings {
            self.emit_newline();
            self.emit("const ");
            self.emit(&js_ident(&binding.name));
            self.emit(" = ");
            self.emit_expr(&path_lookup(subject, &binding.path));
            self.emit(";");
        }
    }

    fn emit_case_function(&mut self, def: &CaseFunction) {
        self.check_reachability(&def.clauses, true);

        let args = self.gensym("__args");
        let args_expr = Expr::new(ExprKind::IdLookup(args.clone()), Span::default());

        self.emit("function ");
        self.emit(&js_ident(&def.name));
        self.emit("(...");
        self.emit(&args);
        self.emit(") {");
        self.indent();
        self.emit_newline();

        for (i, clause) in def.clauses.iter().enumerate() {
            if i > 0 {
                self.emit(" else ");
            }
            self.emit("if (Schema.valid_q(");
            self.emit_expr(&clause.schema);
            self.emit(", ");
            self.emit(&args);
            self.emit(")) ");

            let params = clause.bindings.iter().map(|b| b.name.clone()).collect();
            self.emit_scope(&clause.body, params, ScopeKind::Function, true, |this| {
                this.emit_clause_bindings(clause, &args_expr);
            });
        }

        self.emit_newline();
        self.emit("throw MatchError.new(");
        self.emit(&args);
        self.emit(", ");
        self.emit(&quote(&def.name));
        self.emit(");");
        self.dedent();
        self.emit_newline();
        self.emit("}");
    }

    /// Warn about `when` clauses an earlier clause always wins over.
    fn check_reachability(&mut self, clauses: &[MatchClause], args: bool) {
        let schemas: Vec<Option<Schema>> = clauses
            .iter()
            .map(|clause| {
                if args {
                    Schema::from_pattern(&clause.schema)
                } else {
                    clause.patterns.first().and_then(Schema::from_pattern)
                }
            })
            .collect();

        for (later, schema) in schemas.iter().enumerate().skip(1) {
            let Some(schema) = schema else { continue };
            let shadowing = schemas[..later]
                .iter()
                .position(|earlier| earlier.as_ref().is_some_and(|e| e.subsumes(schema)));
            if let Some(earlier) = shadowing {
                self.warnings.push(Warning {
                    message: format!(
                        "unreachable `when` clause: clause {} matches everything this one does",
                        earlier + 1
                    ),
                    span: clauses[later].span,
                });
            }
        }
    }

    /// Parameter list and body of a named function or method.
    fn emit_def(&mut self, def: &Def, name: &str, implicit_return: bool) {
        self.emit_def_body(def, name, implicit_return, false);
    }

    /// `def init` of a class. A subclass calls `super()` before the body
    /// can touch `this`.
    fn emit_constructor(&mut self, def: &Def, has_parent: bool) {
        self.emit_def_body(def, "constructor", false, has_parent);
    }

    fn emit_def_body(&mut self, def: &Def, name: &str, implicit_return: bool, super_call: bool) {
        self.emit(name);
        self.emit("(");
        self.emit_params(&def.params);
        self.emit(") ");

        let body = match &def.body {
            FnBody::Expr(expr) => std::slice::from_ref(expr.as_ref()),
            FnBody::Block(body) => body.as_slice(),
        };
        let params = def.params.iter().map(|p| p.name.clone()).collect();
        self.emit_scope(body, params, ScopeKind::Function, implicit_return, |this| {
            if super_call {
                this.emit_newline();
                this.emit("super();");
            }
            if let Some(schema) = &def.args_schema {
                this.emit_args_guard(schema, &def.params, &def.name);
            }
        });
    }

    fn emit_params(&mut self, params: &[Param]) {
        let names: Vec<String> = params.iter().map(|p| js_ident(&p.name)).collect();
        self.emit(&names.join(", "));
    }

    /// Validate typed parameters on entry.
    fn emit_args_guard(&mut self, schema: &Expr, params: &[Param], name: &str) {
        let names: Vec<String> = params.iter().map(|p| js_ident(&p.name)).collect();
        let args = format!("[{}]", names.join(", "));

        self.emit_newline();
        self.emit("if (!Schema.valid_q(");
        self.emit_expr(schema);
        self.emit(", ");
        self.emit(&args);
        self.emit(")) {");
        self.indent();
        self.emit_newline();
        self.emit("throw MatchError.new(");
        self.emit(&args);
        self.emit(", ");
        self.emit(&quote(name));
        self.emit(");");
        self.dedent();
        self.emit_newline();
        self.emit("}");
    }

    fn emit_for(&mut self, binding: &str, keyword: &str, node: &ForLoop) {
        self.emit("for (const ");
        self.emit(binding);
        self.emit(" ");
        self.emit(keyword);
        self.emit(" ");
        self.emit_expr(&node.iterable);
        self.emit(") ");
        self.emit_block(&node.body, false);
    }

    fn emit_class(&mut self, class: &Class) {
        self.emit("class ");
        self.emit(&class.name);
        if let Some(parent) = &class.parent {
            self.emit(" extends ");
            self.emit(parent);
        }
        self.emit(" {");
        self.indent();

        for member in &class.members {
            self.emit_newline();
            self.emit_class_member(member, class.parent.is_some());
        }

        if class.parent.is_none() {
            self.emit_newline();
            self.emit("static new(...args) {");
            self.indent();
            self.emit_newline();
            self.emit("return new this(...args);");
            self.dedent();
            self.emit_newline();
            self.emit("}");
        }

        self.dedent();
        self.emit_newline();
        self.emit("}");
    }

    fn emit_class_member(&mut self, member: &Expr, has_parent: bool) {
        match &member.kind {
            ExprKind::InstanceProperty(property) => {
                self.emit(&js_ident(&property.name));
                self.emit(" = ");
                self.emit_expr(&property.value);
                self.emit(";");
            }
            ExprKind::ShortHandConstructor(ctor) => {
                self.emit("constructor(");
                self.emit_params(&ctor.params);
                self.emit(") {");
                self.indent();
                if has_parent {
                    self.emit_newline();
                    self.emit("super();");
                }
                for param in &ctor.params {
                    let name = js_ident(&param.name);
                    self.emit_newline();
                    self.emit(&format!("this.{name} = {name};"));
                }
                self.dedent();
                self.emit_newline();
                self.emit("}");
            }
            ExprKind::OneLineGetter(def) => {
                self.emit("get ");
                self.emit_def(def, &js_ident(&def.name), true);
            }
            ExprKind::StaticMethod(def) => {
                self.emit("static ");
                self.emit_def(def, &js_ident(&def.name), true);
            }
            ExprKind::SingleLineDefWithArgs(def)
            | ExprKind::SingleLineDefWithoutArgs(def)
            | ExprKind::MultilineDefWithArgs(def)
            | ExprKind::MultilineDefWithoutArgs(def) => {
                if def.name == "init" {
                    self.emit_constructor(def, has_parent);
                } else {
                    self.emit_def(def, &js_ident(&def.name), true);
                }
            }
            other => unreachable!("not a class member: {other:?}"),
        }
    }

    fn emit_import(&mut self, import: &Import) {
        self.emit("import ");
        match &import.clause {
            ImportClause::Default(name) => self.emit(&js_ident(name)),
            ImportClause::Named(specifiers) => {
                let names: Vec<String> = specifiers
                    .iter()
                    .map(|s| match &s.alias {
                        Some(alias) => format!("{} as {}", js_ident(&s.name), js_ident(alias)),
                        None => js_ident(&s.name),
                    })
                    .collect();
                self.emit("{ ");
                self.emit(&names.join(", "));
                self.emit(" }");
            }
        }
        self.emit(" from ");
        self.emit(&quote(&import.from));
        self.emit(";");
    }

    // =========================================================================
    // Expression Emission
    // =========================================================================

    fn emit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Int(n) => self.emit(&n.to_string()),
            ExprKind::Float(n) => self.emit(&format_number(*n)),
            ExprKind::Bool(b) => self.emit(if *b { "true" } else { "false" }),
            ExprKind::Str(s) => self.emit(&quote(s)),
            ExprKind::StrTemplate(parts) => {
                self.emit("`");
                for part in parts {
                    match part {
                        StrPart::Text(text) => self.emit(&escape_template(text)),
                        StrPart::Code(code) => {
                            self.emit("${");
                            self.emit_expr(code);
                            self.emit("}");
                        }
                    }
                }
                self.emit("`");
            }
            ExprKind::Sym(name) => {
                self.emit("Symbol.for(");
                self.emit(&quote(name));
                self.emit(")");
            }
            ExprKind::Null => self.emit("null"),
            ExprKind::ArrayLiteral(items) => {
                self.emit("[");
                self.emit_comma_separated(items);
                self.emit("]");
            }
            ExprKind::ObjectLiteral(entries) => self.emit_object(entries),
            ExprKind::SchemaObjectLiteral(entries) => {
                if entries.is_empty() {
                    self.emit("{}");
                    return;
                }
                self.emit("{ ");
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        self.emit(", ");
                    }
                    self.emit(&object_key(&entry.key));
                    self.emit(": ");
                    self.emit_expr(&entry.schema);
                }
                self.emit(" }");
            }
            ExprKind::Spread(inner) => {
                self.emit("...");
                self.emit_expr(inner);
            }
            ExprKind::Range(range) => {
                self.emit("Range.new(");
                self.emit_expr(&range.from);
                self.emit(", ");
                self.emit_expr(&range.to);
                if range.exclusive {
                    self.emit(", true");
                }
                self.emit(")");
            }
            ExprKind::OpCall(op) => self.emit_op_call(op),
            ExprKind::FnCall(call) => self.emit_call(&call.callee, None, &call.args),
            ExprKind::Bind(bind) => match &bind.call.kind {
                ExprKind::FnCall(call) => self.emit_call(&call.callee, Some(&bind.value), &call.args),
                _ => self.emit_call(&bind.call, Some(&bind.value), &[]),
            },
            ExprKind::Not(inner) => {
                self.emit("!");
                self.emit_unary_operand(inner);
            }
            ExprKind::Negate(inner) => {
                self.emit("-");
                self.emit_unary_operand(inner);
            }
            ExprKind::IdLookup(name) => self.emit(&js_ident(name)),
            ExprKind::DynamicLookup(lookup) => {
                self.emit_operand(&lookup.target);
                self.emit("[");
                self.emit_expr(&lookup.index);
                self.emit("]");
            }
            ExprKind::PropertyLookup(lookup) => {
                self.emit_operand(&lookup.target);
                self.emit(".");
                self.emit(&js_ident(&lookup.property));
            }
            ExprKind::OptionalChain(lookup) => {
                self.emit_operand(&lookup.target);
                self.emit("?.");
                self.emit(&js_ident(&lookup.property));
            }
            ExprKind::AnonIdLookup => self.emit(ANON_ARG),
            ExprKind::InstanceLookup(name) => {
                self.emit("this.");
                self.emit(&js_ident(name));
            }
            ExprKind::ClassPropertyLookup(name) => {
                self.emit("this.constructor.");
                self.emit(&js_ident(name));
            }
            ExprKind::SelfRef => self.emit("this"),
            ExprKind::SchemaCapture(name) => match name {
                Some(name) => {
                    self.emit("Schema.any(");
                    self.emit(&quote(name));
                    self.emit(")");
                }
                None => self.emit("Schema.any()"),
            },
            ExprKind::SchemaUnion(items) => {
                self.emit("Schema.or(");
                self.emit_comma_separated(items);
                self.emit(")");
            }
            ExprKind::SchemaIntersect(items) => {
                self.emit("Schema.and(");
                self.emit_comma_separated(items);
                self.emit(")");
            }
            ExprKind::ArgsSchema(items) => {
                self.emit("Schema.for([");
                self.emit_comma_separated(items);
                self.emit("])");
            }
            ExprKind::Fn(f) => self.emit_fn(f),
            ExprKind::ShortFn(body) => {
                self.emit("(");
                self.emit(ANON_ARG);
                self.emit(") => ");
                self.emit_arrow_body(body);
            }
            ExprKind::If(_) | ExprKind::EmptyCaseExpr(_) | ExprKind::CaseExpr(_) => {
                self.emit_iife(expr);
            }
            _ => unreachable!("statement in expression position: {:?}", expr.kind),
        }
    }

    /// Emit `expr` where it is the target of `.`, `[]` or a call, adding
    /// parentheses where JavaScript would read it differently.
    fn emit_operand(&mut self, expr: &Expr) {
        let wrap = match &expr.kind {
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Negate(_)
            | ExprKind::Not(_)
            | ExprKind::Fn(_)
            | ExprKind::ShortFn(_)
            | ExprKind::ObjectLiteral(_) => true,
            ExprKind::OpCall(op) => matches!(op.op, BinaryOp::And | BinaryOp::Or),
            _ => false,
        };
        if wrap {
            self.emit("(");
            self.emit_expr(expr);
            self.emit(")");
        } else {
            self.emit_expr(expr);
        }
    }

    fn emit_unary_operand(&mut self, expr: &Expr) {
        let wrap = match &expr.kind {
            ExprKind::Negate(_) | ExprKind::Fn(_) | ExprKind::ShortFn(_) => true,
            ExprKind::OpCall(op) => matches!(op.op, BinaryOp::And | BinaryOp::Or),
            _ => false,
        };
        if wrap {
            self.emit("(");
            self.emit_expr(expr);
            self.emit(")");
        } else {
            self.emit_expr(expr);
        }
    }

    fn emit_op_call(&mut self, op: &OpCall) {
        match op.op {
            BinaryOp::And | BinaryOp::Or => {
                let symbol = if op.op == BinaryOp::And { " && " } else { " || " };
                self.emit_logical_operand(&op.lhs, op.op);
                self.emit(symbol);
                self.emit_logical_operand(&op.rhs, op.op);
            }
            BinaryOp::Eq | BinaryOp::NotEq if is_nil(&op.lhs) || is_nil(&op.rhs) => {
                // `nil` has no methods.
                if op.op == BinaryOp::NotEq {
                    self.emit("!");
                }
                self.emit("__peacock_equals(");
                self.emit_expr(&op.lhs);
                self.emit(", ");
                self.emit_expr(&op.rhs);
                self.emit(")");
            }
            BinaryOp::NotEq => {
                self.emit("!");
                self.emit_operand(&op.lhs);
                self.emit(".__eq__(");
                self.emit_expr(&op.rhs);
                self.emit(")");
            }
            BinaryOp::In => {
                self.emit_operand(&op.rhs);
                self.emit(".__contains__(");
                self.emit_expr(&op.lhs);
                self.emit(")");
            }
            other => {
                self.emit_operand(&op.lhs);
                self.emit(".");
                self.emit(dunder(other));
                self.emit("(");
                self.emit_expr(&op.rhs);
                self.emit(")");
            }
        }
    }

    fn emit_logical_operand(&mut self, expr: &Expr, parent: BinaryOp) {
        match &expr.kind {
            ExprKind::OpCall(op) if op.op == BinaryOp::Or && parent == BinaryOp::And => {
                self.emit("(");
                self.emit_expr(expr);
                self.emit(")");
            }
            ExprKind::Fn(_) | ExprKind::ShortFn(_) => {
                self.emit("(");
                self.emit_expr(expr);
                self.emit(")");
            }
            _ => self.emit_expr(expr),
        }
    }

    /// `f(a)`; a capitalised name is a constructor: `Point.new(a)`. `first`
    /// is the piped value of `x |> f(a)`.
    fn emit_call(&mut self, callee: &Expr, first: Option<&Expr>, args: &[Expr]) {
        match &callee.kind {
            ExprKind::IdLookup(name) if is_class_name(name) => {
                self.emit(name);
                self.emit(".new");
            }
            _ => self.emit_operand(callee),
        }
        self.emit("(");
        if let Some(first) = first {
            self.emit_expr(first);
            if !args.is_empty() {
                self.emit(", ");
            }
        }
        self.emit_comma_separated(args);
        self.emit(")");
    }

    fn emit_object(&mut self, entries: &[ObjectEntry]) {
        if entries.is_empty() {
            self.emit("{}");
            return;
        }
        self.emit("{ ");
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                self.emit(", ");
            }
            match entry {
                ObjectEntry::Pair { key, value } => {
                    self.emit(&object_key(key));
                    self.emit(": ");
                    self.emit_expr(value);
                }
                ObjectEntry::Shorthand(key) => self.emit(&js_ident(key)),
                ObjectEntry::Spread(value) => {
                    self.emit("...");
                    self.emit_expr(value);
                }
            }
        }
        self.emit(" }");
    }

    fn emit_fn(&mut self, f: &FnExpr) {
        self.emit("(");
        self.emit_params(&f.params);
        self.emit(") => ");

        let guard = args_schema(&f.params);
        let params = f.params.iter().map(|p| p.name.clone()).collect();
        match &f.body {
            FnBody::Expr(body) if guard.is_none() && !is_control_flow(body) => {
                self.emit_arrow_body(body);
            }
            FnBody::Expr(body) => {
                let body = std::slice::from_ref(body.as_ref());
                self.emit_scope(body, params, ScopeKind::Function, true, |this| {
                    if let Some(schema) = &guard {
                        this.emit_args_guard(schema, &f.params, "fn");
                    }
                });
            }
            FnBody::Block(body) => {
                self.emit_scope(body, params, ScopeKind::Function, true, |this| {
                    if let Some(schema) = &guard {
                        this.emit_args_guard(schema, &f.params, "fn");
                    }
                });
            }
        }
    }

    fn emit_arrow_body(&mut self, body: &Expr) {
        if matches!(body.kind, ExprKind::ObjectLiteral(_)) {
            self.emit("(");
            self.emit_expr(body);
            self.emit(")");
        } else {
            self.emit_expr(body);
        }
    }

    /// Control flow used as a value runs in an immediately invoked arrow.
    fn emit_iife(&mut self, expr: &Expr) {
        self.emit("(() => ");
        self.emit_scope(std::slice::from_ref(expr), Vec::new(), ScopeKind::Block, true, |_| {});
        self.emit(")()");
    }
}

fn is_nil(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Null)
}

/// Name of the implicit short-function argument.
const ANON_ARG: &str = "__arg";

fn is_control_flow(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::If(_) | ExprKind::EmptyCaseExpr(_) | ExprKind::CaseExpr(_)
    )
}

fn is_class_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_uppercase())
}

fn dunder(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Plus => "__plus__",
        BinaryOp::Minus => "__minus__",
        BinaryOp::Mult => "__mult__",
        BinaryOp::Divide => "__divide__",
        BinaryOp::Mod => "__mod__",
        BinaryOp::Gt => "__gt__",
        BinaryOp::Lt => "__lt__",
        BinaryOp::Gte => "__gte__",
        BinaryOp::Lte => "__lte__",
        BinaryOp::Eq => "__eq__",
        BinaryOp::NotEq | BinaryOp::In | BinaryOp::And | BinaryOp::Or => {
            unreachable!("{op:?} has no operator method")
        }
    }
}

/// Peacock identifiers may end in `?` or `!`; JavaScript ones may not.
pub fn js_ident(name: &str) -> String {
    if let Some(stem) = name.strip_suffix('?') {
        format!("{stem}_q")
    } else if let Some(stem) = name.strip_suffix('!') {
        format!("{stem}_b")
    } else {
        name.to_string()
    }
}

fn object_key(key: &str) -> String {
    let stem = key.trim_end_matches(['?', '!']);
    let is_ident = !stem.is_empty()
        && !stem.starts_with(|c: char| c.is_ascii_digit())
        && stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && stem.len() + 1 >= key.len();
    if is_ident {
        js_ident(key)
    } else {
        quote(key)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

fn quote(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => result.push_str("\\0"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result.push('"');
    result
}

fn escape_template(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '`' => result.push_str("\\`"),
            '$' => result.push_str("\\$"),
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn compile(source: &str) -> String {
        compile_with_warnings(source).0
    }

    fn compile_with_warnings(source: &str) -> (String, Vec<Warning>) {
        let tokens = tokenize(source).unwrap();
        let program = parse(&tokens, source).unwrap();
        Codegen::new(&program, CodegenOptions::default()).generate_with_warnings()
    }

    #[test]
    fn test_const_binding() {
        assert_eq!(compile("a := 3"), "const a = 3;\n");
    }

    #[test]
    fn test_operators_use_methods() {
        let output = compile("def add(a, b) = a + b");
        assert_eq!(output, "function add(a, b) {\n  return a.__plus__(b);\n}\n");

        let output = compile("x := a != b && 1 in xs || !ok");
        assert!(output.contains("!a.__eq__(b) && xs.__contains__(1) || !ok"), "{output}");
        assert!(compile("y := 1 * 2").contains("(1).__mult__(2)"));
    }

    #[test]
    fn test_logical_grouping_is_kept() {
        let output = compile("x := (a || b) && c");
        assert!(output.contains("(a || b) && c"), "{output}");
    }

    #[test]
    fn test_literals() {
        let output = compile("x := [1.5, 2.0, :ok, nil, true, \"q\\\"\", 1..3, 1...3]");
        assert!(
            output.contains(
                "[1.5, 2.0, Symbol.for(\"ok\"), null, true, \"q\\\"\", Range.new(1, 3), Range.new(1, 3, true)]"
            ),
            "{output}"
        );
    }

    #[test]
    fn test_string_template() {
        let output = compile("greet := \"hi #{name}, `$`\"");
        assert!(output.contains("`hi ${name}, \\`\\$\\``"), "{output}");
    }

    #[test]
    fn test_capitalised_call_is_construction() {
        assert!(compile("p := Point(1, 2)").contains("Point.new(1, 2)"));
        assert!(compile("p := make(1)").contains("make(1)"));
    }

    #[test]
    fn test_pipe_inserts_first_argument() {
        assert!(compile("y := x |> f(2)").contains("f(x, 2)"));
        assert!(compile("y := x |> g").contains("g(x)"));
    }

    #[test]
    fn test_identifier_suffixes_are_mangled() {
        let output = compile("def empty?(xs) = xs.length == 0\nsave!(empty?([]))");
        assert!(output.contains("function empty_q(xs)"), "{output}");
        assert!(output.contains("save_b(empty_q([]))"), "{output}");
    }

    #[test]
    fn test_destructuring_output() {
        let output = compile("[a] := [1, 2]");
        assert_eq!(
            output,
            "let a;\n\
             const __match_0 = [1, 2];\n\
             if (Schema.valid_q(Schema.for([Schema.any(\"a\")]), __match_0)) {\n  \
             a = __match_0[0];\n\
             } else {\n  \
             throw MatchError.new(__match_0, \"[a]\");\n\
             }\n"
        );
    }

    #[test]
    fn test_hoisted_reassignment() {
        let output = compile("count := 0\ncount := count + 1");
        assert!(output.starts_with("let count;\ncount = 0;\ncount = count.__plus__(1);"), "{output}");
    }

    #[test]
    fn test_closure_assigns_outer_binding() {
        let output = compile("n = 0\ninc := fn do\n  n = n + 1\nend");
        assert!(output.contains("let n;"));
        assert_eq!(output.matches("let n;").count(), 1, "{output}");
    }

    #[test]
    fn test_colon_eq_in_nested_def_declares_local() {
        let output = compile("x := 1\nx := 2\ndef h\n  x := 5\n  x\nend");
        assert!(output.starts_with("let x;\nx = 1;\nx = 2;"), "{output}");
        assert!(output.contains("function h() {\n  const x = 5;\n  return x;\n}"), "{output}");
    }

    #[test]
    fn test_colon_eq_in_iife_binds_in_function() {
        let output = compile("def f\n  y := 0\n  y := 1\n  z := if a\n    y := 2\n  end\n  y\nend");
        assert_eq!(output.matches("let y;").count(), 1, "{output}");
        assert!(output.contains("y = 2;"), "{output}");
        assert!(!output.contains("const y"), "{output}");
    }

    #[test]
    fn test_implicit_return_through_if() {
        let output = compile("def sign(n)\n  if n < 0\n    -1\n  else\n    1\n  end\nend");
        assert!(output.contains("if (n.__lt__(0)) {\n    return -1;\n  } else {\n    return 1;\n  }"), "{output}");
    }

    #[test]
    fn test_if_in_expression_position_is_iife() {
        let output = compile("x := if a\n  1\nelse\n  2\nend");
        assert!(output.starts_with("const x = (() => {\n  if (a) {\n    return 1;\n  }"), "{output}");
        assert!(output.trim_end().ends_with("})();"), "{output}");
    }

    #[test]
    fn test_case_function_clause_order() {
        let output = compile("case function f\nwhen (1)\n  :one\nwhen (Gt1)\n  :big\nend");
        let first = output.find("Schema.for([1])").unwrap();
        let second = output.find("Schema.for([Gt1])").unwrap();
        assert!(first < second);
        assert!(output.starts_with("function f(...__args0) {"), "{output}");
        assert!(output.contains("throw MatchError.new(__args0, \"f\");"));
    }

    #[test]
    fn test_case_function_bindings() {
        let output = compile("case function head\nwhen ([x, _])\n  x\nend");
        assert!(output.contains("const x = __args0[0][0];"), "{output}");
        assert!(output.contains("return x;"), "{output}");
    }

    #[test]
    fn test_gensym_is_monotonic() {
        let output = compile("case function a\nwhen (x)\n  x\nend\ncase function b\nwhen (y)\n  y\nend");
        assert!(output.contains("function a(...__args0)"));
        assert!(output.contains("function b(...__args1)"));
    }

    #[test]
    fn test_unreachable_clause_warning() {
        let (_, warnings) = compile_with_warnings("case function f\nwhen (n)\n  n\nwhen (1)\n  1\nend");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("unreachable"));

        let (_, warnings) = compile_with_warnings("case function f\nwhen (1)\n  1\nwhen (n)\n  n\nend");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_case_expression() {
        let output = compile("case get()\nwhen [x]\n  x\nwhen {name}\n  name\nend");
        assert!(output.contains("const __case0 = get();"), "{output}");
        assert!(output.contains("if (Schema.valid_q(Schema.for([Schema.any(\"x\")]), __case0)) {"));
        assert!(output.contains("const name = __case0.name;"), "{output}");
        assert!(output.contains("throw MatchError.new(__case0, \"case\");"));
    }

    #[test]
    fn test_case_capturing_subject_name_uses_temp() {
        let output = compile("def f(x)\n  case x\n  when [x]\n    x\n  end\nend");
        assert!(output.contains("const __case0 = x;"), "{output}");
        assert!(output.contains("const x = __case0[0];"), "{output}");
        assert!(!output.contains("const x = x"), "{output}");
    }

    #[test]
    fn test_empty_case() {
        let output = compile("case\nwhen a\n  1\nelse\n  2\nend");
        assert_eq!(output, "if (a) {\n  1;\n} else {\n  2;\n}\n");
    }

    #[test]
    fn test_typed_params_guard() {
        let output = compile("def inc(n: Int) = n + 1");
        assert!(output.contains("if (!Schema.valid_q(Schema.for([Int]), [n])) {"), "{output}");
        assert!(output.contains("throw MatchError.new([n], \"inc\");"));
    }

    #[test]
    fn test_schema_definition() {
        let output = compile("schema User = { id, name: Str | nil }");
        assert_eq!(
            output,
            "const User = Schema.for({ id: Schema.any(), name: Schema.or(Str, null) });\n"
        );
    }

    #[test]
    fn test_class_output() {
        let output = compile(
            "class Point\n  @tag := :p\n  def init(@x, @y)\n  def norm = @x * @x\n  def self.origin = Point(0, 0)\n  def shift(dx)\n    @x = @x + dx\n  end\nend",
        );
        assert!(output.contains("class Point {"));
        assert!(output.contains("tag = Symbol.for(\"p\");"));
        assert!(output.contains("constructor(x, y) {\n    this.x = x;\n    this.y = y;\n  }"), "{output}");
        assert!(output.contains("get norm() {"));
        assert!(output.contains("static origin() {\n    return Point.new(0, 0);"), "{output}");
        assert!(output.contains("this.x = this.x.__plus__(dx);"));
        assert!(output.contains("static new(...args) {\n    return new this(...args);\n  }"));
    }

    #[test]
    fn test_subclass_constructor_calls_super() {
        let output = compile("class Dog < Animal\n  def init(@name)\nend");
        assert!(output.contains("class Dog extends Animal {"));
        assert!(output.contains("super();"));
        assert!(!output.contains("static new"));
    }

    #[test]
    fn test_subclass_init_body_calls_super_first() {
        let output = compile("class Dog < Animal\n  def init(name)\n    @name = name\n  end\nend");
        assert!(
            output.contains("constructor(name) {\n    super();\n    this.name = name;\n  }"),
            "{output}"
        );

        let output = compile("class Cat\n  def init(name)\n    @name = name\n  end\nend");
        assert!(!output.contains("super()"), "{output}");
    }

    #[test]
    fn test_schema_spread_merges_base() {
        let output = compile("schema B = {...A, c: 2}");
        assert_eq!(output, "const B = Schema.for(Schema.and(A, { c: 2 }));\n");
    }

    #[test]
    fn test_nil_comparison_is_null_safe() {
        assert!(compile("a := x == nil").contains("const a = __peacock_equals(x, null);"));
        assert!(compile("a := nil != x").contains("const a = !__peacock_equals(null, x);"));
        assert!(compile("a := x == y").contains("x.__eq__(y)"));
    }

    #[test]
    fn test_class_dialect_lookups() {
        let output = compile("def f = [self, ::count, @x]");
        assert!(output.contains("[this, this.constructor.count, this.x]"), "{output}");
    }

    #[test]
    fn test_loops() {
        assert_eq!(
            compile("for x of xs\n  print x\nend"),
            "for (const x of xs) {\n  print(x);\n}\n"
        );
        assert!(compile("for k in o\n  print k\nend").contains("for (const k in o)"));
        assert!(compile("for {a, b} of ps\n  print a\nend").contains("for (const { a, b } of ps)"));
        assert!(compile("while go\n  step()\nend").starts_with("while (go) {"));
    }

    #[test]
    fn test_short_fn_and_fn() {
        assert!(compile("f := %{ % * 2 }").contains("(__arg) => __arg.__mult__(2)"));
        assert!(compile("g := fn a, b => a").contains("(a, b) => a"));
        assert!(compile("h := fn => {a: 1}").contains("() => ({ a: 1 })"));
    }

    #[test]
    fn test_modules() {
        assert_eq!(
            compile("import { a, b as c } from \"./m\""),
            "import { a, b as c } from \"./m\";\n"
        );
        assert_eq!(compile("export x := 1"), "export const x = 1;\n");
        assert!(compile("export def f = 1").starts_with("export function f() {"));
    }

    #[test]
    fn test_indent_option() {
        let tokens = tokenize("def f = 1").unwrap();
        let program = parse(&tokens, "def f = 1").unwrap();
        let output = Codegen::new(&program, CodegenOptions { indent: 4 }).generate();
        assert_eq!(output, "function f() {\n    return 1;\n}\n");
    }
}
