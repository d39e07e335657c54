//! AST node types for Peacock.
//!
//! Peacock is expression oriented: a program is a list of `Expr` nodes and
//! statements such as definitions or loops are just variants that only make
//! sense at block level. Variants with more than one field keep their data in
//! a boxed struct so `ExprKind` stays small.

use crate::span::Span;

/// An AST node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // === Literals ===
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// String with `#{...}` interpolation
    StrTemplate(Vec<StrPart>),
    /// Symbol literal: `:ok`
    Sym(String),
    /// `nil`
    Null,

    // === Containers ===
    ArrayLiteral(Vec<Expr>),
    ObjectLiteral(Vec<ObjectEntry>),
    /// Object literal in schema position: every value is a schema.
    SchemaObjectLiteral(Vec<SchemaEntry>),
    /// `...xs` inside arrays, objects and call arguments
    Spread(Box<Expr>),
    /// `a..b` / `a...b`
    Range(Box<RangeExpr>),

    // === Bindings ===
    /// Hoisted declaration of mutable names: `let a, b;`
    Declare(Vec<String>),
    /// `a := expr`
    Assign(Box<Assign>),
    /// `a = expr`
    SimpleAssignment(Box<Assign>),
    /// `xs[i] = expr`
    ArrayAssignment(Box<ArrayAssignment>),
    /// `obj.key = expr`, `@key = expr`
    PropertyAssignment(Box<PropertyAssignment>),

    // === Control flow ===
    If(Box<If>),
    /// `else if` branch of an `If`
    ElseIf(Box<If>),
    /// `else` branch of an `If`
    Else(Vec<Expr>),
    /// `case` without a subject; holds `SimpleWhen` and `CaseElse` nodes
    EmptyCaseExpr(Vec<Expr>),
    SimpleWhen(Box<SimpleWhen>),
    CaseElse(Vec<Expr>),
    /// `case subject` with pattern clauses
    CaseExpr(Box<CaseExpr>),
    While(Box<While>),
    Return(Option<Box<Expr>>),
    Throw(Box<Expr>),
    /// Statements spliced into the enclosing block.
    Seq(Vec<Expr>),

    // === Functions ===
    /// `fn a, b => expr` / `fn(a) do ... end`
    Fn(Box<FnExpr>),
    /// `%{ % + 1 }`
    ShortFn(Box<Expr>),
    /// `def name(a) = expr`
    SingleLineDefWithArgs(Box<Def>),
    /// `def name = expr`
    SingleLineDefWithoutArgs(Box<Def>),
    /// `def name(a) ... end`
    MultilineDefWithArgs(Box<Def>),
    /// `def name ... end`
    MultilineDefWithoutArgs(Box<Def>),
    CaseFunctionDefinition(Box<CaseFunction>),

    // === Calls ===
    FnCall(Box<FnCall>),
    /// Binary operator
    OpCall(Box<OpCall>),
    /// `value |> f(args)`
    Bind(Box<Bind>),
    /// `!expr`
    Not(Box<Expr>),
    /// `-expr`
    Negate(Box<Expr>),

    // === Lookups ===
    IdLookup(String),
    /// `target[index]`
    DynamicLookup(Box<DynamicLookup>),
    /// `target.property`
    PropertyLookup(Box<PropertyLookup>),
    /// `target?.property`
    OptionalChain(Box<PropertyLookup>),
    /// `%`, the argument of a short function
    AnonIdLookup,
    /// `@name`
    InstanceLookup(String),
    /// `::name`
    ClassPropertyLookup(String),
    /// `self`
    SelfRef,

    // === Schemas ===
    SchemaDefinition(Box<SchemaDefinition>),
    /// Matches anything, optionally binding it to a name.
    SchemaCapture(Option<String>),
    /// `A | B`
    SchemaUnion(Vec<Expr>),
    /// `A & B`
    SchemaIntersect(Vec<Expr>),
    /// Schema over a whole argument list.
    ArgsSchema(Vec<Expr>),

    // === Classes ===
    Class(Box<Class>),
    /// `@name := expr` in a class body
    InstanceProperty(Box<Assign>),
    /// `def init(@a, @b)`
    ShortHandConstructor(Box<ShortHandConstructor>),
    /// `def self.name ...`
    StaticMethod(Box<Def>),
    /// `def name = expr` in a class body
    OneLineGetter(Box<Def>),

    // === Loops ===
    SimpleForOfLoop(Box<ForLoop>),
    SimpleForInLoop(Box<ForLoop>),
    ForOfObjDeconstructLoop(Box<ForObjLoop>),

    // === Modules ===
    Import(Box<Import>),
    Export(Box<Expr>),
}

/// One piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Text(String),
    Code(Expr),
}

/// An entry in an object literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEntry {
    /// `key: value`
    Pair { key: String, value: Expr },
    /// `{ key }`
    Shorthand(String),
    /// `{ ...other }`
    Spread(Expr),
}

/// An entry in a schema object literal.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub key: String,
    pub schema: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeExpr {
    pub from: Expr,
    pub to: Expr,
    pub exclusive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayAssignment {
    pub target: Expr,
    pub index: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAssignment {
    pub target: Expr,
    pub property: String,
    pub value: Expr,
}

/// `if` and `else if`. `fail` is an `ElseIf` or `Else` node.
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub cond: Expr,
    pub pass: Vec<Expr>,
    pub fail: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleWhen {
    pub cond: Expr,
    pub body: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr {
    pub subject: Expr,
    pub clauses: Vec<MatchClause>,
    pub fallback: Option<Vec<Expr>>,
}

/// A `when` clause guarded by a schema, shared by `case` expressions and
/// case functions.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    /// Patterns as written, kept for analysis.
    pub patterns: Vec<Expr>,
    /// The schema the clause validates against.
    pub schema: Expr,
    /// Names bound when the clause is taken.
    pub bindings: Vec<Binding>,
    pub body: Vec<Expr>,
    pub span: Span,
}

/// A captured name and where to find its value inside the matched value.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub path: Path,
    pub name: String,
}

/// One step of a binding path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

/// Where a captured value lives inside the matched value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path(pub Vec<PathStep>);

impl Path {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub cond: Expr,
    pub body: Vec<Expr>,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// Schema from `name: Schema`.
    pub schema: Option<Expr>,
    /// `@name` in a shorthand constructor.
    pub instance: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FnBody {
    Expr(Box<Expr>),
    Block(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnExpr {
    pub params: Vec<Param>,
    pub body: FnBody,
}

/// Named function definition, in any of its four shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct Def {
    pub name: String,
    pub params: Vec<Param>,
    /// `ArgsSchema` guard built from typed parameters.
    pub args_schema: Option<Expr>,
    pub body: FnBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseFunction {
    pub name: String,
    pub clauses: Vec<MatchClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnCall {
    pub callee: Expr,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Mult,
    Divide,
    Mod,
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    NotEq,
    In,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpCall {
    pub op: BinaryOp,
    pub lhs: Expr,
    pub rhs: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bind {
    pub value: Expr,
    pub call: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicLookup {
    pub target: Expr,
    pub index: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyLookup {
    pub target: Expr,
    pub property: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDefinition {
    pub name: String,
    pub schema: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: String,
    pub parent: Option<String>,
    pub members: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShortHandConstructor {
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub binding: String,
    pub iterable: Expr,
    pub body: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForObjLoop {
    pub names: Vec<String>,
    pub iterable: Expr,
    pub body: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportClause {
    /// `import name from "mod"`
    Default(String),
    /// `import { a, b as c } from "mod"`
    Named(Vec<ImportSpecifier>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpecifier {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub clause: ImportClause,
    pub from: String,
}

/// Whether an identifier in pattern position binds a name. Capitalised
/// identifiers refer to schemas and `_` discards.
pub fn is_capture_name(name: &str) -> bool {
    name != "_" && name.starts_with(|c: char| c.is_ascii_lowercase() || c == '_')
}

impl Expr {
    /// Names this node binds when used as a pattern, in source order.
    pub fn captures(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_captures(&mut names);
        names
    }

    fn collect_captures(&self, names: &mut Vec<String>) {
        match &self.kind {
            ExprKind::IdLookup(name) if is_capture_name(name) => names.push(name.clone()),
            ExprKind::SchemaCapture(Some(name)) => names.push(name.clone()),
            ExprKind::ArrayLiteral(items) | ExprKind::ArgsSchema(items) => {
                for item in items {
                    item.collect_captures(names);
                }
            }
            ExprKind::ObjectLiteral(entries) => {
                for entry in entries {
                    match entry {
                        ObjectEntry::Pair { value, .. } => value.collect_captures(names),
                        ObjectEntry::Shorthand(key) if is_capture_name(key) => {
                            names.push(key.clone());
                        }
                        ObjectEntry::Shorthand(_) | ObjectEntry::Spread(_) => {}
                    }
                }
            }
            ExprKind::SchemaObjectLiteral(entries) => {
                for entry in entries {
                    entry.schema.collect_captures(names);
                }
            }
            ExprKind::SchemaUnion(items) | ExprKind::SchemaIntersect(items) => {
                for item in items {
                    item.collect_captures(names);
                }
            }
            _ => {}
        }
    }

    /// True for nodes that define something rather than produce a value, so a
    /// function body ending with one returns nothing.
    pub fn is_statement(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Declare(_)
                | ExprKind::Assign(_)
                | ExprKind::SimpleAssignment(_)
                | ExprKind::ArrayAssignment(_)
                | ExprKind::PropertyAssignment(_)
                | ExprKind::While(_)
                | ExprKind::Return(_)
                | ExprKind::Throw(_)
                | ExprKind::Seq(_)
                | ExprKind::SingleLineDefWithArgs(_)
                | ExprKind::SingleLineDefWithoutArgs(_)
                | ExprKind::MultilineDefWithArgs(_)
                | ExprKind::MultilineDefWithoutArgs(_)
                | ExprKind::CaseFunctionDefinition(_)
                | ExprKind::SchemaDefinition(_)
                | ExprKind::Class(_)
                | ExprKind::SimpleForOfLoop(_)
                | ExprKind::SimpleForInLoop(_)
                | ExprKind::ForOfObjDeconstructLoop(_)
                | ExprKind::Import(_)
                | ExprKind::Export(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: ExprKind) -> Expr {
        Expr::new(kind, Span::default())
    }

    fn id(name: &str) -> Expr {
        node(ExprKind::IdLookup(name.into()))
    }

    #[test]
    fn test_captures_walk_nested_patterns() {
        let pattern = node(ExprKind::ArrayLiteral(vec![
            id("a"),
            node(ExprKind::Int(1)),
            node(ExprKind::ObjectLiteral(vec![
                ObjectEntry::Shorthand("b".into()),
                ObjectEntry::Pair { key: "c".into(), value: id("d") },
            ])),
            id("Gt1"),
            id("_"),
        ]));
        assert_eq!(pattern.captures(), vec!["a", "b", "d"]);
    }

    #[test]
    fn test_captures_of_schema_markers() {
        let pattern = node(ExprKind::SchemaObjectLiteral(vec![
            SchemaEntry { key: "x".into(), schema: node(ExprKind::SchemaCapture(Some("x".into()))) },
            SchemaEntry { key: "y".into(), schema: node(ExprKind::SchemaCapture(None)) },
        ]));
        assert_eq!(pattern.captures(), vec!["x"]);
        assert!(node(ExprKind::Int(3)).captures().is_empty());
    }

    #[test]
    fn test_capture_names() {
        assert!(is_capture_name("value"));
        assert!(is_capture_name("_rest"));
        assert!(!is_capture_name("_"));
        assert!(!is_capture_name("User"));
    }
}
