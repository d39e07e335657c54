//! Schema model.
//!
//! The compiler's view of what "matches" means. Generated code delegates to
//! the bundled JavaScript runtime; this model answers the same questions at
//! compile time so overlapping `when` clauses can be reported.
//!
//! Records are open (extra keys are fine) and lists are closed (the length
//! must match).

use std::fmt;
use std::rc::Rc;

use crate::ast::{is_capture_name, Expr, ExprKind, ObjectEntry, Path, PathStep};

/// A runtime value, as far as the compiler can know one.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Sym(String),
    List(Vec<Value>),
    Record(Vec<(String, Value)>),
}

impl Value {
    /// Value of a literal expression, including arrays and objects made only
    /// of literals.
    pub fn from_literal(expr: &Expr) -> Option<Value> {
        Some(match &expr.kind {
            ExprKind::Null => Value::Nil,
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::Int(n) => Value::Int(*n),
            ExprKind::Float(n) => Value::Float(*n),
            ExprKind::Str(s) => Value::Str(s.clone()),
            ExprKind::Sym(s) => Value::Sym(s.clone()),
            ExprKind::Negate(inner) => match Value::from_literal(inner)? {
                Value::Int(n) => Value::Int(-n),
                Value::Float(n) => Value::Float(-n),
                _ => return None,
            },
            ExprKind::ArrayLiteral(items) => Value::List(
                items
                    .iter()
                    .map(Value::from_literal)
                    .collect::<Option<_>>()?,
            ),
            ExprKind::ObjectLiteral(entries) => Value::Record(
                entries
                    .iter()
                    .map(|entry| match entry {
                        ObjectEntry::Pair { key, value } => {
                            Some((key.clone(), Value::from_literal(value)?))
                        }
                        _ => None,
                    })
                    .collect::<Option<_>>()?,
            ),
            _ => return None,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Equality as the runtime sees it: `1 == 1.0`.
    fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| other.get(k).is_some_and(|w| v.loosely_equals(w)))
                    && b.iter().all(|(k, _)| self.get(k).is_some())
            }
            _ => self == other,
        }
    }
}

/// A named predicate schema.
#[derive(Clone)]
pub struct Predicate {
    pub name: String,
    pub test: Rc<dyn Fn(&Value) -> bool>,
}

impl Predicate {
    pub fn new(name: impl Into<String>, test: impl Fn(&Value) -> bool + 'static) -> Self {
        Self {
            name: name.into(),
            test: Rc::new(test),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.name)
    }
}

/// What a value must look like.
#[derive(Debug, Clone)]
pub enum Schema {
    /// Anything, optionally captured under a name.
    Any(Option<String>),
    Literal(Value),
    /// Open record: listed keys must be present and valid.
    Record(Vec<(String, Schema)>),
    /// Closed list: same length, each element valid.
    List(Vec<Schema>),
    Or(Vec<Schema>),
    And(Vec<Schema>),
    Fn(Predicate),
}

impl Schema {
    /// The schema matching exactly `value`. Total: every value has one.
    pub fn for_value(value: &Value) -> Schema {
        match value {
            Value::List(items) => Schema::List(items.iter().map(Schema::for_value).collect()),
            Value::Record(fields) => Schema::Record(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Schema::for_value(v)))
                    .collect(),
            ),
            scalar => Schema::Literal(scalar.clone()),
        }
    }

    /// The schema a pattern stands for, or `None` when it refers to
    /// something only known at run time (a schema name, a call).
    pub fn from_pattern(expr: &Expr) -> Option<Schema> {
        if let Some(value) = scalar_literal(expr) {
            return Some(Schema::Literal(value));
        }
        match &expr.kind {
            ExprKind::IdLookup(name) if name == "_" => Some(Schema::Any(None)),
            ExprKind::IdLookup(name) if is_capture_name(name) => {
                Some(Schema::Any(Some(name.clone())))
            }
            ExprKind::SchemaCapture(name) => Some(Schema::Any(name.clone())),
            ExprKind::ArrayLiteral(items) | ExprKind::ArgsSchema(items) => Some(Schema::List(
                items
                    .iter()
                    .map(Schema::from_pattern)
                    .collect::<Option<_>>()?,
            )),
            ExprKind::ObjectLiteral(entries) => Some(Schema::Record(
                entries
                    .iter()
                    .map(|entry| match entry {
                        ObjectEntry::Pair { key, value } => {
                            Some((key.clone(), Schema::from_pattern(value)?))
                        }
                        ObjectEntry::Shorthand(key) => Some((
                            key.clone(),
                            Schema::Any(is_capture_name(key).then(|| key.clone())),
                        )),
                        ObjectEntry::Spread(_) => None,
                    })
                    .collect::<Option<_>>()?,
            )),
            ExprKind::SchemaObjectLiteral(entries) => Some(Schema::Record(
                entries
                    .iter()
                    .map(|entry| Some((entry.key.clone(), Schema::from_pattern(&entry.schema)?)))
                    .collect::<Option<_>>()?,
            )),
            ExprKind::SchemaUnion(items) => Some(Schema::Or(
                items
                    .iter()
                    .map(Schema::from_pattern)
                    .collect::<Option<_>>()?,
            )),
            ExprKind::SchemaIntersect(items) => items
                .iter()
                .map(Schema::from_pattern)
                .collect::<Option<Vec<_>>>()?
                .into_iter()
                .reduce(Schema::and),
            _ => None,
        }
    }

    /// Both schemas must hold. Two records merge into one, keys from `other`
    /// replacing keys from `self`.
    pub fn and(self, other: Schema) -> Schema {
        match (self, other) {
            (Schema::Record(mut fields), Schema::Record(more)) => {
                for (key, schema) in more {
                    match fields.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = schema,
                        None => fields.push((key, schema)),
                    }
                }
                Schema::Record(fields)
            }
            (Schema::And(mut items), Schema::And(more)) => {
                items.extend(more);
                Schema::And(items)
            }
            (Schema::And(mut items), other) => {
                items.push(other);
                Schema::And(items)
            }
            (first, other) => Schema::And(vec![first, other]),
        }
    }

    /// Either schema may hold.
    pub fn or(self, other: Schema) -> Schema {
        match self {
            Schema::Or(mut items) => {
                items.push(other);
                Schema::Or(items)
            }
            first => Schema::Or(vec![first, other]),
        }
    }

    /// Whether `value` matches.
    pub fn valid(&self, value: &Value) -> bool {
        match self {
            Schema::Any(_) => true,
            Schema::Literal(expected) => expected.loosely_equals(value),
            Schema::Record(fields) => {
                matches!(value, Value::Record(_))
                    && fields
                        .iter()
                        .all(|(key, schema)| value.get(key).is_some_and(|v| schema.valid(v)))
            }
            Schema::List(items) => match value {
                Value::List(values) => {
                    items.len() == values.len()
                        && items.iter().zip(values).all(|(s, v)| s.valid(v))
                }
                _ => false,
            },
            Schema::Or(options) => options.iter().any(|s| s.valid(value)),
            Schema::And(parts) => parts.iter().all(|s| s.valid(value)),
            Schema::Fn(predicate) => (predicate.test)(value),
        }
    }

    /// Conservative containment: `true` only if every value valid for
    /// `other` is certainly valid for `self`.
    pub fn subsumes(&self, other: &Schema) -> bool {
        match (self, other) {
            (Schema::Any(_), _) => true,
            (_, Schema::Literal(value)) => self.valid(value),
            (_, Schema::Or(options)) => options.iter().all(|o| self.subsumes(o)),
            (Schema::And(parts), _) => parts.iter().all(|p| p.subsumes(other)),
            (Schema::Record(fields), Schema::Record(theirs)) => fields.iter().all(|(key, schema)| {
                theirs
                    .iter()
                    .find(|(k, _)| k == key)
                    .is_some_and(|(_, s)| schema.subsumes(s))
            }),
            (Schema::List(items), Schema::List(theirs)) => {
                items.len() == theirs.len()
                    && items.iter().zip(theirs).all(|(a, b)| a.subsumes(b))
            }
            (Schema::Or(options), _) => options.iter().any(|o| o.subsumes(other)),
            (_, Schema::And(parts)) => parts.iter().any(|p| self.subsumes(p)),
            _ => false,
        }
    }
}

fn scalar_literal(expr: &Expr) -> Option<Value> {
    match &expr.kind {
        ExprKind::ArrayLiteral(_) | ExprKind::ObjectLiteral(_) => None,
        _ => Value::from_literal(expr),
    }
}

impl Path {
    /// Follow the path, `None` if a step does not exist.
    pub fn resolve<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.0.iter().try_fold(value, |current, step| match (step, current) {
            (PathStep::Key(key), _) => current.get(key),
            (PathStep::Index(i), Value::List(items)) => items.get(*i),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use crate::pattern::mark_pattern;

    fn expr(source: &str) -> Expr {
        let tokens = tokenize(source).unwrap();
        parse(&tokens, source).unwrap().remove(0)
    }

    fn record(fields: &[(&str, Value)]) -> Value {
        Value::Record(fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn test_for_value_is_total() {
        let values = [
            Value::Nil,
            Value::Bool(true),
            Value::Int(1),
            Value::Float(1.5),
            Value::Str("s".into()),
            Value::Sym("ok".into()),
            Value::List(vec![Value::Int(1), Value::List(vec![])]),
            record(&[("a", Value::Int(1))]),
        ];
        for value in &values {
            assert!(Schema::for_value(value).valid(value), "{value:?}");
        }
    }

    #[test]
    fn test_records_are_open() {
        let schema = Schema::Record(vec![("a".into(), Schema::Any(None))]);
        assert!(schema.valid(&record(&[("a", Value::Int(1)), ("b", Value::Int(2))])));
        assert!(!schema.valid(&record(&[("b", Value::Int(2))])));
    }

    #[test]
    fn test_lists_are_closed() {
        let schema = Schema::List(vec![Schema::Any(Some("a".into()))]);
        assert!(schema.valid(&Value::List(vec![Value::Int(1)])));
        assert!(!schema.valid(&Value::List(vec![Value::Int(1), Value::Int(2)])));
        assert!(!schema.valid(&Value::List(vec![])));
    }

    #[test]
    fn test_and_merges_records_with_later_keys_winning() {
        let first = Schema::Record(vec![
            ("a".into(), Schema::Literal(Value::Int(1))),
            ("b".into(), Schema::Any(None)),
        ]);
        let second = Schema::Record(vec![("a".into(), Schema::Literal(Value::Int(2)))]);
        let merged = first.and(second);
        let Schema::Record(fields) = &merged else {
            panic!("expected record");
        };
        assert_eq!(fields.len(), 2);
        assert!(merged.valid(&record(&[("a", Value::Int(2)), ("b", Value::Nil)])));
        assert!(!merged.valid(&record(&[("a", Value::Int(1)), ("b", Value::Nil)])));
    }

    #[test]
    fn test_destructuring_mismatch_is_invalid() {
        let pattern = expr("[a]");
        let value = Value::from_literal(&expr("[1, 2]")).unwrap();
        let schema = Schema::from_pattern(&pattern).unwrap();
        assert!(!schema.valid(&value));
    }

    #[test]
    fn test_from_pattern_marked_and_unmarked_agree() {
        let raw = expr("{name, tags: [_, 1]}");
        let marked = mark_pattern(&raw).unwrap();
        let value = Value::from_literal(&expr("{name: \"x\", tags: [:a, 1], extra: nil}")).unwrap();
        assert!(Schema::from_pattern(&raw).unwrap().valid(&value));
        assert!(Schema::from_pattern(&marked).unwrap().valid(&value));
    }

    #[test]
    fn test_schema_references_are_opaque() {
        assert!(Schema::from_pattern(&expr("User")).is_none());
        assert!(Schema::from_pattern(&expr("[a, Gt1]")).is_none());
    }

    #[test]
    fn test_numbers_compare_loosely() {
        assert!(Schema::Literal(Value::Int(1)).valid(&Value::Float(1.0)));
        assert!(!Schema::Literal(Value::Int(1)).valid(&Value::Str("1".into())));
    }

    #[test]
    fn test_subsumes() {
        let any = Schema::Any(Some("n".into()));
        let one = Schema::Literal(Value::Int(1));
        let pair = Schema::List(vec![Schema::Any(None), Schema::Any(None)]);
        let pair_of_ones = Schema::List(vec![one.clone(), one.clone()]);
        assert!(any.subsumes(&one));
        assert!(!one.subsumes(&any));
        assert!(pair.subsumes(&pair_of_ones));
        assert!(!pair_of_ones.subsumes(&pair));
        assert!(one.clone().or(Schema::Literal(Value::Int(2))).subsumes(&one));

        let even = Schema::Fn(Predicate::new("even", |v| matches!(v, Value::Int(n) if n % 2 == 0)));
        assert!(even.subsumes(&Schema::Literal(Value::Int(4))));
        assert!(!even.subsumes(&any));
    }

    #[test]
    fn test_path_resolve() {
        let value = Value::from_literal(&expr("{a: [1, {b: :x}]}")).unwrap();
        let path = Path::new(vec![
            PathStep::Key("a".into()),
            PathStep::Index(1),
            PathStep::Key("b".into()),
        ]);
        assert_eq!(path.resolve(&value), Some(&Value::Sym("x".into())));
        assert_eq!(Path::new(vec![PathStep::Index(0)]).resolve(&value), None);
    }
}
