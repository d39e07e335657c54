//! The JavaScript runtime generated code runs against.
//!
//! Compiled programs call into it by name: `Schema.for`, `Schema.valid_q`,
//! `MatchError.new`, `Range.new`, `__peacock_equals` and the `__plus__`-style
//! operator methods.
//! These names must stay stable for already compiled programs to keep working.

/// Operators, `Range`, `MatchError` and `print`.
pub const STD: &str = include_str!("std.js");

/// `Schema` and the built-in schemas (`Int`, `Str`, ...).
pub const SCHEMA: &str = include_str!("schema.js");

/// The full runtime, in load order.
pub const RUNTIME: &str = concat!(include_str!("std.js"), "\n", include_str!("schema.js"));

/// Names the generated code expects the runtime to define.
pub const EXPORTED_NAMES: &[&str] = &[
    "Schema",
    "MatchError",
    "Range",
    "print",
    "__peacock_equals",
    "Any",
    "Num",
    "Int",
    "Float",
    "Str",
    "Bool",
    "Sym",
    "List",
    "Record",
];

/// Runtime text followed by `code`.
#[must_use]
pub fn bundle(code: &str) -> String {
    let mut out = String::with_capacity(RUNTIME.len() + code.len() + 1);
    out.push_str(RUNTIME);
    if !RUNTIME.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(code);
    out
}
