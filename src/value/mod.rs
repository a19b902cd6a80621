//! Tagged-union document value, shared by the compiler (conditions) and
//! the evaluator (records), plus its comparison and stringification
//! operations.
//!
//! A document value is one of null, bool, int, float, string, an arena
//! table, an arena array, a regex, a pointer (field-path substitution),
//! or an opaque foreign handle. Stringification renders a compact
//! JSON-ish format: strings quoted, tables as `{k: v, ...}`, arrays as
//! `[v, ...]`.

pub mod array;
pub mod table;

use std::fmt::Write as _;

pub use array::{Array, ForeignArraySource};
pub use table::{ForeignTableSource, Table};

use crate::arena::Arena;
use crate::registry::Registry;

/// The kind discriminant of a [`Value`]. Kept alongside the enum itself
/// (rather than derived only by pattern match) because explain/trace and
/// the compiler frequently need to ask "what kind is this" without
/// destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Int64,
    Double,
    Str,
    Array,
    Table,
    Regex,
    Pointer,
    Opaque,
}

/// A document value. References (but does not own) exactly one arena;
/// every `Str`/`Array`/`Table` it transitively reaches must live in the
/// same or a longer-lived arena than `self`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(&'a str),
    Array(&'a Array<'a>),
    Table(&'a Table<'a>),
    /// Wraps the pattern sub-value (typically `Str`); matching and
    /// stringification are delegated to the registered regex adapter.
    Regex(&'a Value<'a>),
    Pointer(*const ()),
    Opaque(*const ()),
}

/// Four-arm comparison result: two values can be `Less`/`Equal`/`Greater`
/// or, across incompatible kinds, simply `Incomparable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Less,
    Equal,
    Greater,
    Incomparable,
}

impl CompareResult {
    pub fn is_equal(self) -> bool {
        matches!(self, CompareResult::Equal)
    }

    pub fn from_ordering(ord: std::cmp::Ordering) -> Self {
        match ord {
            std::cmp::Ordering::Less => CompareResult::Less,
            std::cmp::Ordering::Equal => CompareResult::Equal,
            std::cmp::Ordering::Greater => CompareResult::Greater,
        }
    }
}

impl<'a> Value<'a> {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int64,
            Value::Double(_) => Kind::Double,
            Value::Str(_) => Kind::Str,
            Value::Array(_) => Kind::Array,
            Value::Table(_) => Kind::Table,
            Value::Regex(_) => Kind::Regex,
            Value::Pointer(_) => Kind::Pointer,
            Value::Opaque(_) => Kind::Opaque,
        }
    }

    pub fn as_array(&self) -> Option<&'a Array<'a>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&'a Table<'a>> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// `compare(a, b)`: total within numeric kinds and strings, with
    /// Int/Double promotion to Double; arrays compare by length first
    /// (shorter is always less) and lexicographically within equal
    /// lengths; tables, regex, pointer, and opaque are incomparable.
    pub fn compare(&self, other: &Value<'a>) -> CompareResult {
        use Value::*;
        match (self, other) {
            (Null, Null) => CompareResult::Equal,
            (Bool(a), Bool(b)) => CompareResult::from_ordering(a.cmp(b)),
            (Str(a), Str(b)) => CompareResult::from_ordering(a.cmp(b)),
            (Int(a), Int(b)) => CompareResult::from_ordering(a.cmp(b)),
            (Double(_) | Int(_), Double(_) | Int(_)) => {
                let a = self.as_f64().unwrap();
                let b = other.as_f64().unwrap();
                match a.partial_cmp(&b) {
                    Some(ord) => CompareResult::from_ordering(ord),
                    None => CompareResult::Incomparable,
                }
            }
            (Array(a), Array(b)) => compare_arrays(a, b),
            _ => CompareResult::Incomparable,
        }
    }

    /// JSON-ish stringification, allocated into `arena`. Regex delegates
    /// to the registered adapter's stringifier; pointers render as
    /// opaque hex.
    pub fn to_str(&self, arena: &'a Arena, registry: &Registry) -> &'a str {
        let mut buf = String::new();
        write_value(self, registry, arena, &mut buf);
        arena.alloc_str(&buf)
    }
}

/// Convenience `Display` impl for ad-hoc debugging/logging: renders the
/// same JSON-ish shape as [`Value::to_str`] but without a registry to
/// consult, so `Regex` values print as the default `"//"` rather than
/// through the adapter's stringifier. Prefer `to_str` wherever the
/// registry-accurate rendering matters (explain/trace always do).
impl std::fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buf = String::new();
        write_value_plain(self, &mut buf);
        f.write_str(&buf)
    }
}

fn write_value_plain(value: &Value<'_>, buf: &mut String) {
    match value {
        Value::Regex(_) => buf.push_str("//"),
        Value::Array(arr) => {
            buf.push('[');
            for (i, item) in arr.iter().into_iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_value_plain(&item, buf);
            }
            buf.push(']');
        }
        Value::Table(table) => {
            buf.push('{');
            for (i, (key, val)) in table.iter().into_iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_quoted_string(key, buf);
                buf.push(':');
                write_value_plain(&val, buf);
            }
            buf.push('}');
        }
        other => write_value_scalar(other, buf),
    }
}

/// Shared by both `write_value` (registry-aware) and `write_value_plain`
/// (`Display`) for the kinds whose rendering never depends on the
/// registry.
fn write_value_scalar(value: &Value<'_>, buf: &mut String) {
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => {
            let _ = write!(buf, "{i}");
        }
        Value::Double(d) => {
            let _ = write!(buf, "{d:.6}");
        }
        Value::Str(s) => write_quoted_string(s, buf),
        Value::Pointer(p) | Value::Opaque(p) => {
            let _ = write!(buf, "0x{:x}", *p as usize);
        }
        _ => unreachable!("compound/registry-dependent kinds handled by caller"),
    }
}

fn compare_arrays<'a>(a: &Array<'a>, b: &Array<'a>) -> CompareResult {
    let (la, lb) = (a.len(), b.len());
    if la != lb {
        return CompareResult::from_ordering(la.cmp(&lb));
    }
    for i in 0..la {
        let (av, bv) = (a.get(i), b.get(i));
        match (av, bv) {
            (None, None) => continue,
            (Some(Value::Null), Some(Value::Null)) => continue,
            (Some(x), Some(y)) => match x.compare(&y) {
                CompareResult::Equal => continue,
                other @ (CompareResult::Less | CompareResult::Greater) => return other,
                CompareResult::Incomparable => return CompareResult::Incomparable,
            },
            _ => return CompareResult::Incomparable,
        }
    }
    CompareResult::Equal
}

fn write_value<'a>(value: &Value<'a>, registry: &Registry, arena: &'a Arena, buf: &mut String) {
    match value {
        Value::Array(arr) => {
            buf.push('[');
            for (i, item) in arr.iter().into_iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_value(&item, registry, arena, buf);
            }
            buf.push(']');
        }
        Value::Table(table) => {
            buf.push('{');
            for (i, (key, val)) in table.iter().into_iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_quoted_string(key, buf);
                buf.push(':');
                write_value(&val, registry, arena, buf);
            }
            buf.push('}');
        }
        Value::Regex(pattern) => {
            buf.push_str(registry.regex_stringify(arena, pattern));
        }
        other => write_value_scalar(other, buf),
    }
}

fn write_quoted_string(s: &str, buf: &mut String) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(buf, "\\u{:04x}", c as u32);
            }
            c => buf.push(c),
        }
    }
    buf.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn self_compare_is_equal() {
        assert!(Value::Int(5).compare(&Value::Int(5)).is_equal());
        assert!(Value::Str("a").compare(&Value::Str("a")).is_equal());
    }

    #[test]
    fn int_double_promotion() {
        assert!(Value::Int(5).compare(&Value::Double(5.0)).is_equal());
        assert_eq!(
            Value::Int(4).compare(&Value::Double(5.0)),
            CompareResult::Less
        );
    }

    #[test]
    fn cross_kind_incomparable() {
        assert_eq!(
            Value::Int(1).compare(&Value::Str("1")),
            CompareResult::Incomparable
        );
    }

    #[test]
    fn array_length_then_lexicographic() {
        let arena = Arena::new();
        let short = Array::new(&arena);
        short.push(Value::Int(9));
        let long = Array::new(&arena);
        long.push(Value::Int(1));
        long.push(Value::Int(1));
        // longer array is greater regardless of elements.
        assert_eq!(
            Value::Array(&short).compare(&Value::Array(&long)),
            CompareResult::Less
        );
    }

    #[test]
    fn to_str_basic_kinds() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        assert_eq!(Value::Null.to_str(&arena, &registry), "null");
        assert_eq!(Value::Bool(true).to_str(&arena, &registry), "true");
        assert_eq!(Value::Int(42).to_str(&arena, &registry), "42");
        assert_eq!(Value::Str("hi").to_str(&arena, &registry), "\"hi\"");
    }

    #[test]
    fn display_matches_to_str_for_registry_independent_kinds() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        let v = Value::Int(42);
        assert_eq!(v.to_string(), v.to_str(&arena, &registry));
        let s = Value::Str("hi");
        assert_eq!(s.to_string(), s.to_str(&arena, &registry));
    }

    #[test]
    fn display_renders_default_regex_marker() {
        let pattern = Value::Str("^a");
        let regex = Value::Regex(&pattern);
        assert_eq!(regex.to_string(), "//");
    }
}
