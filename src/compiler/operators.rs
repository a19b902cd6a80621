//! The 17 builtin `$operator` compilers, one per row of `spec.md`
//! §4.4.5. Each has the [`crate::registry::OperatorCompiler`] signature;
//! `Registry::with_builtins` wires the `$name -> fn` table from this
//! module, the same shape as the teacher's `seq-compiler::builtins`
//! opcode table.
//!
//! All validate their condition's shape and, on mismatch, write an
//! `InvalidType`/`InvalidArgument` record to the arena's error slot and
//! return `None`, per §4.4.7.

use crate::arena::Arena;
use crate::error::ErrorKind;
use crate::matcher::{LeafKind, MatcherNode, Semantics};
use crate::registry::{ExternCtx, Registry};
use crate::value::Value;

use super::{compile_table_entries, literal, regex_leaf, wrap_and, wrap_or};

fn invalid_type<'a>(arena: &'a Arena, op: &str, expected: &str) -> Option<&'a MatcherNode<'a>> {
    arena.set_error(
        ErrorKind::InvalidType,
        format!("{op} requires a {expected} condition"),
    );
    tracing::warn!(operator = op, expected, "compile: rejected condition shape");
    None
}

pub fn compile_eq<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    Some(crate::matcher::new_leaf(arena, registry, "$eq", cond.clone(), 1.0, ctx, LeafKind::Eq(cond)))
}

pub fn compile_ne<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    Some(crate::matcher::new_leaf(arena, registry, "$ne", cond.clone(), 1.0, ctx, LeafKind::Ne(cond)))
}

pub fn compile_gt<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    Some(crate::matcher::new_leaf(arena, registry, "$gt", cond.clone(), 2.0, ctx, LeafKind::Gt(cond)))
}

pub fn compile_gte<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    Some(crate::matcher::new_leaf(arena, registry, "$gte", cond.clone(), 2.0, ctx, LeafKind::Gte(cond)))
}

pub fn compile_lt<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    Some(crate::matcher::new_leaf(arena, registry, "$lt", cond.clone(), 2.0, ctx, LeafKind::Lt(cond)))
}

pub fn compile_lte<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    Some(crate::matcher::new_leaf(arena, registry, "$lte", cond.clone(), 2.0, ctx, LeafKind::Lte(cond)))
}

/// `1 + log_1.5(|cond| + 1)`, so larger inclusion sets sort later.
fn inclusion_priority(len: usize) -> f64 {
    1.0 + (len as f64 + 1.0).ln() / 1.5f64.ln()
}

pub fn compile_in<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    let Some(arr) = cond.as_array() else {
        return invalid_type(arena, "$in", "array");
    };
    let priority = inclusion_priority(arr.len());
    Some(crate::matcher::new_leaf(arena, registry, "$in", cond, priority, ctx, LeafKind::In(arr)))
}

pub fn compile_nin<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    let Some(arr) = cond.as_array() else {
        return invalid_type(arena, "$nin", "array");
    };
    let priority = inclusion_priority(arr.len());
    Some(crate::matcher::new_leaf(arena, registry, "$nin", cond, priority, ctx, LeafKind::Nin(arr)))
}

fn as_bool<'a>(arena: &'a Arena, op: &str, cond: &Value<'a>) -> Option<bool> {
    match cond {
        Value::Bool(b) => Some(*b),
        _ => {
            arena.set_error(ErrorKind::InvalidType, format!("{op} requires a boolean condition"));
            None
        }
    }
}

pub fn compile_exists<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    let want = as_bool(arena, "$exists", &cond)?;
    Some(crate::matcher::new_leaf(arena, registry, "$exists", cond, 2.0, ctx, LeafKind::Exists(want)))
}

pub fn compile_present<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    let want = as_bool(arena, "$present", &cond)?;
    Some(crate::matcher::new_leaf(arena, registry, "$present", cond, 2.0, ctx, LeafKind::Present(want)))
}

pub fn compile_regex<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    match cond.kind() {
        crate::value::Kind::Str | crate::value::Kind::Regex => {
            Some(regex_leaf(arena, registry, cond, ctx))
        }
        _ => invalid_type(arena, "$regex", "string or regex"),
    }
}

pub fn compile_and<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    let Some(arr) = cond.as_array() else {
        return invalid_type(arena, "$and", "array of tables");
    };
    let mut flattened = Vec::new();
    for item in arr.iter() {
        flattened.extend(compile_table_entries(arena, registry, &item, ctx)?);
    }
    Some(wrap_and(arena, registry, flattened, 2.0, ctx))
}

pub fn compile_or<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    let Some(arr) = cond.as_array() else {
        return invalid_type(arena, "$or", "array of tables");
    };
    let mut children = Vec::with_capacity(arr.len());
    for item in arr.iter() {
        children.push(super::table_condition(arena, registry, item, ctx)?);
    }
    Some(wrap_or(arena, registry, children, 2.0, ctx))
}

fn compile_grouped<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
    name: &'static str,
    op: &str,
    semantics: Semantics,
) -> Option<&'a MatcherNode<'a>> {
    if cond.as_table().is_none() {
        return invalid_type(arena, op, "table");
    }
    let mut entries = compile_table_entries(arena, registry, &cond, ctx)?;
    crate::compiler::priority::sort_by_priority(&mut entries);
    let priority = 3.0 + entries.iter().map(|c| c.priority).sum::<f64>();
    let children = arena.alloc_slice_copy(&entries);
    Some(crate::matcher::new_composite(arena, registry, name, cond, priority, ctx, semantics, children))
}

pub fn compile_elem_match<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    compile_grouped(registry, arena, cond, ctx, "$elemMatch", "$elemMatch", Semantics::ElemMatch)
}

pub fn compile_every<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    compile_grouped(registry, arena, cond, ctx, "$every", "$every", Semantics::Every)
}

pub fn compile_not<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    let delegate = literal(arena, registry, cond.clone(), ctx)?;
    let priority = 1.0 + delegate.priority;
    Some(crate::matcher::new_leaf(arena, registry, "$not", cond, priority, ctx, LeafKind::Not(delegate)))
}

pub fn compile_size<'a>(
    registry: &Registry,
    arena: &'a Arena,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    let delegate = literal(arena, registry, cond.clone(), ctx)?;
    let priority = 1.0 + delegate.priority;
    Some(crate::matcher::new_leaf(arena, registry, "$size", cond, priority, ctx, LeafKind::Size(delegate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Array;

    #[test]
    fn in_rejects_non_array() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        assert!(compile_in(&registry, &arena, Value::Int(1), ExternCtx::NONE).is_none());
        assert!(arena.error().is_some());
    }

    #[test]
    fn in_empty_matches_nothing_nin_matches_everything() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        let empty = Array::new(&arena);
        let in_node = compile_in(&registry, &arena, Value::Array(arena.alloc(empty)), ExternCtx::NONE).unwrap();
        assert!(!in_node.matches(Some(Value::Int(1))));

        let empty2 = Array::new(&arena);
        let nin_node = compile_nin(&registry, &arena, Value::Array(arena.alloc(empty2)), ExternCtx::NONE).unwrap();
        assert!(nin_node.matches(Some(Value::Int(1))));
        assert!(nin_node.matches(None));
    }

    #[test]
    fn size_matches_array_length() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        let node = compile_size(&registry, &arena, Value::Int(2), ExternCtx::NONE).unwrap();
        let arr = Array::new(&arena);
        arr.push(Value::Int(1));
        arr.push(Value::Int(2));
        assert!(node.matches(Some(Value::Array(arena.alloc(arr)))));
    }
}
