//! Recursive condition-document-to-matcher-tree compiler. A
//! recursive-descent compiler that dispatches on [`crate::value::Kind`]
//! and builds a tree of [`crate::matcher::MatcherNode`]s.

pub mod operators;
pub(crate) mod priority;

use crate::arena::Arena;
use crate::error::ErrorKind;
use crate::matcher::{LeafKind, MatcherNode, Semantics};
use crate::registry::{ExternCtx, Registry};
use crate::value::{Kind, Table, Value};

/// `compile(arena, condition, extern_ctx) -> matcher | null`, the single
/// entry point for turning a condition document into a matcher.
/// Equivalent to `table_condition` applied to the top-level condition.
pub fn compile<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    condition: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    table_condition(arena, registry, condition, ctx)
}

/// Precondition: `cond.kind == Table`.
pub(crate) fn table_condition<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    let entries = compile_table_entries(arena, registry, &cond, ctx)?;
    Some(wrap_and(arena, registry, entries, 0.0, ctx))
}

/// The per-key dispatch table_condition performs, exposed separately so
/// `$and`'s flattening and `$elemMatch`/`$every`'s "compile as And of its
/// entries" can reuse it without an extra wrapping layer.
pub(crate) fn compile_table_entries<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    cond: &Value<'a>,
    ctx: ExternCtx,
) -> Option<Vec<&'a MatcherNode<'a>>> {
    let table = match cond.as_table() {
        Some(t) => t,
        None => {
            arena.set_error(ErrorKind::InvalidType, "table_condition requires a table condition");
            tracing::warn!("compile: condition was not a table");
            return None;
        }
    };
    let _span = tracing::debug_span!("table_condition", keys = table.len()).entered();
    let mut children = Vec::with_capacity(table.len());
    for (key, sub) in table.iter() {
        let child = if key.starts_with('$') {
            if let Some(compiler) = registry.lookup_operator(key) {
                compiler(registry, arena, sub, ctx)?
            } else if registry.custom_lookup(key) {
                build_custom(arena, registry, key, sub, ctx)
            } else {
                field(arena, registry, key, sub, ctx)?
            }
        } else {
            field(arena, registry, key, sub, ctx)?
        };
        children.push(child);
    }
    Some(children)
}

fn build_custom<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    key: &str,
    sub: Value<'a>,
    ctx: ExternCtx,
) -> &'a MatcherNode<'a> {
    let (name, external) = registry
        .custom_build(key, &sub, ctx)
        .unwrap_or(("custom", std::ptr::null()));
    crate::matcher::new_leaf(
        arena,
        registry,
        name,
        sub.clone(),
        20.0,
        ctx,
        LeafKind::Custom { name, external },
    )
}

/// Builds a Field node wrapping `literal(arena, sub, ctx)`.
pub(crate) fn field<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    key: &'a str,
    sub: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    let lit = literal(arena, registry, sub.clone(), ctx)?;
    Some(crate::matcher::new_field(arena, registry, key, sub, lit.priority, ctx, lit))
}

/// Chooses a delegate by the kind of `cond` and wraps it in a
/// Literal node whose `array_record` slot is populated lazily (see
/// [`build_array_record`]) the first time it is asked to match an
/// array-valued input.
pub(crate) fn literal<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> Option<&'a MatcherNode<'a>> {
    let delegate = match cond.kind() {
        Kind::Table => table_condition(arena, registry, cond.clone(), ctx)?,
        Kind::Regex => regex_leaf(arena, registry, cond.clone(), ctx),
        Kind::Null => {
            let eq_null = operators::compile_eq(registry, arena, Value::Null, ctx)?;
            let exists_false = operators::compile_exists(registry, arena, Value::Bool(false), ctx)?;
            let priority = eq_null.priority + exists_false.priority;
            let children = arena.alloc_slice_copy(&[eq_null, exists_false]);
            crate::matcher::new_composite(
                arena,
                registry,
                "Or",
                Value::Null,
                priority,
                ctx,
                Semantics::Or,
                children,
            )
        }
        _ => operators::compile_eq(registry, arena, cond.clone(), ctx)?,
    };
    Some(crate::matcher::new_literal(arena, registry, cond, delegate.priority, ctx, delegate))
}

/// Builds the array-input specialization for a literal, dispatching on
/// the kind of the *original* condition rather than the compiled
/// delegate.
pub(crate) fn build_array_record<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    source: &Value<'a>,
    ctx: ExternCtx,
) -> &'a MatcherNode<'a> {
    match source.kind() {
        Kind::Table => array_record_for_table(arena, registry, source, ctx),
        Kind::Array => {
            let whole_eq = operators::compile_eq(registry, arena, source.clone(), ctx)
                .unwrap_or_else(|| crate::matcher::new_leaf(
                    arena, registry, "$eq", source.clone(), 1.0, ctx, LeafKind::Eq(source.clone()),
                ));
            let elem_eq = operators::compile_eq(registry, arena, source.clone(), ctx)
                .unwrap_or_else(|| crate::matcher::new_leaf(
                    arena, registry, "$eq", source.clone(), 1.0, ctx, LeafKind::Eq(source.clone()),
                ));
            let elem_match = single_child_composite(
                arena,
                registry,
                "$elemMatch",
                source.clone(),
                Semantics::ElemMatch,
                elem_eq,
                ctx,
            );
            wrap_or(arena, registry, vec![whole_eq, elem_match], 0.0, ctx)
        }
        Kind::Regex => {
            let regex_node = regex_leaf(arena, registry, source.clone(), ctx);
            single_child_composite(
                arena,
                registry,
                "$elemMatch",
                source.clone(),
                Semantics::ElemMatch,
                regex_node,
                ctx,
            )
        }
        _ => {
            let eq_node = operators::compile_eq(registry, arena, source.clone(), ctx)
                .unwrap_or_else(|| crate::matcher::new_leaf(
                    arena, registry, "$eq", source.clone(), 1.0, ctx, LeafKind::Eq(source.clone()),
                ));
            single_child_composite(
                arena,
                registry,
                "$elemMatch",
                source.clone(),
                Semantics::ElemMatch,
                eq_node,
                ctx,
            )
        }
    }
}

fn single_child_composite<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    name: &'static str,
    condition: Value<'a>,
    semantics: Semantics,
    child: &'a MatcherNode<'a>,
    ctx: ExternCtx,
) -> &'a MatcherNode<'a> {
    let children = arena.alloc_slice_copy(&[child]);
    crate::matcher::new_composite(arena, registry, name, condition, 3.0 + child.priority, ctx, semantics, children)
}

/// The array-record Table branch: partitions `cond`'s entries into a "direct"
/// table (operators other than `$elemMatch`, and integer-parseable
/// keys) and an "element" table (everything else, plus any `$elemMatch`
/// value's own entries), then reattaches the element bucket as a nested
/// `$elemMatch` before compiling the result as an ordinary table
/// condition.
fn array_record_for_table<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    source: &Value<'a>,
    ctx: ExternCtx,
) -> &'a MatcherNode<'a> {
    let Some(cond_table) = source.as_table() else {
        return always_false(arena, registry);
    };
    let direct = Table::new(arena);
    let element = Table::new(arena);
    for (key, val) in cond_table.iter() {
        if key == "$elemMatch" {
            if let Value::Table(inner) = &val {
                for (k2, v2) in inner.iter() {
                    element.insert(k2, v2);
                }
            }
        } else if key.starts_with('$') || key.parse::<i64>().is_ok() {
            direct.insert(key, val);
        } else {
            element.insert(key, val);
        }
    }
    if !element.is_empty() {
        let element_ref = arena.alloc(element);
        direct.insert("$elemMatch", Value::Table(element_ref));
    }
    let direct_ref = arena.alloc(direct);
    table_condition(arena, registry, Value::Table(direct_ref), ctx)
        .unwrap_or_else(|| always_false(arena, registry))
}

/// Wraps the pattern value as `Value::Regex` if it isn't already, and
/// builds the `$regex` leaf.
pub(crate) fn regex_leaf<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    cond: Value<'a>,
    ctx: ExternCtx,
) -> &'a MatcherNode<'a> {
    let pattern = match cond {
        Value::Regex(_) => cond,
        other => Value::Regex(arena.alloc(other)),
    };
    crate::matcher::new_leaf(arena, registry, "$regex", pattern.clone(), 20.0, ctx, LeafKind::Regex(pattern))
}

/// Empty → `always_true`; one child → returned directly; otherwise an
/// And composite whose children are priority-sorted. `base` is added to
/// the sum of children's priorities (`2.0` for the `$and` operator,
/// `0.0` for the implicit per-table And).
pub(crate) fn wrap_and<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    mut children: Vec<&'a MatcherNode<'a>>,
    base: f64,
    ctx: ExternCtx,
) -> &'a MatcherNode<'a> {
    if children.is_empty() {
        return always_true(arena, registry);
    }
    priority::sort_by_priority(&mut children);
    if children.len() == 1 {
        return children[0];
    }
    let priority = base + children.iter().map(|c| c.priority).sum::<f64>();
    let slice = arena.alloc_slice_copy(&children);
    crate::matcher::new_composite(arena, registry, "And", Value::Null, priority, ctx, Semantics::And, slice)
}

/// As [`wrap_and`] but empty → `always_false`, semantics `Or`.
pub(crate) fn wrap_or<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    mut children: Vec<&'a MatcherNode<'a>>,
    base: f64,
    ctx: ExternCtx,
) -> &'a MatcherNode<'a> {
    if children.is_empty() {
        return always_false(arena, registry);
    }
    priority::sort_by_priority(&mut children);
    if children.len() == 1 {
        return children[0];
    }
    let priority = base + children.iter().map(|c| c.priority).sum::<f64>();
    let slice = arena.alloc_slice_copy(&children);
    crate::matcher::new_composite(arena, registry, "Or", Value::Null, priority, ctx, Semantics::Or, slice)
}

pub(crate) fn always_true<'a>(arena: &'a Arena, registry: &'a Registry) -> &'a MatcherNode<'a> {
    crate::matcher::new_leaf(
        arena,
        registry,
        "AlwaysTrue",
        Value::Bool(true),
        1.0,
        ExternCtx::NONE,
        LeafKind::AlwaysTrue,
    )
}

pub(crate) fn always_false<'a>(arena: &'a Arena, registry: &'a Registry) -> &'a MatcherNode<'a> {
    crate::matcher::new_leaf(
        arena,
        registry,
        "AlwaysFalse",
        Value::Bool(false),
        1.0,
        ExternCtx::NONE,
        LeafKind::AlwaysFalse,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Array, Value};

    #[test]
    fn empty_condition_is_always_true() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        let table = Table::new(&arena);
        let node = compile(&arena, &registry, Value::Table(arena.alloc(table)), ExternCtx::NONE).unwrap();
        assert!(node.matches(Some(Value::Int(1))));
        assert!(node.matches(None));
    }

    #[test]
    fn simple_field_condition() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        let table = Table::new(&arena);
        table.insert("age", Value::Int(18));
        let node = compile(&arena, &registry, Value::Table(arena.alloc(table)), ExternCtx::NONE).unwrap();

        let doc = Table::new(&arena);
        doc.insert("age", Value::Int(18));
        assert!(node.matches(Some(Value::Table(arena.alloc(doc)))));

        let other = Table::new(&arena);
        other.insert("age", Value::Int(19));
        assert!(!node.matches(Some(Value::Table(arena.alloc(other)))));
    }

    #[test]
    fn implicit_array_elem_match() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        let table = Table::new(&arena);
        table.insert("tags", Value::Str("red"));
        let node = compile(&arena, &registry, Value::Table(arena.alloc(table)), ExternCtx::NONE).unwrap();

        let tags = Array::new(&arena);
        tags.push(Value::Str("red"));
        tags.push(Value::Str("blue"));
        let doc = Table::new(&arena);
        doc.insert("tags", Value::Array(arena.alloc(tags)));
        assert!(node.matches(Some(Value::Table(arena.alloc(doc)))));

        let tags2 = Array::new(&arena);
        tags2.push(Value::Str("green"));
        let doc2 = Table::new(&arena);
        doc2.insert("tags", Value::Array(arena.alloc(tags2)));
        assert!(!node.matches(Some(Value::Table(arena.alloc(doc2)))));
    }

    #[test]
    fn invalid_type_sets_arena_error() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        let node = compile(&arena, &registry, Value::Int(1), ExternCtx::NONE);
        assert!(node.is_none());
        assert!(arena.error().is_some());
    }
}
