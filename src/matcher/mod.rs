//! Matcher evaluator: the tree of typed nodes produced by
//! [`crate::compiler::compile`], each implementing `match(value) -> bool`
//! plus the shared `traverse` walk that powers explain and trace.
//!
//! Each node carries a tagged [`MatcherKind`] dispatched by a `match`
//! expression rather than a per-node function pointer. Trace enable and
//! disable is a `traced` flag checked inline by [`evaluate`].

use std::cell::{Cell, OnceCell, RefCell};

use crate::arena::Arena;
use crate::registry::{ExternCtx, Registry};
use crate::value::{Array, CompareResult, Value};

type BVec<'a, T> = bumpalo::collections::Vec<'a, T>;

/// Selects And/Or/ElemMatch/Every semantics for a [`MatcherKind::Composite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantics {
    And,
    Or,
    ElemMatch,
    Every,
}

/// One recorded match outcome, allocated into the trace session's
/// scratch arena.
pub struct TraceRecord<'a> {
    pub level: usize,
    pub message: &'a str,
}

struct TraceState<'a> {
    stack: &'a RefCell<BVec<'a, TraceRecord<'a>>>,
    scratch: &'a Arena,
}

/// Scalar/inclusion/existence/regex/custom leaves with no children.
pub enum LeafKind<'a> {
    Eq(Value<'a>),
    Ne(Value<'a>),
    Gt(Value<'a>),
    Gte(Value<'a>),
    Lt(Value<'a>),
    Lte(Value<'a>),
    In(&'a Array<'a>),
    Nin(&'a Array<'a>),
    Exists(bool),
    Present(bool),
    Regex(Value<'a>),
    Not(&'a MatcherNode<'a>),
    /// Delegate matcher compiled from the `$size` condition, evaluated
    /// against the extracted array length wrapped as `Value::Int`.
    Size(&'a MatcherNode<'a>),
    Custom {
        name: &'static str,
        external: *const (),
    },
    AlwaysTrue,
    AlwaysFalse,
}

/// Variant-specific payload of a [`MatcherNode`].
pub enum MatcherKind<'a> {
    Composite {
        semantics: Semantics,
        children: &'a [&'a MatcherNode<'a>],
    },
    /// The scalar-path evaluator (`delegate`) plus the array-input
    /// specialization, built lazily the first time this node is asked
    /// to match an array-valued input and pinned to the *compilation*
    /// arena rather than whatever scratch arena the triggering `match`
    /// call happens to use.
    Literal {
        delegate: &'a MatcherNode<'a>,
        array_record: OnceCell<&'a MatcherNode<'a>>,
        source: Value<'a>,
        ctx: ExternCtx,
    },
    Field {
        field: &'a str,
        literal: &'a MatcherNode<'a>,
    },
    Leaf(LeafKind<'a>),
}

/// A compiled matcher node. Immutable after compilation except for the
/// lazy `array_record` build and trace enable/disable.
pub struct MatcherNode<'a> {
    pub name: &'static str,
    pub condition: Value<'a>,
    pub priority: f64,
    pub extern_ctx: ExternCtx,
    kind: MatcherKind<'a>,
    registry: &'a Registry,
    arena: &'a Arena,
    traced: Cell<bool>,
    trace_stack: RefCell<Option<TraceState<'a>>>,
    trace_level: Cell<usize>,
}

impl<'a> MatcherNode<'a> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &MatcherKind<'a> {
        &self.kind
    }

    pub fn is_traced(&self) -> bool {
        self.traced.get()
    }

    pub(crate) fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// `match(node, value)`: pure, non-blocking, allocation-free outside
    /// the lazy `array_record` build. `value` may be absent (`None`).
    pub fn matches(&'a self, value: Option<Value<'a>>) -> bool {
        evaluate(self, value)
    }
}

fn evaluate<'a>(node: &'a MatcherNode<'a>, value: Option<Value<'a>>) -> bool {
    if node.traced.get() {
        // Reserve this node's slot *before* descending into children, so
        // the flat stack comes out in pre-order (parent before its whole
        // subtree) rather than post-order. The slot is filled in once the
        // result is known, but its position in the stack is fixed here.
        let slot = reserve_trace_slot(node);
        let result = evaluate_inner(node, value.clone());
        if let Some(idx) = slot {
            fill_trace_slot(node, idx, &value, result);
        }
        result
    } else {
        evaluate_inner(node, value)
    }
}

fn evaluate_inner<'a>(node: &'a MatcherNode<'a>, value: Option<Value<'a>>) -> bool {
    match &node.kind {
        MatcherKind::Composite { semantics, children } => match semantics {
            Semantics::And => children.iter().all(|c| c.matches(value.clone())),
            Semantics::Or => children.iter().any(|c| c.matches(value.clone())),
            Semantics::ElemMatch => elem_match(children, &value, false),
            Semantics::Every => elem_match(children, &value, true),
        },
        MatcherKind::Literal {
            delegate,
            array_record,
            source,
            ctx,
        } => match &value {
            Some(Value::Array(_)) => {
                let array_record = array_record.get_or_init(|| {
                    crate::compiler::build_array_record(node.arena, node.registry, source, *ctx)
                });
                array_record.matches(value)
            }
            _ => delegate.matches(value),
        },
        MatcherKind::Field { field, literal } => match extract_field(node, field, &value) {
            FieldExtract::Value(sub) => literal.matches(sub),
            FieldExtract::Forced(result) => result,
        },
        MatcherKind::Leaf(leaf) => match_leaf(node, leaf, &value),
    }
}

fn elem_match<'a>(
    children: &'a [&'a MatcherNode<'a>],
    value: &Option<Value<'a>>,
    require_all: bool,
) -> bool {
    let arr = match value {
        Some(Value::Array(a)) => *a,
        _ => return false,
    };
    if arr.is_empty() {
        return false;
    }
    let satisfies = |elem: Value<'a>| children.iter().all(|c| c.matches(Some(elem.clone())));
    if require_all {
        (0..arr.len()).all(|i| arr.get(i).map(satisfies).unwrap_or(false))
    } else {
        (0..arr.len()).any(|i| arr.get(i).map(satisfies).unwrap_or(false))
    }
}

/// Result of extracting a Field node's sub-value. `Value` carries an
/// ordinary (possibly absent) sub-value on to the wrapped literal;
/// `Forced` short-circuits the whole Field match to a fixed result
/// without consulting the literal at all — used where `spec.md` §4.4.2
/// says the Field match itself is `false` (an unparseable or
/// out-of-range array index, or a non-table/non-array record), which is
/// not the same thing as delegating an *absent* sub-value to the
/// literal (e.g. `$exists: false`/`$ne` would wrongly match `None`).
enum FieldExtract<'a> {
    Value(Option<Value<'a>>),
    Forced(bool),
}

fn extract_field<'a>(
    node: &MatcherNode<'a>,
    field: &str,
    value: &Option<Value<'a>>,
) -> FieldExtract<'a> {
    let Some(v) = value.as_ref() else {
        return FieldExtract::Value(None);
    };
    let sub = match v {
        Value::Table(t) => t.get(field),
        Value::Array(a) => match field.parse::<i64>() {
            Ok(idx) => {
                let len = a.len() as i64;
                let real = if idx < 0 { len + idx } else { idx };
                if real < 0 || real >= len {
                    return FieldExtract::Forced(false);
                }
                a.get(real as usize)
            }
            Err(_) => return FieldExtract::Forced(false),
        },
        _ => return FieldExtract::Forced(false),
    };
    match sub {
        Some(Value::Pointer(p)) => FieldExtract::Value(
            node.registry
                .shallow_convert(node.arena, p)
                .or(Some(Value::Pointer(p))),
        ),
        other => FieldExtract::Value(other),
    }
}

fn match_leaf<'a>(node: &MatcherNode<'a>, leaf: &LeafKind<'a>, value: &Option<Value<'a>>) -> bool {
    match leaf {
        LeafKind::Eq(cond) => matches!(value, Some(v) if v.compare(cond).is_equal()),
        LeafKind::Ne(cond) => match value {
            Some(v) => !v.compare(cond).is_equal(),
            None => true,
        },
        LeafKind::Gt(cond) => compare_is(value, cond, CompareResult::Greater),
        LeafKind::Gte(cond) => {
            compare_is(value, cond, CompareResult::Greater) || compare_is(value, cond, CompareResult::Equal)
        }
        LeafKind::Lt(cond) => compare_is(value, cond, CompareResult::Less),
        LeafKind::Lte(cond) => {
            compare_is(value, cond, CompareResult::Less) || compare_is(value, cond, CompareResult::Equal)
        }
        LeafKind::In(set) => in_match(value, set, false),
        LeafKind::Nin(set) => in_match(value, set, true),
        LeafKind::Exists(want) => value.is_some() == *want,
        LeafKind::Present(want) => is_present(value) == *want,
        LeafKind::Regex(pattern) => match value {
            Some(v @ Value::Str(_)) => node.registry.regex_match(node.arena, pattern, v),
            _ => false,
        },
        LeafKind::Not(inner) => !inner.matches(value.clone()),
        LeafKind::Size(delegate) => match value {
            Some(Value::Array(a)) => delegate.matches(Some(Value::Int(a.len() as i64))),
            _ => false,
        },
        LeafKind::Custom { external, .. } => node.registry.custom_match(*external, value.as_ref()),
        LeafKind::AlwaysTrue => true,
        LeafKind::AlwaysFalse => false,
    }
}

fn compare_is<'a>(value: &Option<Value<'a>>, cond: &Value<'a>, want: CompareResult) -> bool {
    matches!(value, Some(v) if v.compare(cond) == want)
}

fn in_match<'a>(value: &Option<Value<'a>>, set: &'a Array<'a>, negate: bool) -> bool {
    let v = match value {
        Some(v) => v,
        None => return negate,
    };
    let membership = match v {
        Value::Array(elems) => {
            (0..elems.len()).any(|i| elems.get(i).map(|e| set_contains(set, &e)).unwrap_or(false))
        }
        other => set_contains(set, other),
    };
    membership != negate
}

fn set_contains<'a>(set: &'a Array<'a>, v: &Value<'a>) -> bool {
    (0..set.len()).any(|i| set.get(i).map(|e| e.compare(v).is_equal()).unwrap_or(false))
}

fn is_present(value: &Option<Value<'_>>) -> bool {
    match value {
        None => false,
        Some(Value::Null) => false,
        Some(Value::Str(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Table(t)) => !t.is_empty(),
        Some(Value::Bool(b)) => *b,
        Some(_) => true,
    }
}

/// Pushes a placeholder record at `node`'s position in the stack and
/// returns its index, before any child's `match` runs. Reserving the
/// slot here (rather than appending after `evaluate_inner` returns) is
/// what keeps the flat stack in depth-first pre-order: the parent's
/// index is always lower than every index a descendant reserves.
fn reserve_trace_slot<'a>(node: &MatcherNode<'a>) -> Option<usize> {
    let stack_ref = node.trace_stack.borrow();
    let state = stack_ref.as_ref()?;
    let mut stack = state.stack.borrow_mut();
    let idx = stack.len();
    stack.push(TraceRecord {
        level: node.trace_level.get(),
        message: "",
    });
    Some(idx)
}

/// Fills in the message reserved by [`reserve_trace_slot`] once `node`'s
/// match result (and its children's, by then already recorded after it
/// in the stack) is known.
fn fill_trace_slot<'a>(node: &MatcherNode<'a>, idx: usize, value: &Option<Value<'a>>, result: bool) {
    let stack_ref = node.trace_stack.borrow();
    let Some(state) = stack_ref.as_ref() else {
        return;
    };
    let cond_str = node.condition.to_str(state.scratch, node.registry);
    let val_str = match value {
        Some(v) => v.to_str(state.scratch, node.registry),
        None => "<absent>",
    };
    let outcome = if result { "Matched" } else { "Dismatch" };
    let field = match &node.kind {
        MatcherKind::Field { field, .. } => Some(*field),
        _ => None,
    };
    let mut message = String::new();
    message.push_str(node.name);
    message.push_str(": ");
    message.push_str(outcome);
    message.push_str(", ");
    if let Some(f) = field {
        message.push_str("field: \"");
        message.push_str(f);
        message.push_str("\", ");
    }
    message.push_str("condition: ");
    message.push_str(cond_str);
    message.push_str(", record: ");
    message.push_str(val_str);
    let message = state.scratch.alloc_str(&message);
    state.stack.borrow_mut()[idx].message = message;
}

/// Shared substrate for explain and trace: walks every node exactly
/// once. `acc` is a stack of "is this ancestor the last child of its
/// parent" flags, pushed before descending into a child and popped
/// after, so a visitor can reconstruct tree-drawing prefixes without
/// re-deriving them from `level`/`count`/`total` alone. Returning
/// `false` from `callback` stops descent into that node's subtree.
pub fn traverse<'a>(
    node: &'a MatcherNode<'a>,
    level: usize,
    count: usize,
    total: usize,
    acc: &mut Vec<bool>,
    callback: &mut dyn FnMut(&'a MatcherNode<'a>, usize, usize, usize, &[bool]) -> bool,
) {
    if !callback(node, level, count, total, acc) {
        return;
    }
    match &node.kind {
        MatcherKind::Composite { children, .. } => {
            let n = children.len();
            for (i, child) in children.iter().enumerate() {
                acc.push(i + 1 == n);
                traverse(child, level + 1, i, n, acc, callback);
                acc.pop();
            }
        }
        MatcherKind::Field { literal, .. } => {
            acc.push(true);
            traverse(literal, level + 1, 0, 1, acc, callback);
            acc.pop();
        }
        MatcherKind::Literal {
            array_record,
            delegate,
            ..
        } => {
            acc.push(true);
            match array_record.get() {
                Some(ar) => traverse(ar, level + 1, 0, 1, acc, callback),
                None => traverse(delegate, level + 1, 0, 1, acc, callback),
            }
            acc.pop();
        }
        MatcherKind::Leaf(LeafKind::Not(inner)) | MatcherKind::Leaf(LeafKind::Size(inner)) => {
            acc.push(true);
            traverse(inner, level + 1, 0, 1, acc, callback);
            acc.pop();
        }
        MatcherKind::Leaf(_) => {}
    }
}

/// Swaps every node's `match` to the tracing wrapper and attaches a
/// shared, scratch-arena-allocated stack. See [`crate::trace`].
pub fn enable_trace<'a>(root: &'a MatcherNode<'a>, scratch: &'a Arena) {
    let stack = scratch.alloc(RefCell::new(BVec::new_in(scratch.bump())));
    let mut acc = Vec::new();
    traverse(root, 0, 0, 1, &mut acc, &mut |node, level, _, _, _| {
        node.traced.set(true);
        node.trace_level.set(level);
        *node.trace_stack.borrow_mut() = Some(TraceState { stack, scratch });
        true
    });
}

/// Restores every node's `match` to its original (untraced) behavior and
/// detaches the stack.
pub fn disable_trace<'a>(root: &'a MatcherNode<'a>) {
    let mut acc = Vec::new();
    traverse(root, 0, 0, 1, &mut acc, &mut |node, _, _, _, _| {
        node.traced.set(false);
        *node.trace_stack.borrow_mut() = None;
        true
    });
}

/// Snapshot of the flat, append-ordered trace stack, for printing.
pub fn trace_records<'a>(root: &'a MatcherNode<'a>) -> Vec<(usize, &'a str)> {
    let stack_ref = root.trace_stack.borrow();
    match stack_ref.as_ref() {
        Some(state) => state
            .stack
            .borrow()
            .iter()
            .map(|r| (r.level, r.message))
            .collect(),
        None => Vec::new(),
    }
}

// ---- constructors used only by the compiler ----

#[allow(clippy::too_many_arguments)]
pub(crate) fn new_leaf<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    name: &'static str,
    condition: Value<'a>,
    priority: f64,
    ctx: ExternCtx,
    leaf: LeafKind<'a>,
) -> &'a MatcherNode<'a> {
    arena.alloc(MatcherNode {
        name,
        condition,
        priority,
        extern_ctx: ctx,
        kind: MatcherKind::Leaf(leaf),
        registry,
        arena,
        traced: Cell::new(false),
        trace_stack: RefCell::new(None),
        trace_level: Cell::new(0),
    })
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn new_composite<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    name: &'static str,
    condition: Value<'a>,
    priority: f64,
    ctx: ExternCtx,
    semantics: Semantics,
    children: &'a [&'a MatcherNode<'a>],
) -> &'a MatcherNode<'a> {
    arena.alloc(MatcherNode {
        name,
        condition,
        priority,
        extern_ctx: ctx,
        kind: MatcherKind::Composite { semantics, children },
        registry,
        arena,
        traced: Cell::new(false),
        trace_stack: RefCell::new(None),
        trace_level: Cell::new(0),
    })
}

pub(crate) fn new_literal<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    condition: Value<'a>,
    priority: f64,
    ctx: ExternCtx,
    delegate: &'a MatcherNode<'a>,
) -> &'a MatcherNode<'a> {
    arena.alloc(MatcherNode {
        name: "Literal",
        condition: condition.clone(),
        priority,
        extern_ctx: ctx,
        kind: MatcherKind::Literal {
            delegate,
            array_record: OnceCell::new(),
            source: condition,
            ctx,
        },
        registry,
        arena,
        traced: Cell::new(false),
        trace_stack: RefCell::new(None),
        trace_level: Cell::new(0),
    })
}

pub(crate) fn new_field<'a>(
    arena: &'a Arena,
    registry: &'a Registry,
    field: &'a str,
    condition: Value<'a>,
    priority: f64,
    ctx: ExternCtx,
    literal: &'a MatcherNode<'a>,
) -> &'a MatcherNode<'a> {
    arena.alloc(MatcherNode {
        name: "Field",
        condition,
        priority,
        extern_ctx: ctx,
        kind: MatcherKind::Field { field, literal },
        registry,
        arena,
        traced: Cell::new(false),
        trace_stack: RefCell::new(None),
        trace_level: Cell::new(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::registry::Registry;

    fn eq_leaf<'a>(arena: &'a Arena, registry: &'a Registry, v: Value<'a>) -> &'a MatcherNode<'a> {
        new_leaf(arena, registry, "Eq", v.clone(), 1.0, ExternCtx::NONE, LeafKind::Eq(v))
    }

    #[test]
    fn and_short_circuits_and_empty_is_true() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        let empty: &[&MatcherNode] = &[];
        let node = new_composite(
            &arena,
            &registry,
            "And",
            Value::Null,
            1.0,
            ExternCtx::NONE,
            Semantics::And,
            empty,
        );
        assert!(node.matches(Some(Value::Int(1))));
    }

    #[test]
    fn or_empty_is_false() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        let empty: &[&MatcherNode] = &[];
        let node = new_composite(
            &arena,
            &registry,
            "Or",
            Value::Null,
            1.0,
            ExternCtx::NONE,
            Semantics::Or,
            empty,
        );
        assert!(!node.matches(Some(Value::Int(1))));
    }

    #[test]
    fn eq_leaf_matches_equal_value() {
        let arena = Arena::new();
        let registry = Registry::with_builtins();
        let leaf = eq_leaf(&arena, &registry, Value::Int(5));
        assert!(leaf.matches(Some(Value::Int(5))));
        assert!(!leaf.matches(Some(Value::Int(6))));
        assert!(!leaf.matches(None));
    }
}
