//! Trace: per-node match-outcome recording, built on the same
//! evaluation pass explain's [`crate::matcher::traverse`] walks after
//! the fact.
//!
//! Each node reserves its stack slot *before* its children's `match`
//! calls run, and fills in the outcome once its own result is known
//! (`crate::matcher::reserve_trace_slot`/`fill_trace_slot`). That keeps
//! the flat stack in depth-first pre-order despite a node's message only
//! being computable after its subtree has finished evaluating —
//! recovering tree layout from level then collapses to printing each
//! record indented by `2 * level` spaces, with no separate reordering
//! pass required.

use crate::arena::Arena;
use crate::matcher::{disable_trace, enable_trace, trace_records, MatcherNode};
use crate::value::Value;

const MATCHED_ON: &str = "\u{1b}[30;42m";
const DISMATCH_ON: &str = "\u{1b}[30;41m";
const COLOR_OFF: &str = "\u{1b}[0m";

/// Swaps every node's `match` to the tracing wrapper and attaches a
/// shared, `scratch`-allocated record stack.
pub fn trace_enable<'a>(node: &'a MatcherNode<'a>, scratch: &'a Arena) {
    enable_trace(node, scratch);
}

/// Restores every node's `match` to its original behavior and detaches
/// the stack.
pub fn trace_disable<'a>(node: &'a MatcherNode<'a>) {
    disable_trace(node);
}

/// Renders the current trace stack as `<name>: <result>, [field: "<f>",
/// ]condition: <cond>, record: <val>` lines, each indented `2 * level`
/// spaces, colorized if the registry's trace-colorful flag is set.
pub fn trace_print<'a>(node: &'a MatcherNode<'a>) -> String {
    let colorful = node.registry().trace_colorful();
    let mut out = String::new();
    for (level, message) in trace_records(node) {
        out.push_str(&" ".repeat(2 * level));
        out.push_str(&colorize(message, colorful));
        out.push('\n');
    }
    out
}

fn colorize(message: &str, colorful: bool) -> String {
    if !colorful {
        return message.to_string();
    }
    message
        .replacen("Matched", &format!("{MATCHED_ON}Matched{COLOR_OFF}"), 1)
        .replacen("Dismatch", &format!("{DISMATCH_ON}Dismatch{COLOR_OFF}"), 1)
}

/// One-shot convenience: enable, match, print to stdout, disable.
/// Returns the match result.
pub fn trace<'a>(node: &'a MatcherNode<'a>, scratch: &'a Arena, value: Option<Value<'a>>) -> bool {
    trace_enable(node, scratch);
    let result = node.matches(value);
    print!("{}", trace_print(node));
    trace_disable(node);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ExternCtx, Registry};
    use crate::value::Table;

    #[test]
    fn trace_enable_then_disable_clears_records() {
        let arena = Arena::new();
        let scratch = Arena::new();
        let registry = Registry::with_builtins();
        let table = Table::new(&arena);
        table.insert("age", Value::Int(18));
        let node = crate::compiler::compile(&arena, &registry, Value::Table(arena.alloc(table)), ExternCtx::NONE)
            .unwrap();

        trace_enable(node, &scratch);
        let doc = Table::new(&arena);
        doc.insert("age", Value::Int(18));
        assert!(node.matches(Some(Value::Table(arena.alloc(doc)))));
        let printed = trace_print(node);
        assert!(printed.contains("Matched"));

        trace_disable(node);
        assert!(trace_records(node).is_empty());
        assert!(!node.is_traced());
    }

    #[test]
    fn trace_stack_is_pre_order_root_first() {
        let arena = Arena::new();
        let scratch = Arena::new();
        let registry = Registry::with_builtins();
        let gte = Table::new(&arena);
        gte.insert("$gte", Value::Int(18));
        let table = Table::new(&arena);
        table.insert("age", Value::Table(arena.alloc(gte)));
        let node = crate::compiler::compile(&arena, &registry, Value::Table(arena.alloc(table)), ExternCtx::NONE)
            .unwrap();

        trace_enable(node, &scratch);
        let doc = Table::new(&arena);
        doc.insert("age", Value::Int(20));
        assert!(node.matches(Some(Value::Table(arena.alloc(doc)))));

        let records = trace_records(node);
        assert_eq!(records.len(), 3, "Field -> Literal -> $gte");
        assert_eq!(records[0].0, 0);
        assert!(
            records[0].1.starts_with("Field:"),
            "root (lowest level) must be recorded first, got: {records:?}"
        );
        assert_eq!(records[1].0, 1);
        assert!(records[2].0 >= 2, "leaf must be deepest and recorded last");

        let printed = trace_print(node);
        let lines: Vec<&str> = printed.lines().collect();
        assert!(
            lines[0].starts_with("Field:"),
            "printed trace must show the root first:\n{printed}"
        );
    }
}
