//! Explain: renders a compiled matcher as an ASCII tree, one line per
//! node, using the shared [`crate::matcher::traverse`] substrate.

use crate::arena::Arena;
use crate::matcher::{traverse, MatcherKind, MatcherNode};

/// `explain(node, scratch_arena) -> String`. `scratch_arena` backs the
/// `to_str` calls used to render each node's condition; it may be reset
/// by the caller once this returns.
pub fn explain<'a>(node: &'a MatcherNode<'a>, scratch: &'a Arena) -> String {
    let registry = node.registry();
    let mut out = String::new();
    let mut acc = Vec::new();
    traverse(node, 0, 0, 1, &mut acc, &mut |n, _level, _count, _total, acc| {
        out.push_str(&prefix_for(acc));
        let cond_str = n.condition.to_str(scratch, registry);
        match n.kind() {
            MatcherKind::Field { field, .. } => {
                out.push_str("Field: \"");
                out.push_str(field);
                out.push_str("\", to match: ");
                out.push_str(cond_str);
            }
            _ => {
                out.push_str(n.name());
                out.push_str(": ");
                out.push_str(cond_str);
            }
        }
        out.push('\n');
        true
    });
    out
}

/// `acc[i]` is whether the ancestor at depth `i` (root = depth 0) was
/// the last child of its own parent; the final entry is `node`'s own
/// position among its siblings.
fn prefix_for(acc: &[bool]) -> String {
    if acc.is_empty() {
        return String::new();
    }
    let mut s = String::new();
    for &ancestor_last in &acc[..acc.len() - 1] {
        s.push_str(if ancestor_last { "   " } else { "│  " });
    }
    s.push_str(if *acc.last().unwrap() { "└─ " } else { "├─ " });
    s
}
