//! Sibling reordering for compiled And/Or/ElemMatch/Every composites.
//!
//! `spec.md` §4.4.6 keys the sort on `floor(priority * 10000)` and
//! requires stability; `[T]::sort_by_key` is a stable sort, satisfying
//! both without hand-rolling a merge sort.

use crate::matcher::MatcherNode;

fn priority_key(priority: f64) -> i64 {
    (priority * 10000.0).floor() as i64
}

pub(crate) fn sort_by_priority<'a>(nodes: &mut [&'a MatcherNode<'a>]) {
    nodes.sort_by_key(|n| priority_key(n.priority));
}
