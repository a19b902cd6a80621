//! End-to-end scenarios exercising compile + match together, one test
//! per scenario plus the explain-shape check for the `$or` scenario.

use mongory_core::{Arena, Array, ExternCtx, Registry, Table, Value};

fn doc<'a>(arena: &'a Arena, pairs: &[(&str, Value<'a>)]) -> Value<'a> {
    let table = Table::new(arena);
    for (k, v) in pairs {
        table.insert(k, v.clone());
    }
    Value::Table(arena.alloc(table))
}

fn compile<'a>(arena: &'a Arena, registry: &'a Registry, condition: Value<'a>) -> &'a mongory_core::MatcherNode<'a> {
    mongory_core::compile(arena, registry, condition, ExternCtx::NONE).expect("condition compiles")
}

#[test]
fn scenario_1_simple_comparison() {
    let arena = Arena::new();
    let registry = Registry::with_builtins();
    let inner = Table::new(&arena);
    inner.insert("$gte", Value::Int(18));
    let condition = doc(&arena, &[("age", Value::Table(arena.alloc(inner)))]);
    let matcher = compile(&arena, &registry, condition);

    assert!(matcher.matches(Some(doc(&arena, &[("age", Value::Int(20))]))));
    assert!(!matcher.matches(Some(doc(&arena, &[("age", Value::Int(17))]))));
    assert!(!matcher.matches(Some(doc(&arena, &[]))));
}

#[test]
fn scenario_2_or_of_two_fields() {
    let arena = Arena::new();
    let scratch = Arena::new();
    let registry = Registry::with_builtins();

    let gte18 = Table::new(&arena);
    gte18.insert("$gte", Value::Int(18));
    let branch_a = doc(&arena, &[("age", Value::Table(arena.alloc(gte18)))]);
    let branch_b = doc(&arena, &[("status", Value::Str("active"))]);

    let branches = Array::new(&arena);
    branches.push(branch_a);
    branches.push(branch_b);
    let or_table = Table::new(&arena);
    or_table.insert("$or", Value::Array(arena.alloc(branches)));
    let condition = Value::Table(arena.alloc(or_table));

    let matcher = compile(&arena, &registry, condition);

    assert!(matcher.matches(Some(doc(&arena, &[("age", Value::Int(10)), ("status", Value::Str("active"))]))));
    assert!(!matcher.matches(Some(doc(&arena, &[("age", Value::Int(10)), ("status", Value::Str("inactive"))]))));

    let text = mongory_core::explain(matcher, &scratch);
    assert!(text.starts_with("Or:"));
    let top_level = text
        .lines()
        .filter(|l| l.starts_with("├─ ") || l.starts_with("└─ "))
        .count();
    assert_eq!(top_level, 2, "explain of scenario 2 must show exactly two branches:\n{text}");
}

#[test]
fn scenario_3_implicit_elem_match() {
    let arena = Arena::new();
    let registry = Registry::with_builtins();
    let condition = doc(&arena, &[("tags", Value::Str("red"))]);
    let matcher = compile(&arena, &registry, condition);

    let tags = Array::new(&arena);
    tags.push(Value::Str("red"));
    tags.push(Value::Str("blue"));
    assert!(matcher.matches(Some(doc(&arena, &[("tags", Value::Array(arena.alloc(tags)))]))));

    assert!(matcher.matches(Some(doc(&arena, &[("tags", Value::Str("red"))]))));

    let tags2 = Array::new(&arena);
    tags2.push(Value::Str("green"));
    assert!(!matcher.matches(Some(doc(&arena, &[("tags", Value::Array(arena.alloc(tags2)))]))));
}

#[test]
fn scenario_4_elem_match_operator() {
    let arena = Arena::new();
    let registry = Registry::with_builtins();

    let lt10 = Table::new(&arena);
    lt10.insert("$lt", Value::Int(10));
    let price_cond = Table::new(&arena);
    price_cond.insert("price", Value::Table(arena.alloc(lt10)));
    let elem_match = Table::new(&arena);
    elem_match.insert("$elemMatch", Value::Table(arena.alloc(price_cond)));
    let condition = doc(&arena, &[("items", Value::Table(arena.alloc(elem_match)))]);
    let matcher = compile(&arena, &registry, condition);

    let cheap = doc(&arena, &[("price", Value::Int(5))]);
    let pricey = doc(&arena, &[("price", Value::Int(50))]);
    let items = Array::new(&arena);
    items.push(cheap);
    items.push(pricey);
    assert!(matcher.matches(Some(doc(&arena, &[("items", Value::Array(arena.alloc(items)))]))));

    let empty_items = Array::new(&arena);
    assert!(!matcher.matches(Some(doc(&arena, &[("items", Value::Array(arena.alloc(empty_items)))]))));
}

#[test]
fn scenario_5_null_means_missing_or_explicit_null() {
    let arena = Arena::new();
    let registry = Registry::with_builtins();
    let condition = doc(&arena, &[("name", Value::Null)]);
    let matcher = compile(&arena, &registry, condition);

    assert!(matcher.matches(Some(doc(&arena, &[("name", Value::Null)]))));
    assert!(matcher.matches(Some(doc(&arena, &[]))));
    assert!(!matcher.matches(Some(doc(&arena, &[("name", Value::Str("x"))]))));
}

#[test]
fn scenario_6_size_operator() {
    let arena = Arena::new();
    let registry = Registry::with_builtins();
    let size3 = Table::new(&arena);
    size3.insert("$size", Value::Int(3));
    let condition = doc(&arena, &[("scores", Value::Table(arena.alloc(size3)))]);
    let matcher = compile(&arena, &registry, condition);

    let three = Array::new(&arena);
    three.push(Value::Int(1));
    three.push(Value::Int(2));
    three.push(Value::Int(3));
    assert!(matcher.matches(Some(doc(&arena, &[("scores", Value::Array(arena.alloc(three)))]))));

    let two = Array::new(&arena);
    two.push(Value::Int(1));
    two.push(Value::Int(2));
    assert!(!matcher.matches(Some(doc(&arena, &[("scores", Value::Array(arena.alloc(two)))]))));
}

/// A non-integer key against an array-valued element must force the
/// Field match to `false`, not delegate an absent sub-value to the
/// literal — for negation-shaped leaves (`$exists: false`, `$ne`) an
/// absent sub-value would otherwise wrongly match.
#[test]
fn array_field_with_unparseable_index_forces_false_not_absent() {
    let arena = Arena::new();
    let registry = Registry::with_builtins();

    let exists_false = Table::new(&arena);
    exists_false.insert("$exists", Value::Bool(false));
    let elem_cond = Table::new(&arena);
    elem_cond.insert("x", Value::Table(arena.alloc(exists_false)));
    let elem_match = Table::new(&arena);
    elem_match.insert("$elemMatch", Value::Table(arena.alloc(elem_cond)));
    let condition = doc(&arena, &[("arr", Value::Table(arena.alloc(elem_match)))]);
    let matcher = compile(&arena, &registry, condition);

    // `arr`'s sole element is itself an array; indexing it by the
    // non-integer field "x" must be `false`, so `$elemMatch` has no
    // satisfying element and the whole condition is `false`.
    let inner = Array::new(&arena);
    inner.push(Value::Int(1));
    inner.push(Value::Int(2));
    let outer = Array::new(&arena);
    outer.push(Value::Array(arena.alloc(inner)));
    assert!(!matcher.matches(Some(doc(&arena, &[("arr", Value::Array(arena.alloc(outer)))]))));
}

/// Same forced-`false` rule applies to an out-of-range (but
/// well-formed) array index.
#[test]
fn array_field_with_out_of_range_index_forces_false_not_absent() {
    let arena = Arena::new();
    let registry = Registry::with_builtins();

    let ne = Table::new(&arena);
    ne.insert("$ne", Value::Int(99));
    let elem_cond = Table::new(&arena);
    elem_cond.insert("5", Value::Table(arena.alloc(ne)));
    let elem_match = Table::new(&arena);
    elem_match.insert("$elemMatch", Value::Table(arena.alloc(elem_cond)));
    let condition = doc(&arena, &[("arr", Value::Table(arena.alloc(elem_match)))]);
    let matcher = compile(&arena, &registry, condition);

    // index "5" is out of range for a 2-element inner array; `$ne`
    // against an absent value would wrongly match, but the forced
    // `false` must win instead.
    let inner = Array::new(&arena);
    inner.push(Value::Int(1));
    inner.push(Value::Int(2));
    let outer = Array::new(&arena);
    outer.push(Value::Array(arena.alloc(inner)));
    assert!(!matcher.matches(Some(doc(&arena, &[("arr", Value::Array(arena.alloc(outer)))]))));
}
