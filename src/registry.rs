//! Process-scoped (but explicitly owned, not global) operator table and
//! adapter hooks.
//!
//! [`Registry`] is a plain struct callers can build and extend
//! themselves, and [`global`] exposes a lazily-initialized process-wide
//! default for callers who just want "call `init()` once" ergonomics.
//! It maps `$`-operator names to matcher compilers, the same shape as an
//! opcode-to-compiler-function table.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::arena::Arena;
use crate::compiler::operators;
use crate::matcher::MatcherNode;
use crate::value::Value;

/// Opaque pointer threaded from the caller through compile and match,
/// for use by custom matchers and converters. Never dereferenced by the
/// core itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternCtx(pub *const ());

impl ExternCtx {
    pub const NONE: ExternCtx = ExternCtx(std::ptr::null());

    pub fn is_none(&self) -> bool {
        self.0.is_null()
    }
}

impl Default for ExternCtx {
    fn default() -> Self {
        ExternCtx::NONE
    }
}

/// `(arena, condition, extern_ctx) -> matcher`. Implemented by every
/// built-in `$operator` in [`crate::compiler::operators`] and by any
/// operator a host registers.
pub type OperatorCompiler =
    for<'a> fn(&Registry, &'a Arena, Value<'a>, ExternCtx) -> Option<&'a MatcherNode<'a>>;

/// `{match, stringify}` for `$regex` and `Value::Regex` stringification.
/// Defaults return `false` / `"//"` since no regex engine is wired in
/// without a host adapter.
#[derive(Clone, Copy)]
pub struct RegexAdapter {
    pub match_fn: for<'a> fn(&'a Arena, &Value<'a>, &Value<'a>) -> bool,
    pub stringify_fn: for<'a> fn(&'a Arena, &Value<'a>) -> &'a str,
}

fn default_regex_match<'a>(_arena: &'a Arena, _pattern: &Value<'a>, _input: &Value<'a>) -> bool {
    false
}

fn default_regex_stringify<'a>(arena: &'a Arena, _pattern: &Value<'a>) -> &'a str {
    arena.alloc_str("//")
}

impl Default for RegexAdapter {
    fn default() -> Self {
        RegexAdapter {
            match_fn: default_regex_match,
            stringify_fn: default_regex_stringify,
        }
    }
}

/// `{deep_convert, shallow_convert, recover}` used by bindings to bridge
/// foreign objects in and out. All `None` until a host registers them.
#[derive(Clone, Copy, Default)]
pub struct ValueConverter {
    pub deep_convert: Option<for<'a> fn(&'a Arena, *const ()) -> Value<'a>>,
    pub shallow_convert: Option<for<'a> fn(&'a Arena, *const ()) -> Value<'a>>,
    pub recover: Option<fn(*const ()) -> *const ()>,
}

/// `{lookup, build, match}` for host-registered predicates behind
/// unrecognized `$`-keys.
#[derive(Clone, Copy, Default)]
pub struct CustomMatcherAdapter {
    pub lookup: Option<fn(&str) -> bool>,
    pub build: Option<for<'a> fn(&str, &Value<'a>, ExternCtx) -> (&'static str, *const ())>,
    pub match_fn: Option<for<'a> fn(*const (), Option<&Value<'a>>) -> bool>,
}

/// The 17 builtin `$`-operators this registry knows how to compile.
pub const BUILTIN_OPERATORS: &[&str] = &[
    "$in", "$nin", "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$exists", "$present", "$regex",
    "$and", "$or", "$elemMatch", "$every", "$not", "$size",
];

pub struct Registry {
    operators: HashMap<&'static str, OperatorCompiler>,
    regex: RegexAdapter,
    converter: ValueConverter,
    custom: CustomMatcherAdapter,
    trace_colorful: bool,
}

impl Registry {
    /// Registers all of [`BUILTIN_OPERATORS`] with their compilers.
    pub fn with_builtins() -> Self {
        let mut operators: HashMap<&'static str, OperatorCompiler> = HashMap::new();
        operators.insert("$in", operators::compile_in);
        operators.insert("$nin", operators::compile_nin);
        operators.insert("$eq", operators::compile_eq);
        operators.insert("$ne", operators::compile_ne);
        operators.insert("$gt", operators::compile_gt);
        operators.insert("$gte", operators::compile_gte);
        operators.insert("$lt", operators::compile_lt);
        operators.insert("$lte", operators::compile_lte);
        operators.insert("$exists", operators::compile_exists);
        operators.insert("$present", operators::compile_present);
        operators.insert("$regex", operators::compile_regex);
        operators.insert("$and", operators::compile_and);
        operators.insert("$or", operators::compile_or);
        operators.insert("$elemMatch", operators::compile_elem_match);
        operators.insert("$every", operators::compile_every);
        operators.insert("$not", operators::compile_not);
        operators.insert("$size", operators::compile_size);

        Registry {
            operators,
            regex: RegexAdapter::default(),
            converter: ValueConverter::default(),
            custom: CustomMatcherAdapter::default(),
            trace_colorful: false,
        }
    }

    pub fn builtin_operator_names(&self) -> Vec<&'static str> {
        BUILTIN_OPERATORS.to_vec()
    }

    pub fn lookup_operator(&self, key: &str) -> Option<OperatorCompiler> {
        self.operators.get(key).copied()
    }

    pub fn register_operator(&mut self, key: &'static str, compiler: OperatorCompiler) {
        self.operators.insert(key, compiler);
    }

    pub fn set_regex_match(&mut self, f: for<'a> fn(&'a Arena, &Value<'a>, &Value<'a>) -> bool) {
        self.regex.match_fn = f;
    }

    pub fn set_regex_stringify(&mut self, f: for<'a> fn(&'a Arena, &Value<'a>) -> &'a str) {
        self.regex.stringify_fn = f;
    }

    pub fn regex_match<'a>(&self, arena: &'a Arena, pattern: &Value<'a>, input: &Value<'a>) -> bool {
        (self.regex.match_fn)(arena, pattern, input)
    }

    pub fn regex_stringify<'a>(&self, arena: &'a Arena, pattern: &Value<'a>) -> &'a str {
        (self.regex.stringify_fn)(arena, pattern)
    }

    pub fn set_value_converter_deep(&mut self, f: for<'a> fn(&'a Arena, *const ()) -> Value<'a>) {
        self.converter.deep_convert = Some(f);
    }

    pub fn set_value_converter_shallow(
        &mut self,
        f: for<'a> fn(&'a Arena, *const ()) -> Value<'a>,
    ) {
        self.converter.shallow_convert = Some(f);
    }

    pub fn set_value_converter_recover(&mut self, f: fn(*const ()) -> *const ()) {
        self.converter.recover = Some(f);
    }

    pub fn shallow_convert<'a>(&self, arena: &'a Arena, ptr: *const ()) -> Option<Value<'a>> {
        self.converter.shallow_convert.map(|f| f(arena, ptr))
    }

    pub fn set_custom_matcher_lookup(&mut self, f: fn(&str) -> bool) {
        self.custom.lookup = Some(f);
    }

    pub fn set_custom_matcher_build(
        &mut self,
        f: for<'a> fn(&str, &Value<'a>, ExternCtx) -> (&'static str, *const ()),
    ) {
        self.custom.build = Some(f);
    }

    pub fn set_custom_matcher_match(
        &mut self,
        f: for<'a> fn(*const (), Option<&Value<'a>>) -> bool,
    ) {
        self.custom.match_fn = Some(f);
    }

    pub fn custom_lookup(&self, key: &str) -> bool {
        self.custom.lookup.is_some_and(|f| f(key))
    }

    pub fn custom_build<'a>(
        &self,
        key: &str,
        cond: &Value<'a>,
        ctx: ExternCtx,
    ) -> Option<(&'static str, *const ())> {
        self.custom.build.map(|f| f(key, cond, ctx))
    }

    pub fn custom_match<'a>(&self, external: *const (), value: Option<&Value<'a>>) -> bool {
        self.custom
            .match_fn
            .map(|f| f(external, value))
            .unwrap_or(false)
    }

    pub fn set_trace_colorful(&mut self, colorful: bool) {
        self.trace_colorful = colorful;
    }

    pub fn trace_colorful(&self) -> bool {
        self.trace_colorful
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::with_builtins()
    }
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Process-wide default registry, initialized on first use. Setters on
/// the returned reference are not available; hosts that need adapters
/// should build and own their own [`Registry`] instead.
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(Registry::with_builtins)
}
