//! An embeddable, arena-allocated document query engine: compiles
//! MongoDB-style condition documents into a tree of typed matcher
//! nodes and evaluates them against arena-resident values.
//!
//! ```
//! use mongory_core::{Arena, Registry, Table, Value};
//!
//! let arena = Arena::new();
//! let registry = Registry::with_builtins();
//!
//! let condition = Table::new(&arena);
//! condition.insert("age", Value::Int(18));
//! let matcher = mongory_core::compile(
//!     &arena,
//!     &registry,
//!     Value::Table(arena.alloc(condition)),
//!     mongory_core::ExternCtx::NONE,
//! )
//! .expect("valid condition");
//!
//! let doc = Table::new(&arena);
//! doc.insert("age", Value::Int(18));
//! assert!(matcher.matches(Some(Value::Table(arena.alloc(doc)))));
//! ```
//!
//! Persistence, indexing, cross-document joins, aggregation, and
//! sharing a compiled matcher across threads are out of scope; see the
//! design notes in each module for what is and isn't modeled.

pub mod arena;
pub mod compiler;
pub mod error;
pub mod explain;
pub mod matcher;
pub mod registry;
pub mod trace;
pub mod value;

pub use arena::Arena;
pub use compiler::compile;
pub use error::{ArenaError, ErrorKind, MongoryError};
pub use explain::explain;
pub use matcher::MatcherNode;
pub use registry::{global as global_registry, ExternCtx, Registry};
pub use trace::{trace, trace_disable, trace_enable, trace_print};
pub use value::{Array, Kind, Table, Value};

/// Forces initialization of the process-wide default [`Registry`]
/// (`spec.md` §6). Calling this is optional: [`global_registry`]
/// initializes lazily on first use either way.
pub fn init() {
    let _ = registry::global();
}

/// No-op: this crate has no global arena or other mutable process-wide
/// state to tear down (the default registry is immutable once built).
/// Kept for embedding-API parity with `spec.md` §6.
pub fn cleanup() {}
