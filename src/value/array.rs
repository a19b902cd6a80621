//! Array: an ordered sequence of [`Value`]s, arena-backed, with a
//! read-only foreign-backed variant for host bindings.
//!
//! The owned storage is a `bumpalo::collections::Vec`: growth
//! reallocates fresh storage out of the same arena instead of the heap.

use std::cell::RefCell;

use crate::arena::Arena;
use crate::value::Value;

type BVec<'a, T> = bumpalo::collections::Vec<'a, T>;

/// Adapts a foreign (host-language) collection into the read-only Array
/// interface via a trait object.
pub trait ForeignArraySource<'a> {
    fn count(&self) -> usize;
    fn get_at_index(&self, index: usize) -> Option<Value<'a>>;
}

pub struct ForeignArray<'a> {
    source: &'a dyn ForeignArraySource<'a>,
}

impl<'a> ForeignArray<'a> {
    pub fn new(source: &'a dyn ForeignArraySource<'a>) -> Self {
        ForeignArray { source }
    }

    pub fn len(&self) -> usize {
        self.source.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value<'a>> {
        self.source.get_at_index(index)
    }
}

struct OwnedArray<'a> {
    arena: &'a Arena,
    items: RefCell<BVec<'a, Value<'a>>>,
}

/// Array of [`Value`] references. The `Owned` variant supports push/set;
/// the `Foreign` variant degrades `push`/`set`/`del` to unsupported.
pub enum Array<'a> {
    Owned(OwnedArray<'a>),
    Foreign(ForeignArray<'a>),
}

impl<'a> Array<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        Array::Owned(OwnedArray {
            arena,
            items: RefCell::new(BVec::new_in(arena.bump())),
        })
    }

    pub fn from_foreign(source: &'a dyn ForeignArraySource<'a>) -> Self {
        Array::Foreign(ForeignArray::new(source))
    }

    pub fn len(&self) -> usize {
        match self {
            Array::Owned(o) => o.items.borrow().len(),
            Array::Foreign(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// O(1) indexed get.
    pub fn get(&self, index: usize) -> Option<Value<'a>> {
        match self {
            Array::Owned(o) => o.items.borrow().get(index).cloned(),
            Array::Foreign(f) => f.get(index),
        }
    }

    /// Amortized-O(1) push. Unsupported on foreign arrays.
    pub fn push(&self, value: Value<'a>) -> bool {
        match self {
            Array::Owned(o) => {
                o.items.borrow_mut().push(value);
                true
            }
            Array::Foreign(_) => false,
        }
    }

    /// Set at an out-of-range index zero-fills intermediate slots (with
    /// `Value::Null`) and extends the count. Unsupported on foreign
    /// arrays.
    pub fn set(&self, index: usize, value: Value<'a>) -> bool {
        match self {
            Array::Owned(o) => {
                let mut items = o.items.borrow_mut();
                while items.len() <= index {
                    items.push(Value::Null);
                }
                items[index] = value;
                true
            }
            Array::Foreign(_) => false,
        }
    }

    pub fn iter(&self) -> Vec<Value<'a>> {
        match self {
            Array::Owned(o) => o.items.borrow().iter().cloned().collect(),
            Array::Foreign(f) => (0..f.len()).filter_map(|i| f.get(i)).collect(),
        }
    }

    pub(crate) fn arena(&self) -> Option<&'a Arena> {
        match self {
            Array::Owned(o) => Some(o.arena),
            Array::Foreign(_) => None,
        }
    }
}

impl std::fmt::Debug for Array<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Array(len={})", self.len())
    }
}

/// Arrays compare equal only by identity: two distinct arrays with the
/// same elements are not `==`. Use [`Value::compare`] for value equality.
impl PartialEq for Array<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}
