//! Table: a UTF-8-keyed map to [`Value`]s, arena-backed with chained
//! hash buckets, plus a read-only foreign-backed variant.
//!
//! Keys are copied into the arena on insert; values are stored by
//! reference. Rehashes at load factor > 0.75 to the next prime capacity
//! of at least double the current one, allocating a fresh bucket vector
//! and relinking entries rather than mutating the existing backing
//! array in place.

use std::cell::{Cell, RefCell};
use std::hash::{Hash, Hasher};

use crate::arena::Arena;
use crate::value::Value;

type BVec<'a, T> = bumpalo::collections::Vec<'a, T>;

const INITIAL_CAPACITY: usize = 7; // smallest prime we bother starting at
const LOAD_FACTOR_THRESHOLD: f64 = 0.75;

struct Entry<'a> {
    key: &'a str,
    value: RefCell<Value<'a>>,
    next: Cell<Option<&'a Entry<'a>>>,
}

fn hash_key(key: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

fn next_prime(min: usize) -> usize {
    let mut n = min.max(2);
    if n % 2 == 0 {
        n += 1;
    }
    while !is_prime(n) {
        n += 2;
    }
    n
}

/// Adapts a foreign (host-language) map into the read-only Table
/// interface via a trait object.
pub trait ForeignTableSource<'a> {
    fn count(&self) -> usize;
    fn get_by_key(&self, key: &str) -> Option<Value<'a>>;
}

pub struct ForeignTable<'a> {
    source: &'a dyn ForeignTableSource<'a>,
}

impl<'a> ForeignTable<'a> {
    pub fn new(source: &'a dyn ForeignTableSource<'a>) -> Self {
        ForeignTable { source }
    }

    pub fn len(&self) -> usize {
        self.source.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<Value<'a>> {
        self.source.get_by_key(key)
    }
}

struct OwnedTable<'a> {
    arena: &'a Arena,
    buckets: RefCell<BVec<'a, Option<&'a Entry<'a>>>>,
    count: Cell<usize>,
}

impl<'a> OwnedTable<'a> {
    fn new(arena: &'a Arena) -> Self {
        let mut buckets = BVec::with_capacity_in(INITIAL_CAPACITY, arena.bump());
        buckets.resize(INITIAL_CAPACITY, None);
        OwnedTable {
            arena,
            buckets: RefCell::new(buckets),
            count: Cell::new(0),
        }
    }

    fn capacity(&self) -> usize {
        self.buckets.borrow().len()
    }

    fn bucket_index(&self, key: &str, capacity: usize) -> usize {
        (hash_key(key) % capacity as u64) as usize
    }

    fn get(&self, key: &str) -> Option<Value<'a>> {
        let buckets = self.buckets.borrow();
        let idx = self.bucket_index(key, buckets.len());
        let mut cur = buckets[idx];
        while let Some(entry) = cur {
            if entry.key == key {
                return Some(entry.value.borrow().clone());
            }
            cur = entry.next.get();
        }
        None
    }

    fn insert(&self, key: &str, value: Value<'a>) {
        {
            let buckets = self.buckets.borrow();
            let idx = self.bucket_index(key, buckets.len());
            let mut cur = buckets[idx];
            while let Some(entry) = cur {
                if entry.key == key {
                    *entry.value.borrow_mut() = value;
                    return;
                }
                cur = entry.next.get();
            }
        }
        let arena_key = self.arena.alloc_str(key);
        let head = {
            let buckets = self.buckets.borrow();
            let idx = self.bucket_index(arena_key, buckets.len());
            buckets[idx]
        };
        let entry = self.arena.alloc(Entry {
            key: arena_key,
            value: RefCell::new(value),
            next: Cell::new(head),
        });
        let idx = self.bucket_index(arena_key, self.capacity());
        self.buckets.borrow_mut()[idx] = Some(entry);
        self.count.set(self.count.get() + 1);

        if (self.count.get() as f64) > LOAD_FACTOR_THRESHOLD * self.capacity() as f64 {
            self.rehash();
        }
    }

    /// Allocates a fresh bucket vector at the next prime capacity of at
    /// least double the current one, and relinks every entry into it.
    fn rehash(&self) {
        let new_capacity = next_prime(self.capacity() * 2);
        let mut new_buckets = BVec::with_capacity_in(new_capacity, self.arena.bump());
        new_buckets.resize(new_capacity, None);

        for head in self.buckets.borrow().iter() {
            let mut cur = *head;
            while let Some(entry) = cur {
                let next = entry.next.get();
                let idx = (hash_key(entry.key) % new_capacity as u64) as usize;
                entry.next.set(new_buckets[idx]);
                new_buckets[idx] = Some(entry);
                cur = next;
            }
        }
        *self.buckets.borrow_mut() = new_buckets;
    }

    fn del(&self, key: &str) -> bool {
        let idx = self.bucket_index(key, self.capacity());
        let mut buckets = self.buckets.borrow_mut();
        let mut cur = buckets[idx];
        let mut prev: Option<&'a Entry<'a>> = None;
        while let Some(entry) = cur {
            if entry.key == key {
                match prev {
                    Some(p) => p.next.set(entry.next.get()),
                    None => buckets[idx] = entry.next.get(),
                }
                self.count.set(self.count.get() - 1);
                return true;
            }
            prev = Some(entry);
            cur = entry.next.get();
        }
        false
    }

    fn keys(&self) -> Vec<&'a str> {
        let mut out = Vec::new();
        for head in self.buckets.borrow().iter() {
            let mut cur = *head;
            while let Some(entry) = cur {
                out.push(entry.key);
                cur = entry.next.get();
            }
        }
        out
    }

    fn iter(&self) -> Vec<(&'a str, Value<'a>)> {
        let mut out = Vec::new();
        for head in self.buckets.borrow().iter() {
            let mut cur = *head;
            while let Some(entry) = cur {
                out.push((entry.key, entry.value.borrow().clone()));
                cur = entry.next.get();
            }
        }
        out
    }
}

/// Table mapping UTF-8 keys to [`Value`]s. The `Owned` variant supports
/// insert/remove; the `Foreign` variant degrades to read-only lookups.
pub enum Table<'a> {
    Owned(OwnedTable<'a>),
    Foreign(ForeignTable<'a>),
}

impl<'a> Table<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        Table::Owned(OwnedTable::new(arena))
    }

    pub fn from_foreign(source: &'a dyn ForeignTableSource<'a>) -> Self {
        Table::Foreign(ForeignTable::new(source))
    }

    pub fn len(&self) -> usize {
        match self {
            Table::Owned(o) => o.count.get(),
            Table::Foreign(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<Value<'a>> {
        match self {
            Table::Owned(o) => o.get(key),
            Table::Foreign(f) => f.get(key),
        }
    }

    /// Unsupported on foreign tables.
    pub fn insert(&self, key: &str, value: Value<'a>) -> bool {
        match self {
            Table::Owned(o) => {
                o.insert(key, value);
                true
            }
            Table::Foreign(_) => false,
        }
    }

    /// Unsupported on foreign tables.
    pub fn del(&self, key: &str) -> bool {
        match self {
            Table::Owned(o) => o.del(key),
            Table::Foreign(_) => false,
        }
    }

    pub fn keys(&self) -> Vec<&'a str> {
        match self {
            Table::Owned(o) => o.keys(),
            // Foreign tables don't expose enumeration in this adapter;
            // callers only look up known keys.
            Table::Foreign(_) => Vec::new(),
        }
    }

    /// Iteration order is unspecified (bucket order, not insertion order).
    pub fn iter(&self) -> Vec<(&'a str, Value<'a>)> {
        match self {
            Table::Owned(o) => o.iter(),
            Table::Foreign(_) => Vec::new(),
        }
    }
}

impl std::fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Table(len={})", self.len())
    }
}

impl PartialEq for Table<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_round_trip() {
        let arena = Arena::new();
        let table = Table::new(&arena);
        table.insert("age", Value::Int(30));
        assert_eq!(table.get("age"), Some(Value::Int(30)));
        assert_eq!(table.get("missing"), None);
    }

    #[test]
    fn rehash_preserves_all_entries_at_threshold() {
        let arena = Arena::new();
        let table = Table::new(&arena);
        let keys: Vec<String> = (0..50).map(|i| format!("k{i}")).collect();
        for (i, k) in keys.iter().enumerate() {
            table.insert(k, Value::Int(i as i64));
        }
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(table.get(k), Some(Value::Int(i as i64)));
        }
    }

    #[test]
    fn update_existing_key_does_not_grow_count() {
        let arena = Arena::new();
        let table = Table::new(&arena);
        table.insert("a", Value::Int(1));
        table.insert("a", Value::Int(2));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("a"), Some(Value::Int(2)));
    }

    #[test]
    fn del_removes_entry() {
        let arena = Arena::new();
        let table = Table::new(&arena);
        table.insert("a", Value::Int(1));
        assert!(table.del("a"));
        assert_eq!(table.get("a"), None);
        assert_eq!(table.len(), 0);
    }
}
