//! A small insertion-order-preserving map, keyed by `String`.
//!
//! Stack-offset assignment (spec §8: "Stack slot offsets are a function of FunctionStack
//! contents only... deterministic under renaming of locals that preserves declaration
//! order") and the deterministic-assembly invariant both forbid iterating symbol tables
//! in hash order. `hashbrown::HashMap` (kept from the teacher crate for symbol lookups
//! that don't need to be walked in order) is exactly wrong for that one use, so this
//! type exists alongside it rather than in place of it.
use hashbrown::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedMap<V> {
    keys: Vec<String>,
    index: HashMap<String, usize>,
    values: Vec<V>,
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        OrderedMap { keys: Vec::new(), index: HashMap::new(), values: Vec::new() }
    }

    /// Inserts or overwrites `key`; overwriting keeps its original declaration-order
    /// position, which is never actually exercised (every caller checks `contains_key`
    /// for redeclaration before calling this) but keeps the type honest.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        if let Some(&i) = self.index.get(&key) {
            self.values[i] = value;
        } else {
            self.index.insert(key.clone(), self.values.len());
            self.keys.push(key);
            self.values.push(value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&i| &self.values[i])
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.index.get(key).copied().map(move |i| &mut self.values[i])
    }

    pub fn contains_key(&self, key: &str) -> bool { self.index.contains_key(key) }

    pub fn len(&self) -> usize { self.values.len() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn keys(&self) -> impl Iterator<Item = &str> { self.keys.iter().map(String::as_str) }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.keys.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn last(&self) -> Option<(&str, &V)> {
        self.keys.last().map(|k| (k.as_str(), self.values.last().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order_under_renaming() {
        let mut m: OrderedMap<i32> = OrderedMap::new();
        m.insert("z", 1);
        m.insert("a", 2);
        m.insert("m", 3);
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
    }
}
