// SparseTable<T>: slot storage with a hash-bucket index (TSet/TMap layout).
//
// Slots are stable across removals (freed slots are reused), and lookups only
// consult the bucket index. Mutating an element in place changes its hash
// without moving it to another bucket, so callers that mutate keys must call
// `rehash` before the next lookup.

use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct SparseTable<T> {
    slots: Vec<Option<T>>,
    hashes: Vec<u32>,
    free: Vec<usize>,
    buckets: HashMap<u32, Vec<usize>>,
    len: usize,
}

impl<T> Default for SparseTable<T> {
    fn default() -> Self {
        SparseTable {
            slots: Vec::new(),
            hashes: Vec::new(),
            free: Vec::new(),
            buckets: HashMap::new(),
            len: 0,
        }
    }
}

impl<T> SparseTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of valid elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the highest slot index ever used.
    pub fn max_index(&self) -> usize {
        self.slots.len()
    }

    pub fn is_valid_index(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Insert `item` under `hash`. Does not check for duplicates.
    pub fn add(&mut self, item: T, hash: u32) -> usize {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(item);
                self.hashes[index] = hash;
                index
            }
            None => {
                self.slots.push(Some(item));
                self.hashes.push(hash);
                self.slots.len() - 1
            }
        };
        self.buckets.entry(hash).or_default().push(index);
        self.len += 1;
        index
    }

    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        let item = self.slots.get_mut(index)?.take()?;
        let hash = self.hashes[index];
        if let Some(bucket) = self.buckets.get_mut(&hash) {
            bucket.retain(|&i| i != index);
            if bucket.is_empty() {
                self.buckets.remove(&hash);
            }
        }
        self.free.push(index);
        self.len -= 1;
        Some(item)
    }

    /// Find the slot in `hash`'s bucket whose element satisfies `pred`.
    pub fn find_by(&self, hash: u32, pred: impl Fn(&T) -> bool) -> Option<usize> {
        self.buckets.get(&hash)?.iter().copied().find(|&i| {
            self.slots[i].as_ref().is_some_and(|item| pred(item))
        })
    }

    /// Rebuild the bucket index from the current element values.
    pub fn rehash(&mut self, hash_fn: impl Fn(&T) -> u32) {
        self.buckets.clear();
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(item) = slot {
                let hash = hash_fn(item);
                self.hashes[index] = hash;
                self.buckets.entry(hash).or_default().push(index);
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.hashes.clear();
        self.free.clear();
        self.buckets.clear();
        self.len = 0;
    }

    /// First valid slot index, in slot order.
    pub fn first_index(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_some)
    }

    /// Iterate valid `(slot, element)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.as_ref().map(|item| (i, item)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| s.as_mut().map(|item| (i, item)))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}

// Equality is by contents, independent of slot layout.
impl<T: PartialEq> PartialEq for SparseTable<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.values().all(|item| other.values().any(|o| o == item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(v: &i32) -> u32 {
        *v as u32
    }

    #[test]
    fn add_find_remove_reuses_slots() {
        let mut t = SparseTable::new();
        let a = t.add(10, h(&10));
        let b = t.add(20, h(&20));
        assert_eq!(t.find_by(20, |v| *v == 20), Some(b));
        assert_eq!(t.remove_at(a), Some(10));
        assert!(!t.is_valid_index(a));
        assert_eq!(t.len(), 1);
        let c = t.add(30, h(&30));
        assert_eq!(c, a);
        assert_eq!(t.max_index(), 2);
    }

    #[test]
    fn mutated_key_is_lost_until_rehash() {
        let mut t = SparseTable::new();
        let i = t.add(1, h(&1));
        *t.get_mut(i).unwrap() = 5;
        assert_eq!(t.find_by(h(&5), |v| *v == 5), None);
        t.rehash(h);
        assert_eq!(t.find_by(h(&5), |v| *v == 5), Some(i));
        assert_eq!(t.find_by(h(&1), |v| *v == 1), None);
    }

    #[test]
    fn equality_ignores_layout() {
        let mut a = SparseTable::new();
        a.add(1, 1);
        a.add(2, 2);
        let mut b = SparseTable::new();
        let x = b.add(9, 9);
        b.add(2, 2);
        b.remove_at(x);
        b.add(1, 1);
        assert_eq!(a, b);
    }
}
