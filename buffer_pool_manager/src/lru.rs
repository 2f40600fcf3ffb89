//! A doubly-linked-list-through-parallel-arrays LRU index, shared by the node
//! cache and the value cache below. Grounded in
//! `examples/original_source/B+Tree/cache.h`'s `Cache<T, N>`/`InterCache<T, N>`:
//! `pre`/`to` arrays thread a list of slot indices, `head`/`tail` mark the
//! MRU/LRU ends, and a hash map from key to slot index gives O(1) lookup.
//!
//! Unlike the teacher's `ActorBufferPoolManager`, there is no clock hand and
//! no reference-bit approximation: eviction always takes the true LRU slot,
//! matching the spec's explicit "evicts least-recently-used" requirement.

use std::collections::HashMap;
use std::hash::Hash;

const NIL: i64 = -1;

/// Fixed-capacity LRU slot bookkeeping over keys of type `K`. Does not own
/// the slot payloads itself — callers keep a parallel `Vec` indexed the same
/// way and consult this structure purely for ordering and slot assignment.
pub struct LruIndex<K> {
    capacity: usize,
    size: usize,
    head: i64,
    tail: i64,
    pre: Vec<i64>,
    to: Vec<i64>,
    slot_key: Vec<Option<K>>,
    key_to_slot: HashMap<K, usize>,
}

impl<K: Eq + Hash + Copy> LruIndex<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            size: 0,
            head: NIL,
            tail: NIL,
            pre: vec![NIL; capacity],
            to: vec![NIL; capacity],
            slot_key: vec![None; capacity],
            key_to_slot: HashMap::new(),
        }
    }

    pub fn slot_of(&self, key: &K) -> Option<usize> {
        self.key_to_slot.get(key).copied()
    }

    /// Moves an already-resident slot to the MRU end (`head`).
    pub fn touch(&mut self, slot: usize) {
        if self.head == slot as i64 {
            return;
        }
        let p = self.pre[slot];
        let n = self.to[slot];
        if p != NIL {
            self.to[p as usize] = n;
        }
        if n != NIL {
            self.pre[n as usize] = p;
        }
        if self.tail == slot as i64 {
            self.tail = p;
        }
        self.pre[slot] = NIL;
        self.to[slot] = self.head;
        if self.head != NIL {
            self.pre[self.head as usize] = slot as i64;
        }
        self.head = slot as i64;
    }

    /// Assigns `key` a slot, evicting the LRU entry if the index is already
    /// at capacity. Returns `(slot, evicted_key)`; `evicted_key` is `Some`
    /// when a resident entry had to be displaced, so the caller can flush it
    /// before overwriting the slot's payload.
    pub fn admit(&mut self, key: K) -> (usize, Option<K>) {
        if self.size == self.capacity {
            let victim = self.tail as usize;
            let evicted_key = self.slot_key[victim].take();
            if let Some(k) = evicted_key {
                self.key_to_slot.remove(&k);
            }
            self.tail = self.pre[victim];
            if self.tail != NIL {
                self.to[self.tail as usize] = NIL;
            } else {
                self.head = NIL;
            }
            self.pre[victim] = NIL;
            self.to[victim] = self.head;
            if self.head != NIL {
                self.pre[self.head as usize] = victim as i64;
            }
            self.head = victim as i64;
            self.slot_key[victim] = Some(key);
            self.key_to_slot.insert(key, victim);
            (victim, evicted_key)
        } else {
            let slot = self.size;
            self.size += 1;
            self.pre[slot] = NIL;
            self.to[slot] = self.head;
            if self.head != NIL {
                self.pre[self.head as usize] = slot as i64;
            } else {
                self.tail = slot as i64;
            }
            self.head = slot as i64;
            self.slot_key[slot] = Some(key);
            self.key_to_slot.insert(key, slot);
            (slot, None)
        }
    }

    /// Removes `key` from the index entirely, without evicting anything into
    /// its place. Used by `clear`.
    pub fn reset(&mut self) {
        self.size = 0;
        self.head = NIL;
        self.tail = NIL;
        self.pre.iter_mut().for_each(|p| *p = NIL);
        self.to.iter_mut().for_each(|t| *t = NIL);
        self.slot_key.iter_mut().for_each(|k| *k = None);
        self.key_to_slot.clear();
    }

    /// All currently resident `(key, slot)` pairs, in no particular order —
    /// used by `flush_all`.
    pub fn resident(&self) -> impl Iterator<Item = (K, usize)> + '_ {
        self.key_to_slot.iter().map(|(&k, &s)| (k, s))
    }
}
