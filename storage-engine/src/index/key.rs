//! Key abstraction for B+ tree indexes.
//!
//! The original `KeyType`/`IndexKey` pair dispatched on a runtime enum with a
//! `Varchar` variant sized by a `max_length` field. That's the right design
//! when an index's key type is chosen at schema time and stored in a system
//! catalog; this crate's indexes are generic over a compile-time key type
//! instead (`SPEC_FULL.md` §4.5's fixed-width record requirement), so the
//! enum collapses into a trait every fixed-width key type implements once.
//! This is a deliberate generalization recorded in `DESIGN.md`.

use std::cmp::Ordering;

use common::fixed::{Composite, FixedString};

/// A key that can live inside a B+ tree node: fixed-width, totally ordered,
/// and trivially copyable in and out of a page buffer.
pub trait IndexKey: Ord + Copy + 'static {
    /// Fixed on-disk size of one key, in bytes.
    const SIZE: usize;

    /// Serializes `self` into `buf`, which is exactly `Self::SIZE` bytes.
    fn write_to(&self, buf: &mut [u8]);

    /// Deserializes a key from exactly `Self::SIZE` bytes.
    fn read_from(buf: &[u8]) -> Self;
}

impl IndexKey for i32 {
    const SIZE: usize = 4;
    fn write_to(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.to_ne_bytes());
    }
    fn read_from(buf: &[u8]) -> Self {
        i32::from_ne_bytes(buf[..4].try_into().unwrap())
    }
}

impl IndexKey for i64 {
    const SIZE: usize = 8;
    fn write_to(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.to_ne_bytes());
    }
    fn read_from(buf: &[u8]) -> Self {
        i64::from_ne_bytes(buf[..8].try_into().unwrap())
    }
}

impl<const L: usize> IndexKey for FixedString<L> {
    const SIZE: usize = L;
    fn write_to(&self, buf: &mut [u8]) {
        buf[..L].copy_from_slice(self.as_bytes());
    }
    fn read_from(buf: &[u8]) -> Self {
        let mut bytes = [0u8; L];
        bytes.copy_from_slice(&buf[..L]);
        FixedString::from_bytes(bytes)
    }
}

impl<A: IndexKey, B: IndexKey> IndexKey for Composite<A, B> {
    const SIZE: usize = A::SIZE + B::SIZE;
    fn write_to(&self, buf: &mut [u8]) {
        self.primary.write_to(&mut buf[..A::SIZE]);
        self.secondary.write_to(&mut buf[A::SIZE..A::SIZE + B::SIZE]);
    }
    fn read_from(buf: &[u8]) -> Self {
        Composite {
            primary: A::read_from(&buf[..A::SIZE]),
            secondary: B::read_from(&buf[A::SIZE..A::SIZE + B::SIZE]),
        }
    }
}

/// Re-exported purely so callers can write `index::key::cmp` without pulling
/// in `std::cmp::Ordering` themselves; kept tiny since most ordering goes
/// through `Ord` directly.
pub fn compare<K: IndexKey>(a: &K, b: &K) -> Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_key_round_trips() {
        let mut buf = [0u8; 4];
        42i32.write_to(&mut buf);
        assert_eq!(i32::read_from(&buf), 42);
    }

    #[test]
    fn fixed_string_key_round_trips() {
        let key: FixedString<16> = FixedString::new("hello");
        let mut buf = [0u8; 16];
        key.write_to(&mut buf);
        assert_eq!(FixedString::<16>::read_from(&buf), key);
    }

    #[test]
    fn composite_key_orders_primary_then_secondary() {
        type K = Composite<FixedString<8>, i32>;
        let a = K { primary: FixedString::new("x"), secondary: 3 };
        let b = K { primary: FixedString::new("x"), secondary: 1 };
        let c = K { primary: FixedString::new("y"), secondary: 0 };
        assert_eq!(compare(&b, &a), Ordering::Less);
        assert_eq!(compare(&a, &c), Ordering::Less);
    }

    #[test]
    fn composite_key_round_trips_through_bytes() {
        type K = Composite<FixedString<8>, i32>;
        let key = K { primary: FixedString::new("seat"), secondary: 7 };
        let mut buf = [0u8; <K as IndexKey>::SIZE];
        key.write_to(&mut buf);
        assert_eq!(K::read_from(&buf), key);
    }
}
