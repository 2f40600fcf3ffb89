//! L4: fixed-width record helpers — binary-comparable fixed strings and the
//! small composite-key pattern the domain layer builds its keys from.
//!
//! Both types are plain old data: `Copy`, fixed-size, and comparable by their
//! raw bytes, so they can be written into a node's key array with
//! `std::mem::size_of` and read back with no further parsing. This mirrors
//! `examples/original_source/STLite`'s `my::string<N>`, generalized from a
//! template parameter to a Rust const generic.

use std::fmt;

/// A zero-padded, fixed-capacity byte string of `L` bytes, ordered the same
/// way a C string compares under `memcmp`: byte-for-byte, with the trailing
/// zero padding naturally sorting before any non-zero suffix.
///
/// `L` bounds the longest string the type can hold; construction truncates
/// longer input the same way the original's fixed-size member array would
/// silently overflow if not bounds-checked by the caller. Callers that care
/// should check `s.len() <= L` themselves before constructing.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FixedString<const L: usize> {
    bytes: [u8; L],
}

impl<const L: usize> FixedString<L> {
    /// Builds a zero-padded fixed string from a `str`, truncating to `L` bytes
    /// if the input is longer.
    pub fn new(s: &str) -> Self {
        let mut bytes = [0u8; L];
        let src = s.as_bytes();
        let n = src.len().min(L);
        bytes[..n].copy_from_slice(&src[..n]);
        Self { bytes }
    }

    /// The raw zero-padded byte representation, suitable for writing directly
    /// into a node's key slot.
    pub fn as_bytes(&self) -> &[u8; L] {
        &self.bytes
    }

    /// Reconstructs a `FixedString` from its raw byte representation.
    pub fn from_bytes(bytes: [u8; L]) -> Self {
        Self { bytes }
    }

    /// The non-padding prefix, as a `str`. Panics if the stored bytes are not
    /// valid UTF-8 up to the first zero byte — true for any value built via
    /// `new`.
    pub fn as_str(&self) -> &str {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(L);
        std::str::from_utf8(&self.bytes[..end]).expect("FixedString content is not valid UTF-8")
    }

    /// A stable 32-bit hash over the padded byte content, usable as a bucket
    /// index for a higher-layer hash map (e.g. the station-lookup inverted
    /// index). Stable across process runs and platforms, unlike `Hash`/
    /// `DefaultHasher`, since it is not seeded.
    pub fn stable_hash(&self) -> u32 {
        // FNV-1a: small, dependency-free, and deterministic — appropriate for
        // an on-disk bucket index where a randomized hasher would silently
        // break compatibility across runs.
        let mut h: u32 = 0x811c_9dc5;
        for &b in &self.bytes {
            h ^= b as u32;
            h = h.wrapping_mul(0x0100_0193);
        }
        h
    }
}

impl<const L: usize> fmt::Debug for FixedString<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedString({:?})", self.as_str())
    }
}

impl<const L: usize> Default for FixedString<L> {
    fn default() -> Self {
        Self { bytes: [0u8; L] }
    }
}

/// A binary-copyable composite key ordered lexicographically by its two
/// components — the `(trainId, date)`-shaped key §4.5 calls out. Plain field
/// order gives the right `Ord` for free via `derive`.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Composite<A, B> {
    pub primary: A,
    pub secondary: B,
}

impl<A, B> Composite<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let s = FixedString::<20>::new("SJTU");
        let bytes = *s.as_bytes();
        let back = FixedString::<20>::from_bytes(bytes);
        assert_eq!(s, back);
        assert_eq!(back.as_str(), "SJTU");
    }

    #[test]
    fn truncates_overlong_input() {
        let s = FixedString::<4>::new("hello");
        assert_eq!(s.as_str(), "hell");
    }

    #[test]
    fn orders_like_memcmp() {
        let a = FixedString::<8>::new("alice");
        let b = FixedString::<8>::new("bob");
        assert!(a < b);
        assert_eq!(FixedString::<8>::new("alice"), a);
    }

    #[test]
    fn composite_orders_primary_then_secondary() {
        let a = Composite::new(1u32, 100u32);
        let b = Composite::new(1u32, 200u32);
        let c = Composite::new(2u32, 0u32);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn stable_hash_is_deterministic() {
        let s = FixedString::<16>::new("Beijing");
        assert_eq!(s.stable_hash(), FixedString::<16>::new("Beijing").stable_hash());
    }
}
