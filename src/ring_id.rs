use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigUint;
use serde::{
    de::{Deserializer, Error as DeError, Visitor},
    ser::{Serialize, Serializer},
    Deserialize,
};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// Number of bits in the identifier space. SHA-1 digests are 160 bits wide.
pub const M: usize = 160;

/// Width of an identifier on the wire, in bytes.
pub const ID_BYTES: usize = M / 8;

/// A point on the Chord ring: an unsigned 160-bit integer stored as a
/// fixed-width big-endian byte array.
///
/// Identifiers are derived by hashing a node's network address with SHA-1.
/// All arithmetic wraps modulo 2^160. The derived ordering is the numeric
/// one, since the bytes are big-endian.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RingId([u8; ID_BYTES]);

impl RingId {
    /// Derives the identifier for a network address.
    pub fn hash(address: &str) -> RingId {
        let mut hasher = Sha1::new();
        hasher.update(address.as_bytes());
        RingId(hasher.finalize().into())
    }

    /// Wraps a raw 20-byte big-endian value.
    pub const fn from_bytes(bytes: [u8; ID_BYTES]) -> RingId {
        RingId(bytes)
    }

    /// Decodes an identifier from an RPC payload, which must be exactly
    /// [`ID_BYTES`] long.
    pub fn from_wire(data: &[u8]) -> Result<RingId> {
        let bytes: [u8; ID_BYTES] = data.try_into().map_err(|_| Error::BadLength {
            expected: ID_BYTES,
            got: data.len(),
        })?;
        Ok(RingId(bytes))
    }

    /// The raw big-endian bytes, as carried in RPC payloads.
    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    /// Computes `(self + 2^i) mod 2^160`, the start of finger `i`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `i >= M`.
    pub fn finger_start(&self, i: usize) -> RingId {
        debug_assert!(i < M, "finger index {i} out of range");
        let mut bytes = self.0;
        let mut idx = ID_BYTES - 1 - i / 8;
        let mut carry = u16::from(bytes[idx]) + (1u16 << (i % 8));
        bytes[idx] = carry as u8;
        carry >>= 8;
        while carry > 0 && idx > 0 {
            idx -= 1;
            let sum = u16::from(bytes[idx]) + carry;
            bytes[idx] = sum as u8;
            carry = sum >> 8;
        }
        // A carry out of the top byte wraps around the ring and is dropped.
        RingId(bytes)
    }

    /// `(self + 1) mod 2^160`.
    pub fn wrapping_inc(&self) -> RingId {
        self.finger_start(0)
    }

    /// Tests whether `self` lies in the half-open ring segment
    /// `(start, end]`, respecting wrap-around. A segment whose endpoints
    /// coincide covers the whole ring.
    pub fn in_interval(&self, start: &RingId, end: &RingId) -> bool {
        match start.cmp(end) {
            Ordering::Equal => true,
            Ordering::Less => self > start && self <= end,
            Ordering::Greater => self > start || self <= end,
        }
    }

    /// Tests whether `self` lies strictly inside the open ring segment
    /// `(start, end)`. A segment whose endpoints coincide covers the whole
    /// ring except that single point.
    pub fn in_open_interval(&self, start: &RingId, end: &RingId) -> bool {
        match start.cmp(end) {
            Ordering::Equal => self != start,
            Ordering::Less => self > start && self < end,
            Ordering::Greater => self > start || self < end,
        }
    }
}

impl fmt::Display for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BigUint::from_bytes_be(&self.0))
    }
}

impl fmt::Debug for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

// Identifiers appear inside JSON structures as base-10 decimal strings,
// arbitrary-precision on the wire, fixed-width in memory.
impl Serialize for RingId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BigUint::from_bytes_be(&self.0).to_str_radix(10))
    }
}

struct RingIdVisitor;

impl<'de> Visitor<'de> for RingIdVisitor {
    type Value = RingId;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a base-10 string of at most 160 bits")
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<RingId, E>
    where
        E: DeError,
    {
        let id = BigUint::parse_bytes(value.as_bytes(), 10)
            .ok_or_else(|| E::custom("identifier is not a decimal integer"))?;
        let digits = id.to_bytes_be();
        if digits.len() > ID_BYTES {
            return Err(E::custom("identifier does not fit in 160 bits"));
        }
        let mut bytes = [0u8; ID_BYTES];
        bytes[ID_BYTES - digits.len()..].copy_from_slice(&digits);
        Ok(RingId(bytes))
    }
}

impl<'de> Deserialize<'de> for RingId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<RingId, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(RingIdVisitor)
    }
}
