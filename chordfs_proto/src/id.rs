//! The 160-bit identifier ring.
//!
//! Node and key identifiers are SHA-1 digests read as big-endian unsigned
//! integers. All arithmetic is modulo 2^160, and ordering on the ring is
//! expressed through [`between`] rather than plain comparison.

use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Width of the identifier space in bits (M).
pub const ID_BITS: u32 = 160;
/// Width of the identifier space in bytes.
pub const ID_BYTES: usize = (ID_BITS / 8) as usize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("identifier must be 20 bytes, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex identifier: {0}")]
    InvalidHex(String),
}

/// A point on the ring, stored big-endian so the derived ordering is numeric.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Id([u8; ID_BYTES]);

impl Id {
    pub const ZERO: Id = Id([0; ID_BYTES]);
    pub const MAX: Id = Id([0xff; ID_BYTES]);

    pub fn from_bytes(bytes: [u8; ID_BYTES]) -> Self {
        Id(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// `(self + other) mod 2^160`.
    pub fn wrapping_add(&self, other: &Id) -> Id {
        let mut out = [0u8; ID_BYTES];
        let mut carry = 0u16;
        for i in (0..ID_BYTES).rev() {
            let sum = self.0[i] as u16 + other.0[i] as u16 + carry;
            out[i] = sum as u8;
            carry = sum >> 8;
        }
        Id(out)
    }

    /// `(self - other) mod 2^160`, i.e. the clockwise distance from `other` to `self`.
    pub fn wrapping_sub(&self, other: &Id) -> Id {
        let mut out = [0u8; ID_BYTES];
        let mut borrow = 0i16;
        for i in (0..ID_BYTES).rev() {
            let mut diff = self.0[i] as i16 - other.0[i] as i16 - borrow;
            borrow = 0;
            if diff < 0 {
                diff += 256;
                borrow = 1;
            }
            out[i] = diff as u8;
        }
        Id(out)
    }

    /// `2^exp mod 2^160`.
    pub fn pow2(exp: u32) -> Id {
        let mut out = [0u8; ID_BYTES];
        if exp < ID_BITS {
            let byte = ID_BYTES - 1 - (exp / 8) as usize;
            out[byte] = 1 << (exp % 8);
        }
        Id(out)
    }

    /// Start of finger `index` (1-based): `(self + 2^(index-1)) mod 2^160`.
    pub fn finger_start(&self, index: u32) -> Id {
        debug_assert!((1..=ID_BITS).contains(&index), "finger index out of range");
        self.wrapping_add(&Id::pow2(index - 1))
    }

    /// First eight hex digits, enough to tell nodes apart in logs.
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        let mut out = [0u8; ID_BYTES];
        out[ID_BYTES - 8..].copy_from_slice(&value.to_be_bytes());
        Id(out)
    }
}

impl TryFrom<&[u8]> for Id {
    type Error = IdError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; ID_BYTES] = bytes
            .try_into()
            .map_err(|_| IdError::InvalidLength(bytes.len()))?;
        Ok(Id(arr))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

/// Parses up to 40 hex digits; shorter strings are zero-extended on the left.
impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches("0x");
        if digits.is_empty()
            || digits.len() > ID_BYTES * 2
            || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(IdError::InvalidHex(s.to_string()));
        }
        let padded = format!("{:0>width$}", digits, width = ID_BYTES * 2);
        let mut out = [0u8; ID_BYTES];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&padded[i * 2..i * 2 + 2], 16)
                .map_err(|_| IdError::InvalidHex(s.to_string()))?;
        }
        Ok(Id(out))
    }
}

/// SHA-1 of `data`, read as a big-endian 160-bit integer.
pub fn hash(data: impl AsRef<[u8]>) -> Id {
    let digest = Sha1::digest(data.as_ref());
    let mut out = [0u8; ID_BYTES];
    out.copy_from_slice(&digest);
    Id(out)
}

/// True iff walking clockwise from `start`, `x` is met strictly before `end`,
/// or at `end` when `inclusive_end` is set.
///
/// When `end <= start` the arc wraps through zero, so `start == end` covers
/// the whole ring except `start` itself.
pub fn between(start: &Id, x: &Id, end: &Id, inclusive_end: bool) -> bool {
    if inclusive_end && x == end {
        return true;
    }
    if end > start {
        start < x && x < end
    } else {
        start < x || x < end
    }
}
