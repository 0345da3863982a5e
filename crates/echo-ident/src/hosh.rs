// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Content identities with ordered/unordered composition.

use std::fmt;
use std::ops::{Div, Mul};

use blake3::Hasher;

/// Width of the canonical byte encoding of a [`Hosh`].
pub const HOSH_LEN: usize = 32;

/// Composition semantics of an identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Etype {
    /// Composes commutatively with other unordered identities (field
    /// insertions, independent facts).
    Unordered,
    /// Order-sensitive (sequence-dependent steps such as function
    /// applications).
    Ordered,
}

/// Opaque composable content identity.
///
/// Internally an affine map `v ↦ mul·v + add` over `Z/2^128` with odd `mul`.
/// Use [`Hosh::ordered_from`] / [`Hosh::unordered_from`] to mint identities
/// from content, `*` (or [`Hosh::compose`]) to combine them and `/` (or
/// [`Hosh::decompose`]) to take a right factor back out.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hosh {
    mul: u128,
    add: u128,
}

impl Hosh {
    /// Neutral element: `compose(IDENTITY, h) == h == compose(h, IDENTITY)`.
    pub const IDENTITY: Self = Self { mul: 1, add: 0 };

    /// Mints an unordered identity from a 32-byte digest.
    pub fn unordered(digest: &[u8; 32]) -> Self {
        Self {
            mul: 1,
            add: u128_le(&digest[..16]),
        }
    }

    /// Mints an ordered identity from a 32-byte digest.
    pub fn ordered(digest: &[u8; 32]) -> Self {
        let mut mul = u128_le(&digest[..16]) | 1;
        if mul == 1 {
            // m = 1 is reserved for the unordered subgroup.
            mul = 3;
        }
        Self {
            mul,
            add: u128_le(&digest[16..]),
        }
    }

    /// Domain-separated unordered identity: `blake3(domain || ":" || bytes)`.
    pub fn unordered_from(domain: &str, bytes: &[u8]) -> Self {
        Self::unordered(&domain_digest(domain, bytes))
    }

    /// Domain-separated ordered identity: `blake3(domain || ":" || bytes)`.
    pub fn ordered_from(domain: &str, bytes: &[u8]) -> Self {
        Self::ordered(&domain_digest(domain, bytes))
    }

    /// Composition semantics of this identity.
    pub fn etype(&self) -> Etype {
        if self.mul == 1 {
            Etype::Unordered
        } else {
            Etype::Ordered
        }
    }

    /// Returns `true` for identities in the commutative subgroup.
    pub fn is_unordered(&self) -> bool {
        self.etype() == Etype::Unordered
    }

    /// `self` followed by `next`. Associative; commutative when both operands
    /// are unordered.
    pub fn compose(self, next: Self) -> Self {
        Self {
            mul: self.mul.wrapping_mul(next.mul),
            add: next.mul.wrapping_mul(self.add).wrapping_add(next.add),
        }
    }

    /// Exact inverse of [`compose`](Self::compose):
    /// `a.compose(b).decompose(b) == a`.
    pub fn decompose(self, tail: Self) -> Self {
        self.compose(tail.inverse())
    }

    /// Group inverse.
    pub fn inverse(self) -> Self {
        let inv = inverse_odd(self.mul);
        Self {
            mul: inv,
            add: self.add.wrapping_mul(inv).wrapping_neg(),
        }
    }

    /// Canonical 32-byte encoding (`mul` then `add`, little-endian).
    pub fn to_bytes(&self) -> [u8; HOSH_LEN] {
        let mut out = [0u8; HOSH_LEN];
        out[..16].copy_from_slice(&self.mul.to_le_bytes());
        out[16..].copy_from_slice(&self.add.to_le_bytes());
        out
    }

    /// Decodes the canonical encoding. Returns `None` when `mul` is even
    /// (not a group element).
    pub fn from_bytes(bytes: &[u8; HOSH_LEN]) -> Option<Self> {
        let mul = u128_le(&bytes[..16]);
        if mul & 1 == 0 {
            return None;
        }
        Some(Self {
            mul,
            add: u128_le(&bytes[16..]),
        })
    }

    /// Textual id: `_` (unordered) or `.` (ordered) followed by hex.
    ///
    /// Unordered ids only carry the translation half since `mul` is fixed.
    pub fn id(&self) -> String {
        match self.etype() {
            Etype::Unordered => format!("_{}", hex::encode(self.add.to_le_bytes())),
            Etype::Ordered => format!(".{}", hex::encode(self.to_bytes())),
        }
    }

    /// First 8 hex digits of [`id`](Self::id), prefix included, for logs.
    pub fn short(&self) -> String {
        self.id().chars().take(9).collect()
    }
}

impl Default for Hosh {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Hosh {
    type Output = Hosh;

    fn mul(self, rhs: Hosh) -> Hosh {
        self.compose(rhs)
    }
}

impl Div for Hosh {
    type Output = Hosh;

    fn div(self, rhs: Hosh) -> Hosh {
        self.decompose(rhs)
    }
}

impl fmt::Display for Hosh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl fmt::Debug for Hosh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hosh({})", self.short())
    }
}

fn domain_digest(domain: &str, bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(domain.as_bytes());
    hasher.update(b":");
    hasher.update(bytes);
    hasher.finalize().into()
}

fn u128_le(bytes: &[u8]) -> u128 {
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&bytes[..16]);
    u128::from_le_bytes(buf)
}

/// Multiplicative inverse of an odd number modulo 2^128 (Newton iteration;
/// each round doubles the number of correct low bits, starting from 3).
fn inverse_odd(a: u128) -> u128 {
    let mut x = a;
    for _ in 0..7 {
        x = x.wrapping_mul(2u128.wrapping_sub(a.wrapping_mul(x)));
    }
    x
}
