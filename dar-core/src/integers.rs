// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An unbounded non-negative integer, used anywhere a count, size, or
//! offset may exceed 64 bits: slice payload sizes, catalogue entry sizes,
//! archive dates. Dumped on disk as a variable-length big-endian encoding
//! (see the module-level doc on [`encoding`]) so that no fixed ceiling is
//! ever baked into the archive format.
//!
//! Internally this wraps a `Vec<u32>` of big-endian "limbs", most
//! significant limb first, with no leading zero limbs (the canonical
//! form of zero is an empty vector).

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Rem, Sub};

use crate::error::{DarError, Result};

#[derive(Clone, Eq, PartialEq, Default)]
pub struct Infinint {
    // Big-endian limbs, most significant first, no leading zeros.
    limbs: Vec<u32>,
}

impl Infinint {
    pub fn zero() -> Infinint {
        Infinint { limbs: Vec::new() }
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.is_empty()
    }

    fn normalize(mut limbs: Vec<u32>) -> Infinint {
        while limbs.first() == Some(&0) {
            limbs.remove(0);
        }
        Infinint { limbs }
    }

    pub fn checked_add(&self, other: &Infinint) -> Infinint {
        let mut result = Vec::new();
        let mut carry: u64 = 0;
        let a = self.limbs.iter().rev();
        let mut b = other.limbs.iter().rev();
        for x in a {
            let y = b.next().copied().unwrap_or(0);
            let sum = *x as u64 + y as u64 + carry;
            result.push((sum & 0xffff_ffff) as u32);
            carry = sum >> 32;
        }
        for y in b {
            let sum = *y as u64 + carry;
            result.push((sum & 0xffff_ffff) as u32);
            carry = sum >> 32;
        }
        if carry != 0 {
            result.push(carry as u32);
        }
        result.reverse();
        Infinint::normalize(result)
    }

    /// Subtracts `other` from `self`. Saturates at zero: the archive
    /// format never represents negative sizes, and callers that need to
    /// detect underflow should compare operands with `cmp` first.
    pub fn saturating_sub(&self, other: &Infinint) -> Infinint {
        if *self < *other {
            return Infinint::zero();
        }
        let mut result = Vec::new();
        let mut borrow: i64 = 0;
        let a: Vec<u32> = self.limbs.iter().rev().copied().collect();
        let b: Vec<u32> = other.limbs.iter().rev().copied().collect();
        for i in 0..a.len() {
            let x = a[i] as i64;
            let y = *b.get(i).unwrap_or(&0) as i64;
            let mut diff = x - y - borrow;
            if diff < 0 {
                diff += 1 << 32;
                borrow = 1;
            } else {
                borrow = 0;
            }
            result.push(diff as u32);
        }
        result.reverse();
        Infinint::normalize(result)
    }

    pub fn checked_mul(&self, other: &Infinint) -> Infinint {
        if self.is_zero() || other.is_zero() {
            return Infinint::zero();
        }
        let a: Vec<u32> = self.limbs.iter().rev().copied().collect();
        let b: Vec<u32> = other.limbs.iter().rev().copied().collect();
        let mut acc = vec![0u64; a.len() + b.len()];
        for (i, &x) in a.iter().enumerate() {
            let mut carry = 0u64;
            for (j, &y) in b.iter().enumerate() {
                let prod = x as u64 * y as u64 + acc[i + j] + carry;
                acc[i + j] = prod & 0xffff_ffff;
                carry = prod >> 32;
            }
            acc[i + b.len()] += carry;
        }
        let mut result: Vec<u32> = acc.into_iter().map(|v| v as u32).collect();
        result.reverse();
        Infinint::normalize(result)
    }

    /// Divides by a small, nonzero divisor, returning (quotient, remainder).
    /// This engine only ever divides infinints by machine-sized values
    /// (e.g. slice count math), so a long-division-by-u64 is sufficient.
    pub fn div_rem_u64(&self, divisor: u64) -> (Infinint, u64) {
        assert!(divisor != 0);
        let mut quotient_limbs = Vec::with_capacity(self.limbs.len());
        let mut rem: u64 = 0;
        for &limb in &self.limbs {
            let cur = (rem << 32) | limb as u64;
            quotient_limbs.push((cur / divisor) as u32);
            rem = cur % divisor;
        }
        (Infinint::normalize(quotient_limbs), rem)
    }

    /// Moves as many low bits as fit into a `u64`, leaving the remainder
    /// (if any) in a new `Infinint`. Mirrors the "unstack" primitive the
    /// specification calls out explicitly.
    pub fn unstack(&self) -> (u64, Infinint) {
        if self.limbs.len() <= 2 {
            return (self.to_u64().unwrap_or(u64::MAX), Infinint::zero());
        }
        let tail = &self.limbs[self.limbs.len() - 2..];
        let low = ((tail[0] as u64) << 32) | tail[1] as u64;
        let rest = self.limbs[..self.limbs.len() - 2].to_vec();
        (low, Infinint::normalize(rest))
    }

    pub fn to_u64(&self) -> Option<u64> {
        if self.limbs.len() > 2 {
            return None;
        }
        let mut v: u64 = 0;
        for &limb in &self.limbs {
            v = (v << 32) | limb as u64;
        }
        Some(v)
    }

    pub fn to_usize(&self) -> Option<usize> {
        self.to_u64().and_then(|v| usize::try_from(v).ok())
    }

    /// Encodes this value per §6: a prefix byte whose population count
    /// gives the number of payload bytes that follow; when the prefix is
    /// all-ones, the scheme recurses (the next byte is itself a length
    /// prefix). This yields O(log N) bytes with no fixed ceiling.
    pub fn dump(&self) -> Vec<u8> {
        let mut be_bytes: Vec<u8> = Vec::new();
        for &limb in &self.limbs {
            be_bytes.extend_from_slice(&limb.to_be_bytes());
        }
        while be_bytes.first() == Some(&0) {
            be_bytes.remove(0);
        }
        let mut out = Vec::new();
        encode_length_prefixed(be_bytes.len(), &mut out);
        out.extend_from_slice(&be_bytes);
        out
    }

    pub fn load(bytes: &[u8]) -> Result<(Infinint, usize)> {
        let (len, mut consumed) = decode_length_prefix(bytes)?;
        if bytes.len() < consumed + len {
            return Err(DarError::Data("truncated infinint".into()));
        }
        let payload = &bytes[consumed..consumed + len];
        consumed += len;
        let mut padded = vec![0u8; (4 - payload.len() % 4) % 4];
        padded.extend_from_slice(payload);
        let mut limbs = Vec::with_capacity(padded.len() / 4);
        for chunk in padded.chunks_exact(4) {
            limbs.push(u32::from_be_bytes(chunk.try_into().unwrap()));
        }
        Ok((Infinint::normalize(limbs), consumed))
    }
}

/// Encodes a byte length as the recursive population-count prefix
/// described in §6.
fn encode_length_prefixed(mut len: usize, out: &mut Vec<u8>) {
    // Bytes needed to hold `len` bits of "how many payload bytes".
    // A prefix byte whose top `k` bits are set and the rest clear means
    // "`k` payload bytes follow"; 0xFF recurses into the next byte.
    loop {
        if len < 8 {
            out.push(prefix_for_count(len));
            return;
        }
        out.push(0xFF);
        len -= 7;
    }
}

fn prefix_for_count(count: usize) -> u8 {
    // `count` ones followed by zeros, e.g. count=3 -> 0b1110_0000.
    debug_assert!(count < 8);
    if count == 0 {
        0u8
    } else {
        (!0u8) << (8 - count)
    }
}

fn decode_length_prefix(bytes: &[u8]) -> Result<(usize, usize)> {
    let mut total = 0usize;
    let mut consumed = 0usize;
    loop {
        let b = *bytes
            .get(consumed)
            .ok_or_else(|| DarError::Data("truncated infinint prefix".into()))?;
        consumed += 1;
        if b == 0xFF {
            total += 7;
            continue;
        }
        total += b.leading_ones() as usize;
        return Ok((total, consumed));
    }
}

impl Ord for Infinint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.limbs
            .len()
            .cmp(&other.limbs.len())
            .then_with(|| self.limbs.cmp(&other.limbs))
    }
}

impl PartialOrd for Infinint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for &Infinint {
    type Output = Infinint;
    fn add(self, rhs: &Infinint) -> Infinint {
        self.checked_add(rhs)
    }
}

impl Sub for &Infinint {
    type Output = Infinint;
    fn sub(self, rhs: &Infinint) -> Infinint {
        self.saturating_sub(rhs)
    }
}

impl Mul for &Infinint {
    type Output = Infinint;
    fn mul(self, rhs: &Infinint) -> Infinint {
        self.checked_mul(rhs)
    }
}

impl Div<u64> for &Infinint {
    type Output = Infinint;
    fn div(self, rhs: u64) -> Infinint {
        self.div_rem_u64(rhs).0
    }
}

impl Rem<u64> for &Infinint {
    type Output = u64;
    fn rem(self, rhs: u64) -> u64 {
        self.div_rem_u64(rhs).1
    }
}

impl From<u64> for Infinint {
    fn from(v: u64) -> Infinint {
        if v == 0 {
            return Infinint::zero();
        }
        let hi = (v >> 32) as u32;
        let lo = (v & 0xffff_ffff) as u32;
        let mut limbs = Vec::new();
        if hi != 0 {
            limbs.push(hi);
        }
        limbs.push(lo);
        Infinint::normalize(limbs)
    }
}

impl From<usize> for Infinint {
    fn from(v: usize) -> Infinint {
        Infinint::from(v as u64)
    }
}

impl fmt::Debug for Infinint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Infinint({})", self)
    }
}

impl fmt::Display for Infinint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v) = self.to_u64() {
            write!(f, "{v}")
        } else {
            // Slow decimal conversion for values wider than u64; this
            // engine only needs it for diagnostics on pathological sizes.
            let mut digits = Vec::new();
            let mut cur = self.clone();
            if cur.is_zero() {
                digits.push(b'0');
            }
            while !cur.is_zero() {
                let (q, r) = cur.div_rem_u64(10);
                digits.push(b'0' + r as u8);
                cur = q;
            }
            digits.reverse();
            write!(f, "{}", String::from_utf8(digits).unwrap())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_small_values() {
        for v in [0u64, 1, 7, 8, 127, 128, 255, 256, 1_000_000, u64::MAX] {
            let n = Infinint::from(v);
            let bytes = n.dump();
            let (back, consumed) = Infinint::load(&bytes).unwrap();
            assert_eq!(consumed, bytes.len());
            assert_eq!(back.to_u64(), Some(v));
        }
    }

    #[test]
    fn add_sub_mul() {
        let a = Infinint::from(1_000_000u64);
        let b = Infinint::from(3u64);
        assert_eq!(a.checked_add(&b).to_u64(), Some(1_000_003));
        assert_eq!(a.saturating_sub(&b).to_u64(), Some(999_997));
        assert_eq!(a.checked_mul(&b).to_u64(), Some(3_000_000));
        assert_eq!(b.saturating_sub(&a).to_u64(), Some(0));
    }

    #[test]
    fn ordering_matches_value() {
        let small = Infinint::from(5u64);
        let big = Infinint::from(500_000u64);
        assert!(small < big);
        assert_eq!(small.cmp(&small), Ordering::Equal);
    }

    #[test]
    fn unstack_splits_low_bits() {
        let huge = Infinint::from(u64::MAX).checked_add(&Infinint::from(1u64));
        let (low, rest) = huge.unstack();
        assert_eq!(low, 0);
        assert_eq!(rest.to_u64(), Some(1));
    }

    #[test]
    fn width_scales_beyond_u64() {
        let mut v = Infinint::from(u64::MAX);
        for _ in 0..4 {
            v = v.checked_mul(&Infinint::from(u64::MAX));
        }
        assert!(v.to_u64().is_none());
        let bytes = v.dump();
        let (back, _) = Infinint::load(&bytes).unwrap();
        assert_eq!(back, v);
    }
}
