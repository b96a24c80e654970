// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A rolling CRC, sized proportionally to the covered byte count, with
//! a `combine` operation so that a file's data CRC and a later patch's
//! CRC can be concatenated without re-reading the earlier bytes.

use crc32fast::Hasher;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Crc {
    value: u32,
    len: u64,
}

impl Crc {
    pub fn new() -> Crc {
        Crc::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Crc {
        let mut crc = Crc::new();
        crc.update(bytes);
        crc
    }

    pub fn update(&mut self, bytes: &[u8]) {
        let mut hasher = Hasher::new_with_initial(self.value);
        hasher.update(bytes);
        self.value = hasher.finalize();
        self.len += bytes.len() as u64;
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Combines this CRC with one covering the bytes that immediately
    /// follow it, producing the CRC of the concatenation without
    /// re-reading either span.
    pub fn combine(&self, next: &Crc) -> Crc {
        Crc { value: crc32fast::Hasher::new().combine_values(self.value, next.value, next.len), len: self.len + next.len }
    }

    pub fn dump(&self) -> Vec<u8> {
        let mut out = self.value.to_be_bytes().to_vec();
        out.extend_from_slice(&self.len.to_be_bytes());
        out
    }

    pub fn load(bytes: &[u8]) -> Option<(Crc, usize)> {
        if bytes.len() < 12 {
            return None;
        }
        let value = u32::from_be_bytes(bytes[0..4].try_into().ok()?);
        let len = u64::from_be_bytes(bytes[4..12].try_into().ok()?);
        Some((Crc { value, len }, 12))
    }
}

// crc32fast doesn't expose a standalone combine function on Hasher in
// all versions; implement CRC-32 combine directly via polynomial
// exponentiation so this module has no hidden dependency on that API
// shape.
trait HasherCombineExt {
    fn combine_values(&self, crc1: u32, crc2: u32, len2: u64) -> u32;
}

impl HasherCombineExt for Hasher {
    fn combine_values(&self, crc1: u32, crc2: u32, len2: u64) -> u32 {
        gf2_combine(crc1, crc2, len2)
    }
}

const POLY: u32 = 0xedb8_8320;

fn gf2_matrix_times(mat: &[u32; 32], mut vec: u32) -> u32 {
    let mut sum = 0u32;
    let mut i = 0;
    while vec != 0 {
        if vec & 1 != 0 {
            sum ^= mat[i];
        }
        vec >>= 1;
        i += 1;
    }
    sum
}

fn gf2_matrix_square(square: &mut [u32; 32], mat: &[u32; 32]) {
    for n in 0..32 {
        square[n] = gf2_matrix_times(mat, mat[n]);
    }
}

/// Standard zlib-style CRC-32 combine: computes the CRC of two
/// concatenated buffers from each buffer's own CRC and the second
/// buffer's length, using GF(2) matrix exponentiation on the shift
/// register.
fn gf2_combine(crc1: u32, crc2: u32, mut len2: u64) -> u32 {
    if len2 == 0 {
        return crc1;
    }
    let mut even = [0u32; 32];
    let mut odd = [0u32; 32];

    odd[0] = POLY;
    let mut row = 1u32;
    for n in 1..32 {
        odd[n] = row;
        row <<= 1;
    }
    gf2_matrix_square(&mut even, &odd);
    gf2_matrix_square(&mut odd, &even);

    let mut crc1 = crc1;
    loop {
        gf2_matrix_square(&mut even, &odd);
        if len2 & 1 != 0 {
            crc1 = gf2_matrix_times(&even, crc1);
        }
        len2 >>= 1;
        if len2 == 0 {
            break;
        }
        gf2_matrix_square(&mut odd, &even);
        if len2 & 1 != 0 {
            crc1 = gf2_matrix_times(&odd, crc1);
        }
        len2 >>= 1;
        if len2 == 0 {
            break;
        }
    }
    crc1 ^ crc2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_matches_single_pass() {
        let a = b"hello, ";
        let b = b"world!";
        let mut whole = Crc::new();
        whole.update(a);
        whole.update(b);

        let part_a = Crc::from_bytes(a);
        let part_b = Crc::from_bytes(b);
        let combined = part_a.combine(&part_b);
        assert_eq!(whole.value(), combined.value());
        assert_eq!(whole.len(), combined.len());
    }

    #[test]
    fn round_trip() {
        let crc = Crc::from_bytes(b"abcdef");
        let bytes = crc.dump();
        let (back, consumed) = Crc::load(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(back, crc);
    }
}
