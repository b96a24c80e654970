// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The fixed-layout record at the head of every slice (§6):
//!
//! ```text
//! offset  size  meaning
//!      0     4  magic number, big-endian
//!      4    10  label
//!     14     1  flag: 'N' non-terminal, 'T' terminal
//!     15     1  extension: 'N' none, 'S' size extension follows
//!     16   var  if extension == 'S': infinint payload size
//! ```

use crate::error::{DarError, Result};
use crate::integers::Infinint;
use crate::label::{Label, LABEL_LEN};

/// The historical on-disk magic constant.
pub const MAGIC: u32 = 123;

pub const FIXED_HEADER_LEN: usize = 4 + LABEL_LEN + 1 + 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SliceFlag {
    NonTerminal,
    Terminal,
}

impl SliceFlag {
    fn to_byte(self) -> u8 {
        match self {
            SliceFlag::NonTerminal => b'N',
            SliceFlag::Terminal => b'T',
        }
    }

    fn from_byte(b: u8) -> Result<SliceFlag> {
        match b {
            b'N' => Ok(SliceFlag::NonTerminal),
            b'T' => Ok(SliceFlag::Terminal),
            other => {
                Err(DarError::BadHeader(format!("unknown slice flag byte {other:#x}")))
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct SliceHeader {
    pub label: Label,
    pub flag: SliceFlag,
    pub payload_size: Option<Infinint>,
}

impl SliceHeader {
    pub fn new(label: Label, flag: SliceFlag, payload_size: Option<Infinint>) -> SliceHeader {
        SliceHeader { label, flag, payload_size }
    }

    pub fn dump(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FIXED_HEADER_LEN + 4);
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(self.label.as_bytes());
        out.push(self.flag.to_byte());
        match &self.payload_size {
            Some(size) => {
                out.push(b'S');
                out.extend_from_slice(&size.dump());
            }
            None => out.push(b'N'),
        }
        out
    }

    pub fn load(bytes: &[u8]) -> Result<(SliceHeader, usize)> {
        if bytes.len() < FIXED_HEADER_LEN {
            return Err(DarError::BadHeader("truncated slice header".into()));
        }
        let magic = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        if magic != MAGIC {
            return Err(DarError::BadHeader(format!(
                "bad magic: expected {MAGIC:#x}, found {magic:#x}"
            )));
        }
        let mut label_bytes = [0u8; LABEL_LEN];
        label_bytes.copy_from_slice(&bytes[4..4 + LABEL_LEN]);
        let label = Label::from_bytes(label_bytes);
        let flag = SliceFlag::from_byte(bytes[14])?;
        let ext = bytes[15];
        let (payload_size, consumed) = match ext {
            b'N' => (None, FIXED_HEADER_LEN),
            b'S' => {
                let (size, used) = Infinint::load(&bytes[FIXED_HEADER_LEN..])?;
                (Some(size), FIXED_HEADER_LEN + used)
            }
            other => {
                return Err(DarError::BadHeader(format!(
                    "unknown extension byte {other:#x}"
                )));
            }
        };
        Ok((SliceHeader { label, flag, payload_size }, consumed))
    }

    pub fn len_on_disk(&self) -> usize {
        self.dump().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_without_size_extension() {
        let header = SliceHeader::new(Label::generate(), SliceFlag::NonTerminal, None);
        let bytes = header.dump();
        let (back, consumed) = SliceHeader::load(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(back.label, header.label);
        assert_eq!(back.flag, header.flag);
        assert!(back.payload_size.is_none());
    }

    #[test]
    fn round_trips_with_size_extension() {
        let header = SliceHeader::new(
            Label::generate(),
            SliceFlag::Terminal,
            Some(Infinint::from(1_000_000u64)),
        );
        let bytes = header.dump();
        let (back, _) = SliceHeader::load(&bytes).unwrap();
        assert_eq!(back.payload_size.unwrap().to_u64(), Some(1_000_000));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = SliceHeader::new(Label::generate(), SliceFlag::Terminal, None).dump();
        bytes[0] ^= 0xff;
        assert!(SliceHeader::load(&bytes).is_err());
    }

    #[test]
    fn rejects_foreign_label() {
        let a = SliceHeader::new(Label::generate(), SliceFlag::NonTerminal, None);
        let b = SliceHeader::new(Label::generate(), SliceFlag::NonTerminal, None);
        // Exercises the comparison the SAR layer performs; the headers
        // themselves don't refuse to load a foreign label, only the
        // transport layer that compares against slice 1's does.
        assert_ne!(a.label, b.label);
    }
}
