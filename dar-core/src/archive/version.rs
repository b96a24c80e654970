// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The archive-version record (§6): the fixed header every archive
//! opens with, carrying the format version, the compression algorithm,
//! the cipher algorithm, and a free-form command-line-echo string used
//! by `--compare-to-database` style tooling to reconstruct how an
//! archive was produced.

use crate::compress::CompressionAlgo;
use crate::crypto::CipherAlgo;
use crate::error::{DarError, Result};

pub const ARCHIVE_MAGIC: u32 = 0xDA7_0001;
pub const FORMAT_VERSION: u16 = 1;

#[derive(Clone, Debug)]
pub struct ArchiveVersion {
    pub format_version: u16,
    pub compression: CompressionAlgo,
    pub cipher: CipherAlgo,
    pub command_line_echo: String,
}

impl ArchiveVersion {
    pub fn new(compression: CompressionAlgo, cipher: CipherAlgo, command_line_echo: impl Into<String>) -> ArchiveVersion {
        ArchiveVersion { format_version: FORMAT_VERSION, compression, cipher, command_line_echo: command_line_echo.into() }
    }

    pub fn dump(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&ARCHIVE_MAGIC.to_be_bytes());
        out.extend_from_slice(&self.format_version.to_be_bytes());
        out.push(self.compression.discriminator());
        out.push(match self.cipher {
            CipherAlgo::None => 0,
            CipherAlgo::AesGcm => 1,
        });
        out.extend_from_slice(&(self.command_line_echo.len() as u32).to_be_bytes());
        out.extend_from_slice(self.command_line_echo.as_bytes());
        out
    }

    pub fn load(bytes: &[u8]) -> Result<(ArchiveVersion, usize)> {
        if bytes.len() < 11 {
            return Err(DarError::BadHeader("truncated archive-version record".into()));
        }
        let magic = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        if magic != ARCHIVE_MAGIC {
            return Err(DarError::BadHeader(format!("bad archive magic {magic:#x}")));
        }
        let format_version = u16::from_be_bytes(bytes[4..6].try_into().unwrap());
        let compression = CompressionAlgo::from_discriminator(bytes[6])?;
        let cipher = match bytes[7] {
            0 => CipherAlgo::None,
            1 => CipherAlgo::AesGcm,
            other => return Err(DarError::BadHeader(format!("unknown cipher algorithm {other}"))),
        };
        let len = u32::from_be_bytes(bytes[8..12].try_into().unwrap()) as usize;
        let end = 12 + len;
        let raw = bytes.get(12..end).ok_or_else(|| DarError::BadHeader("truncated command-line echo".into()))?;
        let command_line_echo = String::from_utf8(raw.to_vec()).map_err(|_| DarError::BadHeader("non-utf8 command-line echo".into()))?;
        Ok((ArchiveVersion { format_version, compression, cipher, command_line_echo }, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let v = ArchiveVersion::new(CompressionAlgo::Gzip, CipherAlgo::None, "dar -c test -R /");
        let bytes = v.dump();
        let (back, used) = ArchiveVersion::load(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(back.command_line_echo, "dar -c test -R /");
        assert_eq!(back.compression, CompressionAlgo::Gzip);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = ArchiveVersion::new(CompressionAlgo::None, CipherAlgo::None, "").dump();
        bytes[0] = 0;
        assert!(ArchiveVersion::load(&bytes).is_err());
    }
}
