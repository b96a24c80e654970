// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The positioned byte-stream contract every pipeline layer speaks.
//!
//! Generalizes the teacher's `io::Read` trait (a bare, pointer-based
//! positioned read over a ramdisk slice) into a read/write/skip capable
//! trait object family layered over `std::io`, so that compressors,
//! ciphers, and the slice transport can all be stacked behind a single
//! `dyn ArchiveStream` without the caller knowing which layers are present.

use crate::crc::Crc;
use crate::error::Result;

/// How far a stream can reposition itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Skippability {
    /// No repositioning at all (e.g. a pipe).
    None,
    /// Can only skip forward from the current position.
    ForwardOnly,
    /// Arbitrary absolute seeks.
    Full,
}

impl Skippability {
    /// A stack of layers can only skip as well as its least capable
    /// member; layers above a non-skippable layer inherit its limit.
    pub fn min(self, other: Skippability) -> Skippability {
        use Skippability::*;
        match (self, other) {
            (None, _) | (_, None) => None,
            (ForwardOnly, _) | (_, ForwardOnly) => ForwardOnly,
            (Full, Full) => Full,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamMode {
    Read,
    Write,
    ReadWrite,
}

/// The positioned stream contract implemented by every pipeline layer
/// (filesystem files, slices, compressor, cipher).
pub trait ArchiveStream: Send {
    /// Reads up to `buf.len()` bytes at the current position, returning
    /// the count actually read (short of `buf.len()` only at end of
    /// stream).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes `buf` at the current position, extending the stream past
    /// its previous end if necessary. Returns the count written.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Repositions to an absolute offset. Returns `false` if this
    /// stream's skippability does not permit the requested move.
    fn skip(&mut self, absolute_offset: u64) -> Result<bool>;

    fn skip_relative(&mut self, delta: i64) -> Result<bool> {
        let target = (self.position() as i64 + delta).max(0) as u64;
        self.skip(target)
    }

    fn skip_to_eof(&mut self) -> Result<()>;

    fn position(&self) -> u64;

    /// Truncates the stream so that its logical size becomes `offset`.
    /// Legal only in write mode.
    fn truncate(&mut self, offset: u64) -> Result<()>;

    fn skippability(&self) -> Skippability;

    fn mode(&self) -> StreamMode;

    /// The position past which bytes are not payload (e.g. a cipher's
    /// authentication trailer). Defaults to the physical end.
    fn end_of_data(&self) -> Option<u64> {
        None
    }

    /// Copies every remaining byte to `sink`, optionally folding them
    /// into a running CRC as they pass through.
    fn copy_to(
        &mut self,
        sink: &mut dyn ArchiveStream,
        mut crc: Option<&mut Crc>,
    ) -> Result<u64> {
        let mut buf = [0u8; 64 * 1024];
        let mut total = 0u64;
        loop {
            let n = self.read(&mut buf)?;
            if n == 0 {
                break;
            }
            if let Some(crc) = crc.as_deref_mut() {
                crc.update(&buf[..n]);
            }
            let mut written = 0;
            while written < n {
                written += sink.write(&buf[written..n])?;
            }
            total += n as u64;
        }
        Ok(total)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::MemStream;
    use super::*;

    #[test]
    fn copy_to_preserves_bytes_and_crc() {
        let mut src = MemStream::from_vec(b"hello world".to_vec());
        let mut dst = MemStream::new();
        let mut crc = Crc::new();
        let n = src.copy_to(&mut dst, Some(&mut crc)).unwrap();
        assert_eq!(n, 11);
        assert_eq!(dst.data, b"hello world");
        assert_eq!(crc, Crc::from_bytes(b"hello world"));
    }

    #[test]
    fn skippability_min_is_the_weakest_link() {
        assert_eq!(Skippability::Full.min(Skippability::None), Skippability::None);
        assert_eq!(
            Skippability::Full.min(Skippability::ForwardOnly),
            Skippability::ForwardOnly
        );
    }
}
