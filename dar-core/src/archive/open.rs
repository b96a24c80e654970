// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared archive-opening logic: every read-side operation (`test`,
//! `list`, `diff`, `restore`) starts by reading the [`ArchiveVersion`]
//! header the same way.

use crate::error::{DarError, Result};
use crate::crypto::Cipher;
use crate::stream::ArchiveStream;

use super::version::ArchiveVersion;

/// Reads and opens the archive-version header from the current stream
/// position, leaving the cursor at the start of the archive body.
///
/// The header's sealed form is length-prefixed by nothing; instead, the
/// cleartext magic+format+algo prefix (12 bytes, see
/// [`ArchiveVersion::dump`]) is read first to recover the command-line
/// echo's length, then the whole header blob is re-read through the
/// cipher if one is in effect. When no cipher is in effect this is a
/// single pass; sealed archives therefore record an unsealed length
/// prefix ahead of the sealed blob so the reader knows how much to pull
/// before calling `open`.
pub fn read_header(stream: &mut dyn ArchiveStream, cipher: &dyn Cipher) -> Result<ArchiveVersion> {
    if cipher.algo() == crate::crypto::CipherAlgo::None {
        let mut buf = Vec::new();
        loop {
            match ArchiveVersion::load(&buf) {
                Ok((version, _)) => return Ok(version),
                Err(_) => {
                    let mut byte = [0u8; 1];
                    let n = stream.read(&mut byte)?;
                    if n == 0 {
                        return Err(DarError::BadHeader("archive ended before a complete header".into()));
                    }
                    buf.push(byte[0]);
                    if buf.len() > 1024 * 1024 {
                        return Err(DarError::BadHeader("archive-version header exceeded sanity limit".into()));
                    }
                }
            }
        }
    } else {
        let mut len_buf = [0u8; 8];
        read_exact_into(stream, &mut len_buf)?;
        let len = u64::from_be_bytes(len_buf) as usize;
        let mut sealed = vec![0u8; len];
        read_exact_into(stream, &mut sealed)?;
        let plain = cipher.open(&sealed)?;
        let (version, _) = ArchiveVersion::load(&plain)?;
        Ok(version)
    }
}

fn read_exact_into(stream: &mut dyn ArchiveStream, buf: &mut [u8]) -> Result<()> {
    let mut read = 0;
    while read < buf.len() {
        let n = stream.read(&mut buf[read..])?;
        if n == 0 {
            return Err(DarError::BadHeader("archive ended before a complete header".into()));
        }
        read += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressionAlgo;
    use crate::crypto::{CipherAlgo, NoCipher};
    use crate::stream::test_support::MemStream;

    #[test]
    fn reads_back_an_unsealed_header() {
        let version = ArchiveVersion::new(CompressionAlgo::Gzip, CipherAlgo::None, "dar -c t -R .");
        let mut stream = MemStream::from_vec(version.dump());
        let back = read_header(&mut stream, &NoCipher).unwrap();
        assert_eq!(back.command_line_echo, "dar -c t -R .");
    }
}
