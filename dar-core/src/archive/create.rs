// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `create` (§4.7): writes an archive-version header followed by the
//! archive body for a tree the caller (the filesystem walker, an
//! external collaborator) has already built.

use crate::cancel::CancelToken;
use crate::catalogue::Entry;
use crate::compress::{compressor_for, Compressor};
use crate::crypto::{Cipher, CipherAlgo};
use crate::error::Result;
use crate::stream::ArchiveStream;
use crate::summary::OperationSummary;

use super::format::{write_body, FileDataSource};
use super::options::CreateOptions;
use super::version::ArchiveVersion;

/// Writes `root` (mutated in place to record each Saved file's storage
/// offset, CRC, and compression state) to `stream`, prefixed by an
/// [`ArchiveVersion`] header; returns the per-component counters.
pub fn create(
    root: &mut Entry,
    source: &dyn FileDataSource,
    cipher: &dyn Cipher,
    opts: &CreateOptions,
    command_line_echo: &str,
    cancel: &CancelToken,
    stream: &mut dyn ArchiveStream,
) -> Result<OperationSummary> {
    let version = ArchiveVersion::new(opts.compression, cipher.algo(), command_line_echo);
    write_sealed(stream, &version.dump(), cipher)?;

    let compressor: Box<dyn Compressor> = compressor_for(opts.compression);
    write_body(root, source, compressor.as_ref(), cipher, opts, cancel, stream)
}

pub(crate) fn write_sealed(stream: &mut dyn ArchiveStream, plain: &[u8], cipher: &dyn Cipher) -> Result<()> {
    if cipher.algo() == CipherAlgo::None {
        return write_all(stream, plain);
    }
    let sealed = cipher.seal(plain)?;
    write_all(stream, &(sealed.len() as u64).to_be_bytes())?;
    write_all(stream, &sealed)
}

fn write_all(stream: &mut dyn ArchiveStream, bytes: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < bytes.len() {
        written += stream.write(&bytes[written..])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{FileEntry, InodeAttrs, SavedState};
    use crate::cancel::CancelToken;
    use crate::crypto::NoCipher;
    use crate::date::Date;
    use crate::error::DarError;
    use crate::integers::Infinint;
    use crate::stream::test_support::MemStream;

    struct MapSource(std::collections::HashMap<String, Vec<u8>>);
    impl FileDataSource for MapSource {
        fn read_all(&self, path: &[String]) -> Result<Vec<u8>> {
            self.0.get(&path.join("/")).cloned().ok_or_else(|| DarError::Data("missing".into()))
        }
    }

    #[test]
    fn create_writes_a_parseable_header_and_body() {
        let mut file = FileEntry::not_saved(InodeAttrs::new("f", 0o644, Date::from_unix_seconds(10)), Infinint::from(2u64));
        file.saved = SavedState::Saved;
        let mut root = Entry::Directory { attrs: InodeAttrs::new("", 0o755, Date::EPOCH), children: vec![Entry::File(file)] };

        let mut data = std::collections::HashMap::new();
        data.insert("f".to_string(), b"hi".to_vec());
        let source = MapSource(data);

        let mut stream = MemStream::new();
        let opts = CreateOptions::default();
        let cancel = CancelToken::new();
        let summary = create(&mut root, &source, &NoCipher, &opts, "dar -c t -R .", &cancel, &mut stream).unwrap();
        assert_eq!(summary.treated, 2);

        stream.skip(0).unwrap();
        let mut header_buf = [0u8; 4];
        stream.read(&mut header_buf).unwrap();
        assert_eq!(u32::from_be_bytes(header_buf), super::super::version::ARCHIVE_MAGIC);
    }
}
