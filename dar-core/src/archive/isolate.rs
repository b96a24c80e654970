// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `isolate` (§4.7): detaches an archive's catalogue into a standalone
//! archive whose data section is empty, so it can serve as a future
//! incremental's reference without carrying the original's bytes
//! around.

use crate::cancel::CancelToken;
use crate::catalogue::entry::{CompressionState, Entry, FileEntry, SavedState};
use crate::compress::{compressor_for, CompressionAlgo};
use crate::crypto::Cipher;
use crate::error::{DarError, Result};
use crate::stream::ArchiveStream;
use crate::summary::OperationSummary;

use super::create::write_sealed;
use super::format::{read_body, write_body, FileDataSource, NullSink};
use super::open::read_header;
use super::options::CreateOptions;
use super::version::ArchiveVersion;

/// A source that is never actually asked for bytes: every file in an
/// isolated catalogue is marked `NotSaved` before `write_body` runs.
struct EmptySource;
impl FileDataSource for EmptySource {
    fn read_all(&self, path: &[String]) -> Result<Vec<u8>> {
        Err(DarError::Data(format!("isolate asked for data at {}, which should be unreachable", path.join("/"))))
    }
}

fn strip_data(entry: &mut Entry) {
    match entry {
        Entry::File(FileEntry { saved, storage_offset, data_crc, compression, patch_base_crc, patch_result_crc, sparse_holes, .. }) => {
            *saved = SavedState::NotSaved;
            *storage_offset = None;
            *data_crc = None;
            *compression = CompressionState::None;
            *patch_base_crc = None;
            *patch_result_crc = None;
            sparse_holes.clear();
        }
        Entry::Directory { children, .. } => {
            for child in children {
                strip_data(child);
            }
        }
        _ => {}
    }
}

/// Reads `input`'s catalogue and writes it back out to `output` as a
/// data-free archive.
pub fn isolate(
    input: &mut dyn ArchiveStream,
    input_cipher: &dyn Cipher,
    output: &mut dyn ArchiveStream,
    output_cipher: &dyn Cipher,
    command_line_echo: &str,
    cancel: &CancelToken,
) -> Result<OperationSummary> {
    let _ = read_header(input, input_cipher)?;
    let mut sink = NullSink;
    let (mut root, _) = read_body(input, &mut sink, input_cipher, cancel)?;
    strip_data(&mut root);

    let version = ArchiveVersion::new(CompressionAlgo::None, output_cipher.algo(), command_line_echo);
    write_sealed(output, &version.dump(), output_cipher)?;

    let opts = CreateOptions { compression: CompressionAlgo::None, ..CreateOptions::default() };
    let compressor = compressor_for(CompressionAlgo::None);
    write_body(&mut root, &EmptySource, compressor.as_ref(), output_cipher, &opts, cancel, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::create::create;
    use crate::catalogue::InodeAttrs;
    use crate::crypto::NoCipher;
    use crate::date::Date;
    use crate::integers::Infinint;
    use crate::stream::test_support::MemStream;

    struct MapSource(std::collections::HashMap<String, Vec<u8>>);
    impl FileDataSource for MapSource {
        fn read_all(&self, path: &[String]) -> Result<Vec<u8>> {
            self.0.get(&path.join("/")).cloned().ok_or_else(|| DarError::Data("missing".into()))
        }
    }

    #[test]
    fn isolated_archive_has_no_saved_files() {
        let mut file = FileEntry::not_saved(InodeAttrs::new("f", 0o644, Date::from_unix_seconds(10)), Infinint::from(2u64));
        file.saved = crate::catalogue::SavedState::Saved;
        let mut root = Entry::Directory { attrs: InodeAttrs::new("", 0o755, Date::EPOCH), children: vec![Entry::File(file)] };
        let mut data = std::collections::HashMap::new();
        data.insert("f".to_string(), b"hi".to_vec());
        let source = MapSource(data);
        let mut original = MemStream::new();
        create(&mut root, &source, &NoCipher, &CreateOptions::default(), "dar -c t -R .", &CancelToken::new(), &mut original).unwrap();
        original.skip(0).unwrap();

        let mut isolated = MemStream::new();
        isolate(&mut original, &NoCipher, &mut isolated, &NoCipher, "dar -C iso -A t", &CancelToken::new()).unwrap();

        isolated.skip(0).unwrap();
        let mut sink = NullSink;
        let (tree, _) = read_body(&mut isolated, &mut sink, &NoCipher, &CancelToken::new()).unwrap();
        if let Entry::File(f) = &tree.children()[0] {
            assert_eq!(f.saved, crate::catalogue::SavedState::NotSaved);
            assert!(f.storage_offset.is_none());
        } else {
            panic!("expected a file entry");
        }
    }
}
