// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The archive body: a single depth-first pass over the directory tree
//! that interleaves each file's data immediately after its metadata
//! (§4.5 "sequential-read mode"), so the whole archive — catalogue and
//! data alike — can be produced and consumed through a stream whose
//! only capability is a forward read or write, exactly what a sliced,
//! tape-backed [`crate::slice::SarWriter`]/[`crate::slice::SarReader`]
//! offers. Every tag byte is read exactly once and never un-read, so
//! this format never asks more of a stream than [`Skippability::ForwardOnly`](crate::stream::Skippability).
//!
//! Reuses the catalogue's own attribute/EA/FSA/date wire encoding
//! ([`crate::catalogue::io`]) for every field this format shares with
//! the catalogue snapshot format, so a directory's attributes are byte-
//! identical whether they came from a live archive or an isolated one.

use crate::cancel::CancelToken;
use crate::catalogue::entry::{CompressionState, DeviceEntry, Entry, EntryTag, FileEntry, InodeAttrs, SavedState, SparseHole};
use crate::catalogue::io as cio;
use crate::compress::{should_compress, Compressor};
use crate::crc::Crc;
use crate::crypto::Cipher;
use crate::error::{DarError, Result};
use crate::integers::Infinint;
use crate::stream::ArchiveStream;

use super::options::CreateOptions;
use crate::summary::OperationSummary;

/// Supplies a Saved file's raw content during `write_body`, keyed by
/// its path components from the tree root. An external collaborator:
/// the filesystem walker owns how bytes are actually read.
pub trait FileDataSource: Send + Sync {
    fn read_all(&self, path: &[String]) -> Result<Vec<u8>>;
}

/// Receives decoded entries and, optionally, file payloads as
/// `read_body` walks an archive. `wants_data` lets a metadata-only
/// caller (list, diff) skip decompression entirely.
pub trait BodySink {
    fn wants_data(&self) -> bool {
        false
    }

    /// Called when a directory's attrs have been decoded but before any
    /// of its children are, so a restorer can create the directory on
    /// disk in time to write children into it. `on_entry` still fires
    /// afterwards, once the whole subtree is known, for a final
    /// attribute fixup (writing into a directory updates its mtime).
    fn on_enter_directory(&mut self, _path: &[String], _attrs: &InodeAttrs) {}

    fn on_entry(&mut self, _path: &[String], _entry: &Entry) {}

    fn on_file_data(&mut self, _path: &[String], _raw: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// A sink that does nothing; used by operations that only need the
/// returned tree (e.g. a one-shot `test`).
pub struct NullSink;
impl BodySink for NullSink {}

/// Writes `root`'s data, filling in each Saved file's `storage_offset`,
/// `data_crc`, and `compression` as it goes, and returns per-component
/// counters (§7).
pub fn write_body(
    root: &mut Entry,
    source: &dyn FileDataSource,
    compressor: &dyn Compressor,
    cipher: &dyn Cipher,
    opts: &CreateOptions,
    cancel: &CancelToken,
    stream: &mut dyn ArchiveStream,
) -> Result<OperationSummary> {
    let mut summary = OperationSummary::new();
    let mut path = Vec::new();
    write_entry(root, &mut path, source, compressor, cipher, opts, cancel, stream, &mut summary)?;
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn write_entry(
    entry: &mut Entry,
    path: &mut Vec<String>,
    source: &dyn FileDataSource,
    compressor: &dyn Compressor,
    cipher: &dyn Cipher,
    opts: &CreateOptions,
    cancel: &CancelToken,
    stream: &mut dyn ArchiveStream,
    summary: &mut OperationSummary,
) -> Result<()> {
    cancel.check()?;
    write_all(stream, &[entry.tag() as u8])?;
    match entry {
        Entry::Directory { attrs, children } => {
            let mut buf = Vec::new();
            cio::dump_attrs(attrs, &mut buf);
            write_all(stream, &buf)?;
            count_attrs(Some(attrs), summary);
            summary.treated += 1;
            for child in children.iter_mut() {
                path.push(child.name().to_string());
                write_entry(child, path, source, compressor, cipher, opts, cancel, stream, summary)?;
                path.pop();
            }
            write_all(stream, &[EntryTag::EndOfDirectory as u8])?;
        }
        Entry::File(f) => {
            count_attrs(Some(&f.attrs), summary);
            write_file(f, path, source, compressor, cipher, opts, stream, summary)?;
        }
        Entry::Symlink { attrs, target } => {
            let mut buf = Vec::new();
            cio::dump_attrs(attrs, &mut buf);
            cio::write_string(target, &mut buf);
            write_all(stream, &buf)?;
            count_attrs(Some(attrs), summary);
            summary.treated += 1;
        }
        Entry::CharDevice(d) | Entry::BlockDevice(d) => {
            let mut buf = Vec::new();
            cio::dump_attrs(&d.attrs, &mut buf);
            buf.extend_from_slice(&d.major.to_be_bytes());
            buf.extend_from_slice(&d.minor.to_be_bytes());
            write_all(stream, &buf)?;
            count_attrs(Some(&d.attrs), summary);
            summary.treated += 1;
        }
        Entry::NamedPipe { attrs } | Entry::Socket { attrs } => {
            let mut buf = Vec::new();
            cio::dump_attrs(attrs, &mut buf);
            write_all(stream, &buf)?;
            count_attrs(Some(attrs), summary);
            summary.treated += 1;
        }
        Entry::HardLinkAlias { name, id } => {
            let mut buf = Vec::new();
            cio::write_string(name, &mut buf);
            buf.extend_from_slice(&id.to_be_bytes());
            write_all(stream, &buf)?;
            summary.hard_linked += 1;
        }
        Entry::Tombstone { name, deletion_date } => {
            let mut buf = Vec::new();
            cio::write_string(name, &mut buf);
            cio::dump_date(deletion_date, &mut buf);
            write_all(stream, &buf)?;
            summary.deleted += 1;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_file(
    f: &mut FileEntry,
    path: &[String],
    source: &dyn FileDataSource,
    compressor: &dyn Compressor,
    cipher: &dyn Cipher,
    opts: &CreateOptions,
    stream: &mut dyn ArchiveStream,
    summary: &mut OperationSummary,
) -> Result<()> {
    let mut head = Vec::new();
    cio::dump_attrs(&f.attrs, &mut head);
    head.extend_from_slice(&f.size.dump());
    head.push(match f.saved {
        SavedState::Saved => 0,
        SavedState::NotSaved => 1,
        SavedState::UnchangedSinceRef => 2,
    });
    write_all(stream, &head)?;

    match f.saved {
        SavedState::Saved => {
            let raw = source.read_all(path)?;
            let crc = Crc::from_bytes(&raw);
            let compress = should_compress(raw.len() as u64, opts.min_compr_size, false);
            let (payload, compression) = if compress {
                (compressor.compress(opts.compression_level, &raw)?, CompressionState::Used)
            } else {
                (raw, CompressionState::None)
            };
            let offset = stream.position();
            let mut tail = Vec::new();
            tail.push(if compression == CompressionState::Used { compressor.algo().discriminator() } else { 0 });
            tail.extend_from_slice(&(payload.len() as u64).to_be_bytes());
            tail.extend_from_slice(&payload);
            tail.extend_from_slice(&crc.dump());

            let sealed = cipher.seal(&tail)?;
            write_all(stream, &(sealed.len() as u64).to_be_bytes())?;
            write_all(stream, &sealed)?;

            f.storage_offset = Some(offset);
            f.data_crc = Some(crc);
            f.compression = compression;
            summary.treated += 1;
        }
        SavedState::NotSaved => summary.ignored += 1,
        SavedState::UnchangedSinceRef => summary.skipped += 1,
    }
    Ok(())
}

fn count_attrs(attrs: Option<&InodeAttrs>, summary: &mut OperationSummary) {
    if let Some(attrs) = attrs {
        if !attrs.ea.is_empty() {
            summary.ea_treated += 1;
        }
        if !attrs.fsa.is_empty() {
            summary.fsa_treated += 1;
        }
    }
}

fn write_all(stream: &mut dyn ArchiveStream, buf: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < buf.len() {
        written += stream.write(&buf[written..])?;
    }
    Ok(())
}

fn read_exact(stream: &mut dyn ArchiveStream, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut read = 0;
    while read < len {
        let n = stream.read(&mut buf[read..])?;
        if n == 0 {
            return Err(DarError::Data("archive body ended early".into()));
        }
        read += n;
    }
    Ok(buf)
}

fn read_byte(stream: &mut dyn ArchiveStream) -> Result<u8> {
    Ok(read_exact(stream, 1)?[0])
}

/// Decodes a whole archive body, calling `sink` as each entry is built.
/// The returned tree never carries in-memory file bytes, only the
/// metadata that `write_body` also produces.
pub fn read_body(stream: &mut dyn ArchiveStream, sink: &mut dyn BodySink, cipher: &dyn Cipher, cancel: &CancelToken) -> Result<(Entry, OperationSummary)> {
    let mut summary = OperationSummary::new();
    let mut path = Vec::new();
    let tag_byte = read_byte(stream)?;
    let entry = read_entry(tag_byte, stream, &mut path, sink, cipher, cancel, &mut summary)?;
    Ok((entry, summary))
}

/// Decodes one entry whose tag byte has already been consumed by the
/// caller (the top-level call in [`read_body`], or a directory's
/// sibling loop below). `path` names the *parent*; this function pushes
/// the entry's own name onto it for the duration of any nested work
/// (recursing into children, reading file payload, calling `sink`) and
/// pops it again before returning, so the stream is never asked to
/// reposition backward to "unread" a byte.
#[allow(clippy::too_many_arguments)]
fn read_entry(
    tag_byte: u8,
    stream: &mut dyn ArchiveStream,
    path: &mut Vec<String>,
    sink: &mut dyn BodySink,
    cipher: &dyn Cipher,
    cancel: &CancelToken,
    summary: &mut OperationSummary,
) -> Result<Entry> {
    cancel.check()?;
    let tag = EntryTag::from_byte(tag_byte).ok_or_else(|| DarError::Data(format!("unknown archive record tag {tag_byte:#x}")))?;
    match tag {
        EntryTag::Directory => {
            let attrs = read_attrs(stream)?;
            count_attrs(Some(&attrs), summary);
            let pushed = push_name(path, &attrs.name);
            sink.on_enter_directory(path, &attrs);
            let mut children = Vec::new();
            loop {
                let b = read_byte(stream)?;
                if b == EntryTag::EndOfDirectory as u8 {
                    break;
                }
                children.push(read_entry(b, stream, path, sink, cipher, cancel, summary)?);
            }
            summary.treated += 1;
            let dir = Entry::Directory { attrs, children };
            sink.on_entry(path, &dir);
            pop_name(path, pushed);
            return Ok(dir);
        }
        EntryTag::File => {
            let f = read_file(stream, path, sink, cipher, summary)?;
            let pushed = push_name(path, &f.attrs.name);
            count_attrs(Some(&f.attrs), summary);
            let entry = Entry::File(f);
            sink.on_entry(path, &entry);
            pop_name(path, pushed);
            return Ok(entry);
        }
        EntryTag::Symlink => {
            let attrs = read_attrs(stream)?;
            let target = read_string(stream)?;
            count_attrs(Some(&attrs), summary);
            summary.treated += 1;
            let pushed = push_name(path, &attrs.name);
            let entry = Entry::Symlink { attrs, target };
            sink.on_entry(path, &entry);
            pop_name(path, pushed);
            return Ok(entry);
        }
        EntryTag::CharDevice | EntryTag::BlockDevice => {
            let attrs = read_attrs(stream)?;
            let major = u32::from_be_bytes(read_exact(stream, 4)?.try_into().unwrap());
            let minor = u32::from_be_bytes(read_exact(stream, 4)?.try_into().unwrap());
            count_attrs(Some(&attrs), summary);
            summary.treated += 1;
            let pushed = push_name(path, &attrs.name);
            let d = DeviceEntry { attrs, major, minor };
            let entry = if tag == EntryTag::CharDevice { Entry::CharDevice(d) } else { Entry::BlockDevice(d) };
            sink.on_entry(path, &entry);
            pop_name(path, pushed);
            return Ok(entry);
        }
        EntryTag::NamedPipe | EntryTag::Socket => {
            let attrs = read_attrs(stream)?;
            count_attrs(Some(&attrs), summary);
            summary.treated += 1;
            let pushed = push_name(path, &attrs.name);
            let entry = if tag == EntryTag::NamedPipe { Entry::NamedPipe { attrs } } else { Entry::Socket { attrs } };
            sink.on_entry(path, &entry);
            pop_name(path, pushed);
            return Ok(entry);
        }
        EntryTag::HardLinkAlias => {
            let name = read_string(stream)?;
            let id = u64::from_be_bytes(read_exact(stream, 8)?.try_into().unwrap());
            summary.hard_linked += 1;
            let pushed = push_name(path, &name);
            let entry = Entry::HardLinkAlias { name, id };
            sink.on_entry(path, &entry);
            pop_name(path, pushed);
            return Ok(entry);
        }
        EntryTag::Tombstone => {
            let name = read_string(stream)?;
            let deletion_date = read_date(stream)?;
            summary.deleted += 1;
            let pushed = push_name(path, &name);
            let entry = Entry::Tombstone { name, deletion_date };
            sink.on_entry(path, &entry);
            pop_name(path, pushed);
            return Ok(entry);
        }
        EntryTag::EndOfDirectory => Err(DarError::Data("unexpected end-of-directory marker".into())),
    }
}

/// Root directories carry an empty name; everything else has one.
/// Pushing an empty component would corrupt path joins, so the push is
/// skipped for the root and `pop_name` knows not to undo it.
fn push_name(path: &mut Vec<String>, name: &str) -> bool {
    if name.is_empty() {
        false
    } else {
        path.push(name.to_string());
        true
    }
}

fn pop_name(path: &mut Vec<String>, pushed: bool) {
    if pushed {
        path.pop();
    }
}

fn read_attrs(stream: &mut dyn ArchiveStream) -> Result<InodeAttrs> {
    let buf = read_fixed_prefix_attrs(stream)?;
    let mut pos = 0;
    cio::load_attrs(&buf, &mut pos)
}

/// Attrs are variable-length (name, EA entries, FSA entries), so there
/// is no fixed byte count to request up front; read incrementally,
/// growing the buffer one byte at a time until `cio::load_attrs` stops
/// reporting truncation. This trades a few retries for not needing a
/// second, length-prefixed attrs wire format solely for streaming.
fn read_fixed_prefix_attrs(stream: &mut dyn ArchiveStream) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    loop {
        let mut pos = 0;
        match cio::load_attrs(&buf, &mut pos) {
            Ok(_) => return Ok(buf[..pos].to_vec()),
            Err(_) => {
                buf.push(read_byte(stream)?);
                if buf.len() > 8 * 1024 * 1024 {
                    return Err(DarError::Data("attrs block exceeded sanity limit".into()));
                }
            }
        }
    }
}

fn read_string(stream: &mut dyn ArchiveStream) -> Result<String> {
    let len = u32::from_be_bytes(read_exact(stream, 4)?.try_into().unwrap()) as usize;
    let raw = read_exact(stream, len)?;
    String::from_utf8(raw).map_err(|_| DarError::Data("non-utf8 archive string".into()))
}

fn read_date(stream: &mut dyn ArchiveStream) -> Result<crate::date::Date> {
    let buf = read_exact(stream, 8 + 4 + 1)?;
    let mut pos = 0;
    cio::load_date(&buf, &mut pos)
}

fn read_file(
    stream: &mut dyn ArchiveStream,
    path: &mut Vec<String>,
    sink: &mut dyn BodySink,
    cipher: &dyn Cipher,
    summary: &mut OperationSummary,
) -> Result<FileEntry> {
    let attrs = read_attrs(stream)?;
    let (size, _) = read_infinint(stream)?;
    let saved = match read_byte(stream)? {
        1 => SavedState::NotSaved,
        2 => SavedState::UnchangedSinceRef,
        _ => SavedState::Saved,
    };

    let mut storage_offset = None;
    let mut data_crc = None;
    let mut compression = CompressionState::None;

    if saved == SavedState::Saved {
        let offset = stream.position();
        let sealed_len = u64::from_be_bytes(read_exact(stream, 8)?.try_into().unwrap()) as usize;
        let sealed = read_exact(stream, sealed_len)?;
        let tail = cipher.open(&sealed)?;
        let algo_byte = *tail.first().ok_or_else(|| DarError::Data("truncated file tail".into()))?;
        let payload_len = u64::from_be_bytes(tail.get(1..9).ok_or_else(|| DarError::Data("truncated file tail".into()))?.try_into().unwrap()) as usize;
        let payload = tail.get(9..9 + payload_len).ok_or_else(|| DarError::Data("truncated file payload".into()))?.to_vec();
        let crc_bytes = tail.get(9 + payload_len..9 + payload_len + 12).ok_or_else(|| DarError::Data("truncated file crc".into()))?;
        let (crc, _) = Crc::load(crc_bytes).ok_or_else(|| DarError::Data("truncated file crc".into()))?;

        storage_offset = Some(offset);
        let algo = crate::compress::CompressionAlgo::from_discriminator(algo_byte)?;
        compression = if algo == crate::compress::CompressionAlgo::None { CompressionState::None } else { CompressionState::Used };

        if sink.wants_data() {
            let raw = crate::compress::compressor_for(algo).decompress(&payload)?;
            let actual = Crc::from_bytes(&raw);
            if actual != crc {
                let name = path.last().cloned().unwrap_or_default();
                return Err(DarError::Data(format!("crc mismatch restoring {name}")));
            }
            let pushed = push_name(path, &attrs.name);
            sink.on_file_data(path, &raw)?;
            pop_name(path, pushed);
        }
        data_crc = Some(crc);
        summary.treated += 1;
    } else if saved == SavedState::NotSaved {
        summary.ignored += 1;
    } else {
        summary.skipped += 1;
    }

    Ok(FileEntry {
        attrs,
        size,
        storage_offset,
        compression,
        saved,
        data_crc,
        patch_base_crc: None,
        patch_result_crc: None,
        sparse_holes: Vec::<SparseHole>::new(),
        ethernet_id: None,
    })
}

fn read_infinint(stream: &mut dyn ArchiveStream) -> Result<(Infinint, usize)> {
    // Infinint's length prefix is itself self-describing (§6), so read
    // one byte at a time until `Infinint::load` stops reporting
    // truncation, mirroring `read_fixed_prefix_attrs`'s approach.
    let mut buf = Vec::new();
    loop {
        match Infinint::load(&buf) {
            Ok((value, used)) => return Ok((value, used)),
            Err(_) => {
                buf.push(read_byte(stream)?);
                if buf.len() > 16 {
                    return Err(DarError::Data("infinint prefix exceeded sanity limit".into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::Date;
    use crate::stream::test_support::MemStream;

    struct MapSource(std::collections::HashMap<String, Vec<u8>>);
    impl FileDataSource for MapSource {
        fn read_all(&self, path: &[String]) -> Result<Vec<u8>> {
            self.0.get(&path.join("/")).cloned().ok_or_else(|| DarError::Data("missing fixture data".into()))
        }
    }

    #[derive(Default)]
    struct CollectSink {
        wants: bool,
        collected: std::collections::HashMap<String, Vec<u8>>,
    }
    impl BodySink for CollectSink {
        fn wants_data(&self) -> bool {
            self.wants
        }
        fn on_file_data(&mut self, path: &[String], raw: &[u8]) -> Result<()> {
            self.collected.insert(path.join("/"), raw.to_vec());
            Ok(())
        }
    }

    fn sample_tree() -> Entry {
        let file_attrs = InodeAttrs::new("f", 0o644, Date::from_unix_seconds(100));
        let file = Entry::File(FileEntry::not_saved(file_attrs, Infinint::from(5u64)));
        Entry::Directory {
            attrs: InodeAttrs::new("", 0o755, Date::EPOCH),
            children: vec![Entry::Directory { attrs: InodeAttrs::new("a", 0o755, Date::EPOCH), children: vec![file] }],
        }
    }

    fn mark_saved(entry: &mut Entry) {
        if let Entry::File(f) = entry {
            f.saved = SavedState::Saved;
        }
        if let Some(children) = entry.children_mut() {
            for c in children {
                mark_saved(c);
            }
        }
    }

    #[test]
    fn round_trips_inline_file_data() {
        let mut root = sample_tree();
        mark_saved(&mut root);
        let mut source = std::collections::HashMap::new();
        source.insert("a/f".to_string(), b"hello".to_vec());
        let source = MapSource(source);

        let mut stream = MemStream::new();
        let opts = CreateOptions::default();
        let cancel = CancelToken::new();
        let compressor = crate::compress::NoCompressor;
        let cipher = crate::crypto::NoCipher;
        let summary = write_body(&mut root, &source, &compressor, &cipher, &opts, &cancel, &mut stream).unwrap();
        assert_eq!(summary.treated, 3); // root dir, "a" dir, "f" file

        stream.skip(0).unwrap();
        let mut sink = CollectSink { wants: true, ..Default::default() };
        let (tree, read_summary) = read_body(&mut stream, &mut sink, &cipher, &cancel).unwrap();
        assert_eq!(read_summary.treated, 3);
        assert_eq!(tree.children().len(), 1);
        assert_eq!(sink.collected.get("a/f").unwrap(), b"hello");
    }

    #[test]
    fn metadata_only_read_skips_decompression_but_still_validates_shape() {
        let mut root = sample_tree();
        mark_saved(&mut root);
        let mut source = std::collections::HashMap::new();
        source.insert("a/f".to_string(), b"hello".to_vec());
        let source = MapSource(source);

        let mut stream = MemStream::new();
        let opts = CreateOptions::default();
        let cancel = CancelToken::new();
        let compressor = crate::compress::NoCompressor;
        let cipher = crate::crypto::NoCipher;
        write_body(&mut root, &source, &compressor, &cipher, &opts, &cancel, &mut stream).unwrap();

        stream.skip(0).unwrap();
        let mut sink = NullSink;
        let (tree, _) = read_body(&mut stream, &mut sink, &cipher, &cancel).unwrap();
        let inner = &tree.children()[0];
        assert_eq!(inner.name(), "a");
        assert_eq!(inner.children()[0].name(), "f");
    }

    #[test]
    fn compressed_round_trip_preserves_bytes() {
        let mut root = Entry::Directory {
            attrs: InodeAttrs::new("", 0o755, Date::EPOCH),
            children: vec![Entry::File(FileEntry::not_saved(InodeAttrs::new("big", 0o644, Date::EPOCH), Infinint::from(400u64)))],
        };
        mark_saved(&mut root);
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(10);
        let mut source = std::collections::HashMap::new();
        source.insert("big".to_string(), payload.clone());
        let source = MapSource(source);

        let mut stream = MemStream::new();
        let mut opts = CreateOptions::default();
        opts.min_compr_size = 10;
        let cancel = CancelToken::new();
        let compressor = crate::compress::GzipCompressor;
        let cipher = crate::crypto::NoCipher;
        write_body(&mut root, &source, &compressor, &cipher, &opts, &cancel, &mut stream).unwrap();

        stream.skip(0).unwrap();
        let mut sink = CollectSink { wants: true, ..Default::default() };
        read_body(&mut stream, &mut sink, &cipher, &cancel).unwrap();
        assert_eq!(sink.collected.get("big").unwrap(), &payload);
    }
}
