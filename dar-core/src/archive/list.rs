// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `list` (§4.7): a catalogue-only read (no payload bytes ever touch
//! memory, thanks to [`BodySink::wants_data`] returning `false`),
//! rendered in one of the four formats the CLI front-end exposes.

use crate::cancel::CancelToken;
use crate::catalogue::{Entry, FileEntry};
use crate::crypto::Cipher;
use crate::error::Result;
use crate::stream::ArchiveStream;

use super::format::{read_body, NullSink};
use super::open::read_header;
use super::options::ListFormat;

/// Reads an archive's tree and renders it in `format`, never
/// decompressing or CRC-checking any file's data.
pub fn list(stream: &mut dyn ArchiveStream, cipher: &dyn Cipher, format: ListFormat, cancel: &CancelToken) -> Result<String> {
    let _ = read_header(stream, cipher)?;
    let mut sink = NullSink;
    let (root, _) = read_body(stream, &mut sink, cipher, cancel)?;
    Ok(match format {
        ListFormat::Tar => render_tar(&root, ""),
        ListFormat::Tree => render_tree(&root, 0),
        ListFormat::Xml => render_xml(&root, 0),
        ListFormat::SlicingLocation => render_slicing(&root, ""),
    })
}

fn kind_char(entry: &Entry) -> char {
    match entry {
        Entry::Directory { .. } => 'd',
        Entry::File(_) => '-',
        Entry::Symlink { .. } => 'l',
        Entry::CharDevice(_) => 'c',
        Entry::BlockDevice(_) => 'b',
        Entry::NamedPipe { .. } => 'p',
        Entry::Socket { .. } => 's',
        Entry::HardLinkAlias { .. } => 'h',
        Entry::Tombstone { .. } => 'x',
    }
}

fn size_of(entry: &Entry) -> u64 {
    match entry {
        Entry::File(FileEntry { size, .. }) => size.to_u64().unwrap_or(0),
        _ => 0,
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// One line per entry, `tar tvf`-style: permission char, mode, mtime,
/// path.
fn render_tar(entry: &Entry, parent: &str) -> String {
    let mut out = String::new();
    let path = join(parent, entry.name());
    if let Some(attrs) = entry.attrs() {
        out.push_str(&format!("{}{:o} {} {}\n", kind_char(entry), attrs.mode, attrs.mtime.unix_seconds(), if path.is_empty() { "/".into() } else { path.clone() }));
    } else {
        out.push_str(&format!("{} {}\n", kind_char(entry), path));
    }
    for child in entry.children() {
        out.push_str(&render_tar(child, &path));
    }
    out
}

/// Indented tree view, one name per line.
fn render_tree(entry: &Entry, depth: usize) -> String {
    let mut out = String::new();
    if depth > 0 || !entry.name().is_empty() {
        out.push_str(&"  ".repeat(depth.saturating_sub(1)));
        if depth > 0 {
            out.push_str("- ");
        }
        out.push_str(entry.name());
        if matches!(entry, Entry::File(_)) {
            out.push_str(&format!(" ({})", size_of(entry)));
        }
        out.push('\n');
    }
    let child_depth = if entry.name().is_empty() { depth } else { depth + 1 };
    for child in entry.children() {
        out.push_str(&render_tree(child, child_depth));
    }
    out
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn render_xml(entry: &Entry, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    let tag = match entry {
        Entry::Directory { .. } => "Directory",
        Entry::File(_) => "File",
        Entry::Symlink { .. } => "Symlink",
        Entry::CharDevice(_) | Entry::BlockDevice(_) => "Device",
        Entry::NamedPipe { .. } => "Pipe",
        Entry::Socket { .. } => "Socket",
        Entry::HardLinkAlias { .. } => "HardLink",
        Entry::Tombstone { .. } => "Tombstone",
    };
    let name = xml_escape(entry.name());
    let mut out = String::new();
    if entry.children().is_empty() {
        out.push_str(&format!("{indent}<{tag} name=\"{name}\"/>\n"));
    } else {
        out.push_str(&format!("{indent}<{tag} name=\"{name}\">\n"));
        for child in entry.children() {
            out.push_str(&render_xml(child, depth + 1));
        }
        out.push_str(&format!("{indent}</{tag}>\n"));
    }
    out
}

/// One line per file entry naming the byte offset its data starts at,
/// for mapping a restore back onto the slice that holds it.
fn render_slicing(entry: &Entry, parent: &str) -> String {
    let mut out = String::new();
    let path = join(parent, entry.name());
    if let Entry::File(f) = entry {
        match f.storage_offset {
            Some(offset) => out.push_str(&format!("{path} @{offset}\n")),
            None => out.push_str(&format!("{path} (not saved)\n")),
        }
    }
    for child in entry.children() {
        out.push_str(&render_slicing(child, &path));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::create::create;
    use crate::archive::format::FileDataSource;
    use crate::archive::options::CreateOptions;
    use crate::cancel::CancelToken;
    use crate::catalogue::{FileEntry, SavedState};
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

    fn build_archive() -> MemStream {
        let mut file = FileEntry::not_saved(InodeAttrs::new("f", 0o644, Date::from_unix_seconds(10)), Infinint::from(2u64));
        file.saved = SavedState::Saved;
        let mut root = Entry::Directory { attrs: InodeAttrs::new("", 0o755, Date::EPOCH), children: vec![Entry::File(file)] };
        let mut data = std::collections::HashMap::new();
        data.insert("f".to_string(), b"hi".to_vec());
        let source = MapSource(data);
        let mut stream = MemStream::new();
        create(&mut root, &source, &NoCipher, &CreateOptions::default(), "dar -c t -R .", &CancelToken::new(), &mut stream).unwrap();
        stream.skip(0).unwrap();
        stream
    }

    #[test]
    fn tree_format_shows_the_one_file() {
        let mut stream = build_archive();
        let out = list(&mut stream, &NoCipher, ListFormat::Tree, &CancelToken::new()).unwrap();
        assert!(out.contains("f ("));
    }

    #[test]
    fn xml_format_nests_children() {
        let mut stream = build_archive();
        let out = list(&mut stream, &NoCipher, ListFormat::Xml, &CancelToken::new()).unwrap();
        assert!(out.contains("<File name=\"f\"/>"));
    }

    #[test]
    fn slicing_location_reports_an_offset() {
        let mut stream = build_archive();
        let out = list(&mut stream, &NoCipher, ListFormat::SlicingLocation, &CancelToken::new()).unwrap();
        assert!(out.contains("f @"));
    }
}
