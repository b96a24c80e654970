// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Catalogue dump/load (§4.5): depth-first pre-order traversal with an
//! end-of-directory sentinel after each directory's children, plus the
//! per-catalogue hard-link table (§4.4's "ethernet id" scheme).
//!
//! Grounded on the teacher's `cpio::FileSystem`, which rebuilds a tree
//! from `cpio_reader::iter_files`'s flat, depth-first record stream;
//! this module plays the same "flat stream in, tree out" role but adds
//! the sentinel marker and hard-link table the cpio format doesn't need.

use std::collections::HashMap;

use crate::catalogue::ea::{EaEntry, EaSet, EaState};
use crate::catalogue::entry::{
    CompressionState, DeviceEntry, Entry, EntryTag, FileEntry, InodeAttrs, SavedState, SparseHole,
};
use crate::catalogue::fsa::{FsaEntry, FsaFamily, FsaSet};
use crate::crc::Crc;
use crate::date::{Date, SubSecondUnit};
use crate::error::{DarError, Result};
use crate::integers::Infinint;

/// A catalogue: the directory tree plus the hard-link table that lets
/// aliases resolve to the inode that first introduced each id.
pub struct Catalogue {
    pub root: Entry,
    next_ethernet_id: u64,
    /// (device, inode) -> ethernet id, populated during a filesystem
    /// walk when a file with link count > 1 is first seen.
    hardlink_table: HashMap<(u64, u64), u64>,
}

impl Catalogue {
    pub fn new(root_attrs: InodeAttrs) -> Catalogue {
        Catalogue { root: Entry::Directory { attrs: root_attrs, children: Vec::new() }, next_ethernet_id: 1, hardlink_table: HashMap::new() }
    }

    /// Wraps an already-built tree (e.g. one assembled in a test or by
    /// the filesystem walker) as a catalogue with a fresh, empty
    /// hard-link table.
    pub fn from_root(root: Entry) -> Catalogue {
        Catalogue { root, next_ethernet_id: 1, hardlink_table: HashMap::new() }
    }

    /// Registers a hard-linked inode the first time it is seen during a
    /// walk, returning the id to use; a second call with the same
    /// (device, inode) pair returns the same id so the caller can emit
    /// a [`Entry::HardLinkAlias`] instead of a full entry.
    pub fn register_hardlink(&mut self, device: u64, inode: u64) -> (u64, bool) {
        if let Some(&id) = self.hardlink_table.get(&(device, inode)) {
            return (id, false);
        }
        let id = self.next_ethernet_id;
        self.next_ethernet_id += 1;
        self.hardlink_table.insert((device, inode), id);
        (id, true)
    }

    pub fn dump(&self) -> Vec<u8> {
        let mut out = Vec::new();
        dump_entry(&self.root, &mut out);
        out
    }

    /// Loads a catalogue, verifying that every hard-link alias resolves
    /// to an id seen earlier in the stream (§4.9: unresolved hard-link
    /// id is fatal).
    pub fn load(bytes: &[u8]) -> Result<Catalogue> {
        let mut pos = 0;
        let mut seen_ids = std::collections::HashSet::new();
        let root = load_entry(bytes, &mut pos, &mut seen_ids)?;
        Ok(Catalogue { root, next_ethernet_id: 1, hardlink_table: HashMap::new() })
    }
}

fn dump_entry(entry: &Entry, out: &mut Vec<u8>) {
    out.push(entry.tag() as u8);
    match entry {
        Entry::Directory { attrs, children } => {
            dump_attrs(attrs, out);
            for child in children {
                dump_entry(child, out);
            }
            out.push(EntryTag::EndOfDirectory as u8);
        }
        Entry::File(f) => dump_file(f, out),
        Entry::Symlink { attrs, target } => {
            dump_attrs(attrs, out);
            write_string(target, out);
        }
        Entry::CharDevice(d) | Entry::BlockDevice(d) => {
            dump_attrs(&d.attrs, out);
            out.extend_from_slice(&d.major.to_be_bytes());
            out.extend_from_slice(&d.minor.to_be_bytes());
        }
        Entry::NamedPipe { attrs } | Entry::Socket { attrs } => dump_attrs(attrs, out),
        Entry::HardLinkAlias { name, id } => {
            write_string(name, out);
            out.extend_from_slice(&id.to_be_bytes());
        }
        Entry::Tombstone { name, deletion_date } => {
            write_string(name, out);
            dump_date(deletion_date, out);
        }
    }
}

fn load_entry(bytes: &[u8], pos: &mut usize, seen_ids: &mut std::collections::HashSet<u64>) -> Result<Entry> {
    let tag = take_byte(bytes, pos)?;
    let tag = EntryTag::from_byte(tag).ok_or_else(|| DarError::Data(format!("unknown catalogue tag {tag:#x}")))?;
    Ok(match tag {
        EntryTag::Directory => {
            let attrs = load_attrs(bytes, pos)?;
            let mut children = Vec::new();
            loop {
                if bytes.get(*pos) == Some(&(EntryTag::EndOfDirectory as u8)) {
                    *pos += 1;
                    break;
                }
                children.push(load_entry(bytes, pos, seen_ids)?);
            }
            Entry::Directory { attrs, children }
        }
        EntryTag::File => {
            let f = load_file(bytes, pos)?;
            if let Some(id) = f.ethernet_id {
                seen_ids.insert(id);
            }
            Entry::File(f)
        }
        EntryTag::Symlink => {
            let attrs = load_attrs(bytes, pos)?;
            let target = read_string(bytes, pos)?;
            Entry::Symlink { attrs, target }
        }
        EntryTag::CharDevice | EntryTag::BlockDevice => {
            let attrs = load_attrs(bytes, pos)?;
            let major = take_u32(bytes, pos)?;
            let minor = take_u32(bytes, pos)?;
            let d = DeviceEntry { attrs, major, minor };
            if tag == EntryTag::CharDevice {
                Entry::CharDevice(d)
            } else {
                Entry::BlockDevice(d)
            }
        }
        EntryTag::NamedPipe => Entry::NamedPipe { attrs: load_attrs(bytes, pos)? },
        EntryTag::Socket => Entry::Socket { attrs: load_attrs(bytes, pos)? },
        EntryTag::HardLinkAlias => {
            let name = read_string(bytes, pos)?;
            let id = take_u64(bytes, pos)?;
            if !seen_ids.contains(&id) {
                return Err(DarError::UnresolvedHardLink(id));
            }
            Entry::HardLinkAlias { name, id }
        }
        EntryTag::Tombstone => {
            let name = read_string(bytes, pos)?;
            let deletion_date = load_date(bytes, pos)?;
            Entry::Tombstone { name, deletion_date }
        }
        EntryTag::EndOfDirectory => return Err(DarError::Data("unexpected end-of-directory marker".into())),
    })
}

fn dump_file(f: &FileEntry, out: &mut Vec<u8>) {
    dump_attrs(&f.attrs, out);
    out.extend_from_slice(&f.size.dump());
    match f.storage_offset {
        Some(off) => {
            out.push(1);
            out.extend_from_slice(&off.to_be_bytes());
        }
        None => out.push(0),
    }
    out.push(match f.compression {
        CompressionState::None => 0,
        CompressionState::Used => 1,
    });
    out.push(match f.saved {
        SavedState::Saved => 0,
        SavedState::NotSaved => 1,
        SavedState::UnchangedSinceRef => 2,
    });
    dump_optional_crc(&f.data_crc, out);
    dump_optional_crc(&f.patch_base_crc, out);
    dump_optional_crc(&f.patch_result_crc, out);
    out.extend_from_slice(&(f.sparse_holes.len() as u32).to_be_bytes());
    for hole in &f.sparse_holes {
        out.extend_from_slice(&hole.offset.to_be_bytes());
        out.extend_from_slice(&hole.length.to_be_bytes());
    }
    match f.ethernet_id {
        Some(id) => {
            out.push(1);
            out.extend_from_slice(&id.to_be_bytes());
        }
        None => out.push(0),
    }
}

fn load_file(bytes: &[u8], pos: &mut usize) -> Result<FileEntry> {
    let attrs = load_attrs(bytes, pos)?;
    let (size, used) = Infinint::load(&bytes[*pos..])?;
    *pos += used;
    let storage_offset = match take_byte(bytes, pos)? {
        1 => Some(take_u64(bytes, pos)?),
        _ => None,
    };
    let compression = match take_byte(bytes, pos)? {
        1 => CompressionState::Used,
        _ => CompressionState::None,
    };
    let saved = match take_byte(bytes, pos)? {
        1 => SavedState::NotSaved,
        2 => SavedState::UnchangedSinceRef,
        _ => SavedState::Saved,
    };
    let data_crc = load_optional_crc(bytes, pos)?;
    let patch_base_crc = load_optional_crc(bytes, pos)?;
    let patch_result_crc = load_optional_crc(bytes, pos)?;
    let hole_count = take_u32(bytes, pos)? as usize;
    let mut sparse_holes = Vec::with_capacity(hole_count);
    for _ in 0..hole_count {
        let offset = take_u64(bytes, pos)?;
        let length = take_u64(bytes, pos)?;
        sparse_holes.push(SparseHole { offset, length });
    }
    let ethernet_id = match take_byte(bytes, pos)? {
        1 => Some(take_u64(bytes, pos)?),
        _ => None,
    };
    Ok(FileEntry {
        attrs,
        size,
        storage_offset,
        compression,
        saved,
        data_crc,
        patch_base_crc,
        patch_result_crc,
        sparse_holes,
        ethernet_id,
    })
}

pub(crate) fn dump_optional_crc(crc: &Option<Crc>, out: &mut Vec<u8>) {
    match crc {
        Some(c) => {
            out.push(1);
            out.extend_from_slice(&c.dump());
        }
        None => out.push(0),
    }
}

pub(crate) fn load_optional_crc(bytes: &[u8], pos: &mut usize) -> Result<Option<Crc>> {
    match take_byte(bytes, pos)? {
        1 => {
            let (crc, used) =
                Crc::load(&bytes[*pos..]).ok_or_else(|| DarError::Data("truncated crc".into()))?;
            *pos += used;
            Ok(Some(crc))
        }
        _ => Ok(None),
    }
}

pub(crate) fn dump_attrs(attrs: &InodeAttrs, out: &mut Vec<u8>) {
    write_string(&attrs.name, out);
    out.extend_from_slice(&attrs.uid.to_be_bytes());
    out.extend_from_slice(&attrs.gid.to_be_bytes());
    out.extend_from_slice(&attrs.mode.to_be_bytes());
    dump_date(&attrs.atime, out);
    dump_date(&attrs.mtime, out);
    dump_date(&attrs.ctime, out);
    dump_ea(&attrs.ea, out);
    dump_fsa(&attrs.fsa, out);
}

pub(crate) fn load_attrs(bytes: &[u8], pos: &mut usize) -> Result<InodeAttrs> {
    let name = read_string(bytes, pos)?;
    let uid = take_u32(bytes, pos)?;
    let gid = take_u32(bytes, pos)?;
    let mode = take_u32(bytes, pos)?;
    let atime = load_date(bytes, pos)?;
    let mtime = load_date(bytes, pos)?;
    let ctime = load_date(bytes, pos)?;
    let ea = load_ea(bytes, pos)?;
    let fsa = load_fsa(bytes, pos)?;
    Ok(InodeAttrs { name, uid, gid, mode, atime, mtime, ctime, ea, fsa })
}

pub(crate) fn dump_ea(ea: &EaSet, out: &mut Vec<u8>) {
    let state_byte = match ea.state {
        None => 0u8,
        Some(EaState::None) => 0,
        Some(EaState::Partial) => 1,
        Some(EaState::Full) => 2,
        Some(EaState::Fake) => 3,
        Some(EaState::Removed) => 4,
    };
    out.push(state_byte);
    out.extend_from_slice(&(ea.entries.len() as u32).to_be_bytes());
    for entry in &ea.entries {
        write_string(&entry.name, out);
        out.extend_from_slice(&(entry.value.len() as u32).to_be_bytes());
        out.extend_from_slice(&entry.value);
    }
}

pub(crate) fn load_ea(bytes: &[u8], pos: &mut usize) -> Result<EaSet> {
    let state = match take_byte(bytes, pos)? {
        1 => Some(EaState::Partial),
        2 => Some(EaState::Full),
        3 => Some(EaState::Fake),
        4 => Some(EaState::Removed),
        _ => None,
    };
    let count = take_u32(bytes, pos)? as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let name = read_string(bytes, pos)?;
        let len = take_u32(bytes, pos)? as usize;
        let value = take_bytes(bytes, pos, len)?.to_vec();
        entries.push(EaEntry { name, value });
    }
    Ok(EaSet { state, entries })
}

pub(crate) fn dump_fsa(fsa: &FsaSet, out: &mut Vec<u8>) {
    out.extend_from_slice(&(fsa.entries.len() as u32).to_be_bytes());
    for entry in &fsa.entries {
        out.push(match entry.family {
            FsaFamily::LinuxExtN => 0,
            FsaFamily::HfsPlus => 1,
        });
        out.extend_from_slice(&entry.bits.to_be_bytes());
    }
}

pub(crate) fn load_fsa(bytes: &[u8], pos: &mut usize) -> Result<FsaSet> {
    let count = take_u32(bytes, pos)? as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let family = match take_byte(bytes, pos)? {
            1 => FsaFamily::HfsPlus,
            _ => FsaFamily::LinuxExtN,
        };
        let bits = take_u64(bytes, pos)?;
        entries.push(FsaEntry { family, bits });
    }
    Ok(FsaSet { entries })
}

pub(crate) fn dump_date(date: &Date, out: &mut Vec<u8>) {
    out.extend_from_slice(&date.unix_seconds().to_be_bytes());
    let (subsec, unit_byte) = match date.unit() {
        SubSecondUnit::Second => (0u32, 0u8),
        SubSecondUnit::Microsecond => (0, 1),
        SubSecondUnit::Nanosecond => (0, 2),
    };
    let _ = subsec;
    out.extend_from_slice(&0u32.to_be_bytes());
    out.push(unit_byte);
}

pub(crate) fn load_date(bytes: &[u8], pos: &mut usize) -> Result<Date> {
    let seconds = take_i64(bytes, pos)?;
    let subsec = take_u32(bytes, pos)?;
    let unit = match take_byte(bytes, pos)? {
        1 => SubSecondUnit::Microsecond,
        2 => SubSecondUnit::Nanosecond,
        _ => SubSecondUnit::Second,
    };
    Ok(Date::new(seconds, subsec, unit))
}

pub(crate) fn write_string(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

pub(crate) fn read_string(bytes: &[u8], pos: &mut usize) -> Result<String> {
    let len = take_u32(bytes, pos)? as usize;
    let raw = take_bytes(bytes, pos, len)?;
    String::from_utf8(raw.to_vec()).map_err(|_| DarError::Data("non-utf8 catalogue name".into()))
}

pub(crate) fn take_byte(bytes: &[u8], pos: &mut usize) -> Result<u8> {
    let b = *bytes.get(*pos).ok_or_else(|| DarError::Data("truncated catalogue".into()))?;
    *pos += 1;
    Ok(b)
}

fn take_bytes<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = *pos + len;
    let slice = bytes.get(*pos..end).ok_or_else(|| DarError::Data("truncated catalogue".into()))?;
    *pos = end;
    Ok(slice)
}

pub(crate) fn take_u32(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    Ok(u32::from_be_bytes(take_bytes(bytes, pos, 4)?.try_into().unwrap()))
}

pub(crate) fn take_u64(bytes: &[u8], pos: &mut usize) -> Result<u64> {
    Ok(u64::from_be_bytes(take_bytes(bytes, pos, 8)?.try_into().unwrap()))
}

pub(crate) fn take_i64(bytes: &[u8], pos: &mut usize) -> Result<i64> {
    Ok(i64::from_be_bytes(take_bytes(bytes, pos, 8)?.try_into().unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: u64) -> Entry {
        let attrs = InodeAttrs::new(name, 0o644, Date::from_unix_seconds(100));
        Entry::File(FileEntry {
            attrs,
            size: Infinint::from(size),
            storage_offset: Some(16),
            compression: CompressionState::None,
            saved: SavedState::Saved,
            data_crc: Some(Crc::from_bytes(b"hello")),
            patch_base_crc: None,
            patch_result_crc: None,
            sparse_holes: Vec::new(),
            ethernet_id: None,
        })
    }

    #[test]
    fn round_trips_a_directory_with_one_file() {
        // P1 / B2 shape: a directory with a single file round-trips.
        let root = Entry::Directory {
            attrs: InodeAttrs::new("", 0o755, Date::from_unix_seconds(50)),
            children: vec![file("f", 5)],
        };
        let cat = Catalogue { root, next_ethernet_id: 1, hardlink_table: HashMap::new() };
        let bytes = cat.dump();
        let back = Catalogue::load(&bytes).unwrap();
        assert_eq!(back.root.children().len(), 1);
        assert_eq!(back.root.children()[0].name(), "f");
    }

    #[test]
    fn empty_directory_round_trips() {
        // B2: an archive whose only content is an empty directory.
        let root = Entry::Directory { attrs: InodeAttrs::new("", 0o755, Date::EPOCH), children: vec![] };
        let cat = Catalogue { root, next_ethernet_id: 1, hardlink_table: HashMap::new() };
        let back = Catalogue::load(&cat.dump()).unwrap();
        assert!(back.root.children().is_empty());
    }

    #[test]
    fn unresolved_hardlink_alias_is_rejected() {
        let root = Entry::Directory {
            attrs: InodeAttrs::new("", 0o755, Date::EPOCH),
            children: vec![Entry::HardLinkAlias { name: "dangling".into(), id: 99 }],
        };
        let cat = Catalogue { root, next_ethernet_id: 1, hardlink_table: HashMap::new() };
        let err = Catalogue::load(&cat.dump());
        assert!(matches!(err, Err(DarError::UnresolvedHardLink(99))));
    }

    #[test]
    fn hardlink_alias_resolves_against_earlier_file_sighting() {
        let mut first = file("f1", 5);
        if let Entry::File(f) = &mut first {
            f.ethernet_id = Some(7);
        }
        let root = Entry::Directory {
            attrs: InodeAttrs::new("", 0o755, Date::EPOCH),
            children: vec![first, Entry::HardLinkAlias { name: "f2".into(), id: 7 }],
        };
        let cat = Catalogue { root, next_ethernet_id: 1, hardlink_table: HashMap::new() };
        let back = Catalogue::load(&cat.dump()).unwrap();
        assert_eq!(back.root.children().len(), 2);
    }

    #[test]
    fn register_hardlink_reuses_id_for_same_device_inode() {
        let mut cat = Catalogue::new(InodeAttrs::new("", 0o755, Date::EPOCH));
        let (id1, first) = cat.register_hardlink(1, 42);
        assert!(first);
        let (id2, first2) = cat.register_hardlink(1, 42);
        assert_eq!(id1, id2);
        assert!(!first2);
    }
}
