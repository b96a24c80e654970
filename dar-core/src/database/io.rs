// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The database file format (§6 "Database file"): magic header +
//! algorithm discriminator + compressed payload, whose payload is the
//! archive list followed by the serialised version tree.
//!
//! Supports a "partial" load mode (header + archive list + options
//! only; tree bytes retained verbatim) so metadata edits (rename
//! archive, change path) can be re-dumped without reparsing the tree,
//! and a "partial read-only" mode that skips even that, for listing.

use crate::compress::CompressionAlgo;
use crate::database::node::{ArchiveNumber, Node, Record, VersionState};
use crate::date::Date;
use crate::error::{DarError, Result};

pub const DATABASE_MAGIC: u32 = 0xDA7_ABA5;

#[derive(Clone, Debug)]
pub struct ArchiveRecord {
    pub path: String,
    pub basename: String,
    pub root_mtime: Date,
}

/// A loaded database: the archive list, the options vector the
/// original `dar_manager` forwarded to the `dar` executable, its path,
/// and the version tree — or, in partial mode, the tree's raw bytes
/// retained for a later verbatim re-dump.
pub struct Database {
    pub archives: Vec<ArchiveRecord>,
    pub options: Vec<String>,
    pub dar_executable: String,
    pub tree: TreeRepr,
}

pub enum TreeRepr {
    Parsed(Node),
    /// Partial-load mode: the tree bytes are kept as-is so metadata
    /// edits can be re-dumped without reparsing.
    Raw(Vec<u8>),
}

impl Database {
    pub fn new(dar_executable: impl Into<String>) -> Database {
        Database { archives: Vec::new(), options: Vec::new(), dar_executable: dar_executable.into(), tree: TreeRepr::Parsed(Node::new("")) }
    }

    pub fn dump(&self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&crate::integers::Infinint::from(self.archives.len() as u64).dump());
        for a in &self.archives {
            write_string(&a.path, &mut payload);
            write_string(&a.basename, &mut payload);
            write_date(&a.root_mtime, &mut payload);
        }
        payload.extend_from_slice(&(self.options.len() as u32).to_be_bytes());
        for opt in &self.options {
            write_string(opt, &mut payload);
        }
        write_string(&self.dar_executable, &mut payload);
        match &self.tree {
            TreeRepr::Parsed(tree) => dump_tree(tree, &mut payload),
            TreeRepr::Raw(bytes) => payload.extend_from_slice(bytes),
        }

        let compressed = crate::compress::compressor_for(CompressionAlgo::Gzip).compress(6, &payload)?;
        let mut out = Vec::new();
        out.extend_from_slice(&DATABASE_MAGIC.to_be_bytes());
        out.push(CompressionAlgo::Gzip.discriminator());
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    pub fn load(bytes: &[u8], partial: bool) -> Result<Database> {
        if bytes.len() < 5 {
            return Err(DarError::BadHeader("truncated database file".into()));
        }
        let magic = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        if magic != DATABASE_MAGIC {
            return Err(DarError::BadHeader(format!("bad database magic {magic:#x}")));
        }
        let algo = CompressionAlgo::from_discriminator(bytes[4])?;
        let payload = crate::compress::compressor_for(algo).decompress(&bytes[5..])?;

        let mut pos = 0usize;
        let (count, used) = crate::integers::Infinint::load(&payload[pos..])?;
        pos += used;
        let count = count.to_usize().ok_or_else(|| DarError::Range("archive count too large".into()))?;
        let mut archives = Vec::with_capacity(count);
        for _ in 0..count {
            let path = read_string(&payload, &mut pos)?;
            let basename = read_string(&payload, &mut pos)?;
            let root_mtime = read_date(&payload, &mut pos)?;
            archives.push(ArchiveRecord { path, basename, root_mtime });
        }
        let opt_count = take_u32(&payload, &mut pos)? as usize;
        let mut options = Vec::with_capacity(opt_count);
        for _ in 0..opt_count {
            options.push(read_string(&payload, &mut pos)?);
        }
        let dar_executable = read_string(&payload, &mut pos)?;

        let tree = if partial {
            TreeRepr::Raw(payload[pos..].to_vec())
        } else {
            TreeRepr::Parsed(load_tree(&payload, &mut pos)?)
        };
        Ok(Database { archives, options, dar_executable, tree })
    }
}

fn dump_tree(node: &Node, out: &mut Vec<u8>) {
    let is_dir = !node.children.is_empty();
    out.push(if is_dir { b'd' } else { b't' });
    write_string(&node.name, out);
    dump_version_map(&node.last_mod, out);
    dump_version_map(&node.last_change, out);
    if is_dir {
        out.extend_from_slice(&crate::integers::Infinint::from(node.children.len() as u64).dump());
        for child in &node.children {
            dump_tree(child, out);
        }
    }
}

fn load_tree(bytes: &[u8], pos: &mut usize) -> Result<Node> {
    let tag = take_byte(bytes, pos)?;
    let name = read_string(bytes, pos)?;
    let last_mod = load_version_map(bytes, pos)?;
    let last_change = load_version_map(bytes, pos)?;
    let mut children = Vec::new();
    if tag == b'd' {
        let (count, used) = crate::integers::Infinint::load(&bytes[*pos..])?;
        *pos += used;
        let count = count.to_usize().ok_or_else(|| DarError::Range("child count too large".into()))?;
        for _ in 0..count {
            children.push(load_tree(bytes, pos)?);
        }
    } else if tag != b't' {
        return Err(DarError::UnknownRecordSignature(tag));
    }
    Ok(Node { name, last_mod, last_change, children })
}

fn dump_version_map(map: &std::collections::BTreeMap<ArchiveNumber, Record>, out: &mut Vec<u8>) {
    out.extend_from_slice(&(map.len() as u32).to_be_bytes());
    for (arch, record) in map {
        out.extend_from_slice(&arch.to_be_bytes());
        write_date(&record.date, out);
        out.push(state_byte(record.state));
    }
}

fn load_version_map(bytes: &[u8], pos: &mut usize) -> Result<std::collections::BTreeMap<ArchiveNumber, Record>> {
    let count = take_u32(bytes, pos)? as usize;
    let mut map = std::collections::BTreeMap::new();
    for _ in 0..count {
        let arch = take_u32(bytes, pos)?;
        let date = read_date(bytes, pos)?;
        let state = state_from_byte(take_byte(bytes, pos)?)?;
        map.insert(arch, Record { date, state });
    }
    Ok(map)
}

fn state_byte(s: VersionState) -> u8 {
    match s {
        VersionState::Saved => 0,
        VersionState::Present => 1,
        VersionState::Removed => 2,
        VersionState::Absent => 3,
        VersionState::Patch => 4,
        VersionState::PatchUnusable => 5,
        VersionState::InodeOnly => 6,
    }
}

fn state_from_byte(b: u8) -> Result<VersionState> {
    Ok(match b {
        0 => VersionState::Saved,
        1 => VersionState::Present,
        2 => VersionState::Removed,
        3 => VersionState::Absent,
        4 => VersionState::Patch,
        5 => VersionState::PatchUnusable,
        6 => VersionState::InodeOnly,
        other => return Err(DarError::UnknownRecordSignature(other)),
    })
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn read_string(bytes: &[u8], pos: &mut usize) -> Result<String> {
    let len = take_u32(bytes, pos)? as usize;
    let end = *pos + len;
    let raw = bytes.get(*pos..end).ok_or_else(|| DarError::Data("truncated database string".into()))?;
    *pos = end;
    String::from_utf8(raw.to_vec()).map_err(|_| DarError::Data("non-utf8 database string".into()))
}

fn write_date(date: &Date, out: &mut Vec<u8>) {
    out.extend_from_slice(&date.unix_seconds().to_be_bytes());
}

fn read_date(bytes: &[u8], pos: &mut usize) -> Result<Date> {
    let secs = i64::from_be_bytes(
        bytes.get(*pos..*pos + 8).ok_or_else(|| DarError::Data("truncated date".into()))?.try_into().unwrap(),
    );
    *pos += 8;
    Ok(Date::from_unix_seconds(secs))
}

fn take_byte(bytes: &[u8], pos: &mut usize) -> Result<u8> {
    let b = *bytes.get(*pos).ok_or_else(|| DarError::Data("truncated database record".into()))?;
    *pos += 1;
    Ok(b)
}

fn take_u32(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    let end = *pos + 4;
    let slice = bytes.get(*pos..end).ok_or_else(|| DarError::Data("truncated database record".into()))?;
    *pos = end;
    Ok(u32::from_be_bytes(slice.try_into().unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_empty_database() {
        let db = Database::new("/usr/bin/dar");
        let bytes = db.dump().unwrap();
        let back = Database::load(&bytes, false).unwrap();
        assert_eq!(back.dar_executable, "/usr/bin/dar");
        assert!(back.archives.is_empty());
    }

    #[test]
    fn round_trips_archives_and_tree_shape() {
        let mut db = Database::new("/usr/bin/dar");
        db.archives.push(ArchiveRecord { path: "/backups".into(), basename: "arc".into(), root_mtime: Date::from_unix_seconds(100) });
        let mut root = Node::new("");
        root.update_with(&["a".into(), "f".into()], 1, Date::from_unix_seconds(50), VersionState::Saved, None);
        db.tree = TreeRepr::Parsed(root);

        let bytes = db.dump().unwrap();
        let back = Database::load(&bytes, false).unwrap();
        assert_eq!(back.archives.len(), 1);
        let TreeRepr::Parsed(tree) = back.tree else { panic!("expected parsed tree") };
        assert_eq!(tree.child("a").unwrap().child("f").unwrap().last_mod.len(), 1);
    }

    #[test]
    fn partial_mode_keeps_tree_bytes_verbatim() {
        let mut db = Database::new("/usr/bin/dar");
        let mut root = Node::new("");
        root.update_with(&["f".into()], 1, Date::from_unix_seconds(1), VersionState::Saved, None);
        db.tree = TreeRepr::Parsed(root);
        let bytes = db.dump().unwrap();

        let partial = Database::load(&bytes, true).unwrap();
        let TreeRepr::Raw(raw) = &partial.tree else { panic!("expected raw tree") };
        assert!(!raw.is_empty());
    }
}
