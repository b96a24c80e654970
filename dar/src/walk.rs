// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builds an [`Entry`] tree from a live filesystem subtree, and supplies
//! each Saved file's bytes back to the archive writer through
//! [`FileDataSource`]. Grounded on `walkdir`'s pre-order depth-first
//! iteration, which matches dump order (c): "directories are traversed
//! in insertion order" — a stack of open directory frames is popped
//! one level at a time exactly when the iterator's depth drops back to
//! (or below) that frame's own depth.

use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use dar_core::archive::FileDataSource;
use dar_core::catalogue::{Catalogue, DeviceEntry, Entry, FileEntry, InodeAttrs, SavedState};
use dar_core::date::Date;
use dar_core::error::{DarError, Result};
use dar_core::integers::Infinint;

/// Reads a Saved file's bytes straight off disk, keyed by the same
/// path components the walker recorded in the tree.
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> FsSource {
        FsSource { root: root.into() }
    }
}

impl FileDataSource for FsSource {
    fn read_all(&self, path: &[String]) -> Result<Vec<u8>> {
        let mut full = self.root.clone();
        for component in path {
            full.push(component);
        }
        fs::read(&full).map_err(|e| DarError::Io { path: full, source: e })
    }
}

fn attrs_from_metadata(name: &str, meta: &fs::Metadata) -> InodeAttrs {
    InodeAttrs {
        name: name.to_string(),
        uid: meta.uid(),
        gid: meta.gid(),
        mode: meta.mode(),
        atime: Date::from_unix_seconds(meta.atime()),
        mtime: Date::from_unix_seconds(meta.mtime()),
        ctime: Date::from_unix_seconds(meta.ctime()),
        ea: dar_core::catalogue::ea::EaSet::none(),
        fsa: dar_core::catalogue::fsa::FsaSet::empty(),
    }
}

fn major(rdev: u64) -> u32 {
    ((rdev >> 8) & 0xfff) as u32
}

fn minor(rdev: u64) -> u32 {
    (rdev & 0xff) as u32
}

/// Walks `root` and returns a [`Catalogue`] whose tree mirrors the
/// directory structure, with every regular file marked `Saved`.
pub fn build_catalogue(root: &Path) -> Result<Catalogue> {
    let root_meta = fs::symlink_metadata(root).map_err(|e| DarError::Io { path: root.to_path_buf(), source: e })?;
    let mut catalogue = Catalogue::from_root(Entry::Directory {
        attrs: InodeAttrs::new("", root_meta.mode(), Date::from_unix_seconds(root_meta.mtime())),
        children: Vec::new(),
    });

    // Frame 0 is the root itself; frame i>0 is an open directory at
    // depth i, closed (folded into its parent's children) once the
    // walk returns to a shallower or equal depth.
    let mut stack: Vec<(InodeAttrs, Vec<Entry>)> = vec![(InodeAttrs::new("", root_meta.mode(), Date::from_unix_seconds(root_meta.mtime())), Vec::new())];

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| DarError::Data(e.to_string()))?;
        let depth = entry.depth();
        while stack.len() > depth {
            let (attrs, children) = stack.pop().unwrap();
            stack.last_mut().unwrap().1.push(Entry::Directory { attrs, children });
        }

        let name = entry.file_name().to_string_lossy().to_string();
        let meta = entry.metadata().map_err(|e| DarError::Data(e.to_string()))?;

        if meta.is_dir() {
            stack.push((attrs_from_metadata(&name, &meta), Vec::new()));
            continue;
        }

        let node = if meta.file_type().is_symlink() {
            let target = fs::read_link(entry.path()).map_err(|e| DarError::Io { path: entry.path().to_path_buf(), source: e })?;
            Entry::Symlink { attrs: attrs_from_metadata(&name, &meta), target: target.to_string_lossy().to_string() }
        } else if meta.file_type().is_char_device() {
            Entry::CharDevice(DeviceEntry { attrs: attrs_from_metadata(&name, &meta), major: major(meta.rdev()), minor: minor(meta.rdev()) })
        } else if meta.file_type().is_block_device() {
            Entry::BlockDevice(DeviceEntry { attrs: attrs_from_metadata(&name, &meta), major: major(meta.rdev()), minor: minor(meta.rdev()) })
        } else if meta.file_type().is_fifo() {
            Entry::NamedPipe { attrs: attrs_from_metadata(&name, &meta) }
        } else if meta.file_type().is_socket() {
            Entry::Socket { attrs: attrs_from_metadata(&name, &meta) }
        } else if meta.nlink() > 1 {
            let (id, first_sighting) = catalogue.register_hardlink(meta.dev(), meta.ino());
            if first_sighting {
                let mut file = FileEntry::not_saved(attrs_from_metadata(&name, &meta), Infinint::from(meta.len()));
                file.saved = SavedState::Saved;
                file.ethernet_id = Some(id);
                Entry::File(file)
            } else {
                Entry::HardLinkAlias { name, id }
            }
        } else {
            let mut file = FileEntry::not_saved(attrs_from_metadata(&name, &meta), Infinint::from(meta.len()));
            file.saved = SavedState::Saved;
            Entry::File(file)
        };

        stack.last_mut().unwrap().1.push(node);
    }

    while stack.len() > 1 {
        let (attrs, children) = stack.pop().unwrap();
        stack.last_mut().unwrap().1.push(Entry::Directory { attrs, children });
    }
    let (_, root_children) = stack.pop().unwrap();
    if let Entry::Directory { children, .. } = &mut catalogue.root {
        *children = root_children;
    }

    Ok(catalogue)
}
