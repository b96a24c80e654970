// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A [`RestoreTarget`] that writes directly onto the live filesystem,
//! rooted at a chosen directory.

use std::fs;
use std::os::unix::fs::{symlink, MetadataExt, PermissionsExt};
use std::path::PathBuf;

use dar_core::archive::RestoreTarget;
use dar_core::catalogue::{Entry, InodeAttrs};
use dar_core::date::Date;
use dar_core::error::{DarError, Result};

pub struct FsRestoreTarget {
    root: PathBuf,
}

impl FsRestoreTarget {
    pub fn new(root: impl Into<PathBuf>) -> FsRestoreTarget {
        FsRestoreTarget { root: root.into() }
    }

    fn full_path(&self, path: &[String]) -> PathBuf {
        let mut full = self.root.clone();
        for component in path {
            full.push(component);
        }
        full
    }
}

impl RestoreTarget for FsRestoreTarget {
    fn existing(&self, path: &[String]) -> Option<Entry> {
        let full = self.full_path(path);
        let meta = fs::symlink_metadata(&full).ok()?;
        let name = path.last().cloned().unwrap_or_default();
        let attrs = InodeAttrs {
            name,
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode(),
            atime: Date::from_unix_seconds(meta.atime()),
            mtime: Date::from_unix_seconds(meta.mtime()),
            ctime: Date::from_unix_seconds(meta.ctime()),
            ea: dar_core::catalogue::ea::EaSet::none(),
            fsa: dar_core::catalogue::fsa::FsaSet::empty(),
        };
        Some(if meta.is_dir() {
            Entry::Directory { attrs, children: Vec::new() }
        } else {
            Entry::File(dar_core::catalogue::FileEntry::not_saved(attrs, dar_core::integers::Infinint::from(meta.len())))
        })
    }

    fn make_directory(&mut self, path: &[String], attrs: &InodeAttrs) -> Result<()> {
        let full = self.full_path(path);
        fs::create_dir_all(&full).map_err(|e| DarError::Io { path: full.clone(), source: e })?;
        fs::set_permissions(&full, fs::Permissions::from_mode(attrs.mode)).map_err(|e| DarError::Io { path: full, source: e })
    }

    fn write_entry(&mut self, path: &[String], entry: &Entry, raw: Option<&[u8]>) -> Result<()> {
        let full = self.full_path(path);
        match entry {
            Entry::File(f) => {
                if let Some(raw) = raw {
                    fs::write(&full, raw).map_err(|e| DarError::Io { path: full.clone(), source: e })?;
                }
                fs::set_permissions(&full, fs::Permissions::from_mode(f.attrs.mode)).map_err(|e| DarError::Io { path: full, source: e })
            }
            Entry::Symlink { target, .. } => {
                let _ = fs::remove_file(&full);
                symlink(target, &full).map_err(|e| DarError::Io { path: full, source: e })
            }
            Entry::NamedPipe { .. } | Entry::Socket { .. } | Entry::CharDevice(_) | Entry::BlockDevice(_) => {
                // Device and special-file creation requires mknod, which
                // the standard library doesn't expose; skip rather than
                // silently write a regular file in its place.
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn apply_ea(&mut self, _path: &[String], _attrs: &InodeAttrs) -> Result<()> {
        Ok(())
    }

    fn apply_fsa(&mut self, _path: &[String], _attrs: &InodeAttrs) -> Result<()> {
        Ok(())
    }

    fn remove(&mut self, path: &[String]) -> Result<()> {
        let full = self.full_path(path);
        match fs::symlink_metadata(&full) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&full).map_err(|e| DarError::Io { path: full, source: e }),
            Ok(_) => fs::remove_file(&full).map_err(|e| DarError::Io { path: full, source: e }),
            Err(_) => Ok(()),
        }
    }
}
