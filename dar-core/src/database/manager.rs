// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `dar_manager` surface (§4.8): `add_archive`, `remove_archive`,
//! `set_permutation`, `get_files`, `get_version`, and `restore`, all
//! operating on one in-memory [`Database`].

use crate::catalogue::{Catalogue, Entry};
use crate::database::io::{ArchiveRecord, Database, TreeRepr};
use crate::database::node::{ArchiveNumber, Node, VersionState};
use crate::database::planner::{plan_restore, PlanStep};
use crate::date::Date;
use crate::error::{DarError, Result};

pub struct Manager {
    pub database: Database,
}

impl Manager {
    pub fn new(dar_executable: impl Into<String>) -> Manager {
        Manager { database: Database::new(dar_executable) }
    }

    fn tree_mut(&mut self) -> Result<&mut Node> {
        match &mut self.database.tree {
            TreeRepr::Parsed(node) => Ok(node),
            TreeRepr::Raw(_) => Err(DarError::LibraryCall("database was loaded in partial mode; reload fully before mutating".into())),
        }
    }

    /// Registers a new archive at the next 1-based archive number and
    /// folds every entry of its catalogue into the tree, then
    /// synthesizes `absent` records for paths this archive dropped.
    pub fn add_archive(&mut self, path: impl Into<String>, basename: impl Into<String>, catalogue: &Catalogue, root_mtime: Date) -> Result<ArchiveNumber> {
        let arch = self.database.archives.len() as ArchiveNumber + 1;
        self.database.archives.push(ArchiveRecord { path: path.into(), basename: basename.into(), root_mtime });

        let tree = self.tree_mut()?;
        fold_entry(tree, &catalogue.root, &mut Vec::new(), arch);
        tree.finalize_except_self(arch, root_mtime);
        Ok(arch)
    }

    /// Removes every record in `[min, max]` from every node, pruning
    /// nodes left with empty maps.
    pub fn remove_archive(&mut self, min: ArchiveNumber, max: ArchiveNumber) -> Result<()> {
        let tree = self.tree_mut()?;
        tree.remove_archive_range(min, max);
        let min_idx = (min as usize).saturating_sub(1);
        let max_idx = (max as usize).min(self.database.archives.len());
        if min_idx < max_idx {
            self.database.archives.drain(min_idx..max_idx);
        }
        Ok(())
    }

    /// Moves archive `src` to position `dst`; the tree's archive-number
    /// keys for the moved slots are remapped and the boundary slots are
    /// re-finalized, per §4.8.
    pub fn set_permutation(&mut self, src: ArchiveNumber, dst: ArchiveNumber) -> Result<()> {
        if src == dst {
            // P6: a no-op permutation leaves the tree untouched.
            return Ok(());
        }
        let root_mtime = self.database.archives.get((dst.max(1) - 1) as usize).map(|a| a.root_mtime).unwrap_or(Date::EPOCH);
        if (src as usize) <= self.database.archives.len() && (dst as usize) <= self.database.archives.len() {
            let record = self.database.archives.remove(src as usize - 1);
            self.database.archives.insert(dst as usize - 1, record);
        }
        remap_archive_numbers(self.tree_mut()?, src, dst);
        let min = src.min(dst);
        let max = src.max(dst);
        let tree = self.tree_mut()?;
        tree.finalize_except_self(min, root_mtime);
        tree.finalize_except_self(max, root_mtime);
        tree.finalize_except_self(max + 1, root_mtime);
        Ok(())
    }

    /// Streams every path recorded in archive `num`.
    pub fn get_files(&self, num: ArchiveNumber) -> Result<Vec<String>> {
        let TreeRepr::Parsed(tree) = &self.database.tree else {
            return Err(DarError::LibraryCall("database loaded in partial mode".into()));
        };
        let mut out = Vec::new();
        collect_files(tree, num, &mut Vec::new(), &mut out);
        Ok(out)
    }

    /// Streams one row per archive in which `path` appears.
    pub fn get_version(&self, path: &str) -> Result<Vec<(ArchiveNumber, VersionState, Date)>> {
        let TreeRepr::Parsed(tree) = &self.database.tree else {
            return Err(DarError::LibraryCall("database loaded in partial mode".into()));
        };
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let mut cur = tree;
        for c in &components {
            let Some(next) = cur.child(c) else { return Ok(Vec::new()) };
            cur = next;
        }
        let mut rows: Vec<_> = cur.last_mod.iter().map(|(a, r)| (*a, r.state, r.date)).collect();
        rows.sort_by_key(|(a, _, _)| *a);
        Ok(rows)
    }

    pub fn restore_plan(&self, paths: &[&str], date: Date) -> Result<Vec<PlanStep>> {
        let TreeRepr::Parsed(tree) = &self.database.tree else {
            return Err(DarError::LibraryCall("database loaded in partial mode".into()));
        };
        Ok(paths.iter().flat_map(|p| plan_restore(tree, p, date)).collect())
    }

    pub fn check_order(&self) -> Result<Vec<String>> {
        let TreeRepr::Parsed(tree) = &self.database.tree else {
            return Err(DarError::LibraryCall("database loaded in partial mode".into()));
        };
        Ok(tree.check_order())
    }
}

fn fold_entry(tree: &mut Node, entry: &Entry, path: &mut Vec<String>, arch: ArchiveNumber) {
    match entry {
        Entry::Directory { attrs, children } => {
            if !path.is_empty() {
                let data_state = VersionState::Saved;
                let ea = if !attrs.ea.is_empty() { Some((attrs.ctime, VersionState::Saved)) } else { None };
                tree.update_with(path, arch, attrs.mtime, data_state, ea);
            }
            for child in children {
                path.push(child.name().to_string());
                fold_entry(tree, child, path, arch);
                path.pop();
            }
        }
        Entry::File(f) => {
            let data_state = match f.saved {
                crate::catalogue::SavedState::Saved => VersionState::Saved,
                crate::catalogue::SavedState::NotSaved => VersionState::InodeOnly,
                crate::catalogue::SavedState::UnchangedSinceRef => VersionState::Present,
            };
            let ea = if !f.attrs.ea.is_empty() { Some((f.attrs.ctime, VersionState::Saved)) } else { None };
            tree.update_with(path, arch, f.attrs.mtime, data_state, ea);
        }
        Entry::Tombstone { deletion_date, .. } => {
            tree.update_with(path, arch, *deletion_date, VersionState::Removed, None);
        }
        other => {
            if let Some(attrs) = other.attrs() {
                tree.update_with(path, arch, attrs.mtime, VersionState::Saved, None);
            }
        }
    }
}

fn collect_files(node: &Node, num: ArchiveNumber, path: &mut Vec<String>, out: &mut Vec<String>) {
    if node.last_mod.contains_key(&num) && !path.is_empty() {
        out.push(path.join("/"));
    }
    for child in &node.children {
        path.push(child.name.clone());
        collect_files(child, num, path, out);
        path.pop();
    }
}

fn remap_archive_numbers(node: &mut Node, src: ArchiveNumber, dst: ArchiveNumber) {
    remap_map(&mut node.last_mod, src, dst);
    remap_map(&mut node.last_change, src, dst);
    for child in &mut node.children {
        remap_archive_numbers(child, src, dst);
    }
}

fn remap_map(map: &mut std::collections::BTreeMap<ArchiveNumber, crate::database::node::Record>, src: ArchiveNumber, dst: ArchiveNumber) {
    let moved = map.remove(&src);
    if src < dst {
        let shifted: Vec<_> = map.range((src + 1)..=dst).map(|(k, v)| (*k, *v)).collect();
        for (k, v) in shifted {
            map.remove(&k);
            map.insert(k - 1, v);
        }
    } else {
        let shifted: Vec<_> = map.range(dst..src).map(|(k, v)| (*k, *v)).collect();
        for (k, v) in shifted {
            map.remove(&k);
            map.insert(k + 1, v);
        }
    }
    if let Some(v) = moved {
        map.insert(dst, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{Entry, InodeAttrs};
    use crate::integers::Infinint;

    fn simple_catalogue() -> Catalogue {
        let file = Entry::File(crate::catalogue::FileEntry::not_saved(
            InodeAttrs::new("f", 0o644, Date::from_unix_seconds(100)),
            Infinint::from(5u64),
        ));
        let root = Entry::Directory { attrs: InodeAttrs::new("", 0o755, Date::EPOCH), children: vec![
            Entry::Directory { attrs: InodeAttrs::new("a", 0o755, Date::EPOCH), children: vec![file] },
        ] };
        Catalogue::load(&Catalogue::from_root(root).dump()).unwrap()
    }

    #[test]
    fn add_archive_then_get_version_matches_seed_scenario_3() {
        let mut manager = Manager::new("/usr/bin/dar");
        let cat = simple_catalogue();
        manager.add_archive("/backups", "arc1", &cat, Date::from_unix_seconds(100)).unwrap();

        let empty = Catalogue::new(InodeAttrs::new("", 0o755, Date::EPOCH));
        manager.add_archive("/backups", "arc2", &empty, Date::from_unix_seconds(200)).unwrap();

        let rows = manager.get_version("a/f").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], (1, VersionState::InodeOnly, Date::from_unix_seconds(100)));
        assert_eq!(rows[1].0, 2);
        assert_eq!(rows[1].1, VersionState::Absent);
    }

    #[test]
    fn permutation_to_self_is_a_no_op() {
        // P6
        let mut manager = Manager::new("/usr/bin/dar");
        let cat = simple_catalogue();
        manager.add_archive("/backups", "arc1", &cat, Date::from_unix_seconds(100)).unwrap();
        let before = manager.get_version("a/f").unwrap();
        manager.set_permutation(1, 1).unwrap();
        let after = manager.get_version("a/f").unwrap();
        assert_eq!(before, after);
    }
}
