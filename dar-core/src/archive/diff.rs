// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `diff` (§4.7): compares a catalogue tree (typically read off an
//! archive) against another tree — the live filesystem, represented by
//! an [`Entry`] tree the caller's walker already built, or a second
//! archive's catalogue — field by field per [`ComparisonFields`].

use std::collections::BTreeMap;

use crate::catalogue::Entry;

use super::options::ComparisonFields;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
    Same,
}

#[derive(Clone, Debug)]
pub struct DiffRecord {
    pub path: String,
    pub kind: DiffKind,
}

/// Walks `reference` (e.g. the archive's catalogue) against `live`
/// (e.g. a freshly-built filesystem tree), reporting every path that
/// differs. Paths present in only one side are `Added`/`Removed`
/// relative to `live`; paths in both are compared per `fields`.
pub fn diff(reference: &Entry, live: &Entry, fields: ComparisonFields) -> Vec<DiffRecord> {
    let mut out = Vec::new();
    walk(reference, live, "", fields, &mut out);
    out
}

fn walk(reference: &Entry, live: &Entry, path: &str, fields: ComparisonFields, out: &mut Vec<DiffRecord>) {
    let kind = compare_one(reference, live, fields);
    if kind != DiffKind::Same {
        out.push(DiffRecord { path: display_path(path), kind });
    }

    let ref_children: BTreeMap<&str, &Entry> = reference.children().iter().map(|c| (c.name(), c)).collect();
    let live_children: BTreeMap<&str, &Entry> = live.children().iter().map(|c| (c.name(), c)).collect();

    for (name, child) in &ref_children {
        let child_path = join(path, name);
        match live_children.get(name) {
            Some(live_child) => walk(child, live_child, &child_path, fields, out),
            None => out.push(DiffRecord { path: child_path, kind: DiffKind::Removed }),
        }
    }
    for (name, child) in &live_children {
        if !ref_children.contains_key(name) {
            out.push(DiffRecord { path: join(path, name), kind: DiffKind::Added });
            for grandchild in child.children() {
                out.push(DiffRecord { path: join(&join(path, name), grandchild.name()), kind: DiffKind::Added });
            }
        }
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

fn compare_one(reference: &Entry, live: &Entry, fields: ComparisonFields) -> DiffKind {
    if fields == ComparisonFields::InodeType {
        return if reference.tag() == live.tag() { DiffKind::Same } else { DiffKind::Changed };
    }
    if reference.tag() != live.tag() {
        return DiffKind::Changed;
    }
    let (Some(a), Some(b)) = (reference.attrs(), live.attrs()) else {
        return DiffKind::Same;
    };
    match fields {
        ComparisonFields::Mtime => {
            if a.mtime.loose_cmp(&b.mtime) == std::cmp::Ordering::Equal {
                DiffKind::Same
            } else {
                DiffKind::Changed
            }
        }
        ComparisonFields::IgnoreOwner => {
            if a.mode == b.mode && a.mtime.loose_cmp(&b.mtime) == std::cmp::Ordering::Equal {
                DiffKind::Same
            } else {
                DiffKind::Changed
            }
        }
        ComparisonFields::All => {
            if a.mode == b.mode
                && a.uid == b.uid
                && a.gid == b.gid
                && a.mtime.loose_cmp(&b.mtime) == std::cmp::Ordering::Equal
                && size_matches(reference, live)
            {
                DiffKind::Same
            } else {
                DiffKind::Changed
            }
        }
        ComparisonFields::InodeType => unreachable!("handled above"),
    }
}

fn size_matches(a: &Entry, b: &Entry) -> bool {
    match (a, b) {
        (Entry::File(f), Entry::File(g)) => f.size == g.size,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{FileEntry, InodeAttrs};
    use crate::date::Date;
    use crate::integers::Infinint;

    fn file(name: &str, mtime: i64, size: u64) -> Entry {
        Entry::File(FileEntry::not_saved(InodeAttrs::new(name, 0o644, Date::from_unix_seconds(mtime)), Infinint::from(size)))
    }

    fn dir(children: Vec<Entry>) -> Entry {
        Entry::Directory { attrs: InodeAttrs::new("", 0o755, Date::EPOCH), children }
    }

    #[test]
    fn identical_trees_report_nothing() {
        let a = dir(vec![file("f", 10, 5)]);
        let b = dir(vec![file("f", 10, 5)]);
        assert!(diff(&a, &b, ComparisonFields::All).is_empty());
    }

    #[test]
    fn size_change_is_reported_under_all_but_not_under_mtime() {
        let a = dir(vec![file("f", 10, 5)]);
        let b = dir(vec![file("f", 10, 9)]);
        let changes = diff(&a, &b, ComparisonFields::All);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, DiffKind::Changed);
        assert!(diff(&a, &b, ComparisonFields::Mtime).is_empty());
    }

    #[test]
    fn added_and_removed_files_are_detected() {
        let a = dir(vec![file("old", 1, 1)]);
        let b = dir(vec![file("new", 1, 1)]);
        let changes = diff(&a, &b, ComparisonFields::All);
        assert!(changes.iter().any(|r| r.path == "old" && r.kind == DiffKind::Removed));
        assert!(changes.iter().any(|r| r.path == "new" && r.kind == DiffKind::Added));
    }
}
