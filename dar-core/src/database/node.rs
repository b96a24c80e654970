// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The cross-archive database's per-path version tree (§3, §4.8).
//!
//! A [`Node`] mirrors the union of every indexed archive's directory
//! tree. Each node carries a `last_mod` map (archive number → record)
//! and a `last_change` map for EA, with the chronological-ordering
//! invariant (P3): within one node, dates are non-decreasing when the
//! map is walked in archive-number order.

use std::collections::BTreeMap;

use crate::date::Date;

/// The state a path was observed in within one archive, for either the
/// data axis (`last_mod`) or the EA axis (`last_change`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VersionState {
    Saved,
    Present,
    Removed,
    /// Synthesized during finalisation: this archive did not mention
    /// the path at all.
    Absent,
    Patch,
    PatchUnusable,
    InodeOnly,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Record {
    pub date: Date,
    pub state: VersionState,
}

pub type ArchiveNumber = u32;

#[derive(Clone, Debug, Default)]
pub struct Node {
    pub name: String,
    pub last_mod: BTreeMap<ArchiveNumber, Record>,
    pub last_change: BTreeMap<ArchiveNumber, Record>,
    pub children: Vec<Node>,
}

/// The result of looking up a node's `last_mod` map at a given date.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lookup {
    FoundPresent,
    FoundRemoved,
    NotFound,
    /// The most recent entry at or before the date is `Present`
    /// ("unchanged since reference") but no ancestor archive carries
    /// the saved baseline, so the data chain is broken.
    NotRestorable,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Node {
        Node { name: name.into(), last_mod: BTreeMap::new(), last_change: BTreeMap::new(), children: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        // Invariant (ii): a node with both maps empty is removable.
        self.last_mod.is_empty() && self.last_change.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn child_or_insert(&mut self, name: &str) -> &mut Node {
        if self.child(name).is_none() {
            self.children.push(Node::new(name));
        }
        self.child_mut(name).unwrap()
    }

    /// Folds one archive's observation of this path into the node,
    /// creating intermediate directory nodes as needed, matching
    /// `update_with` (§4.8).
    pub fn update_with(&mut self, components: &[String], arch: ArchiveNumber, mtime: Date, data_state: VersionState, ea: Option<(Date, VersionState)>) {
        let node = components.iter().fold(self, |n, c| n.child_or_insert(c));
        node.last_mod.insert(arch, Record { date: mtime, state: data_state });
        if let Some((ctime, ea_state)) = ea {
            node.last_change.insert(arch, Record { date: ctime, state: ea_state });
        }
    }

    /// Synthesises `absent` records (§4.8 `finalize_except_self`): for
    /// every node that has a record for an earlier archive but none for
    /// `arch`, append a record dated at `max(previous_date + 1,
    /// root_mtime)` recording that the path was gone at time `arch`.
    pub fn finalize_except_self(&mut self, arch: ArchiveNumber, root_mtime: Date) {
        finalize_map(&mut self.last_mod, arch, root_mtime);
        finalize_map(&mut self.last_change, arch, root_mtime);
        for child in &mut self.children {
            child.finalize_except_self(arch, root_mtime);
        }
    }

    /// Looks up the state of this path as of `date`.
    pub fn lookup(&self, date: Date) -> Lookup {
        let mut latest: Option<&Record> = None;
        for record in self.last_mod.values() {
            if record.date <= date {
                if latest.map(|l| record.date >= l.date).unwrap_or(true) {
                    latest = Some(record);
                }
            }
        }
        match latest {
            None => Lookup::NotFound,
            Some(r) => match r.state {
                VersionState::Removed | VersionState::Absent => Lookup::FoundRemoved,
                VersionState::Present => {
                    if self.oldest_saved_before(date).is_some() {
                        Lookup::FoundPresent
                    } else {
                        Lookup::NotRestorable
                    }
                }
                _ => Lookup::FoundPresent,
            },
        }
    }

    fn oldest_saved_before(&self, date: Date) -> Option<ArchiveNumber> {
        self.last_mod
            .iter()
            .filter(|(_, r)| r.date <= date && matches!(r.state, VersionState::Saved | VersionState::InodeOnly))
            .map(|(n, _)| *n)
            .next()
    }

    /// Verifies the chronological ordering invariant (P3) over this
    /// node and its descendants; returns every violating archive number
    /// paired with the node's name.
    pub fn check_order(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if !is_non_decreasing(&self.last_mod) || !is_non_decreasing(&self.last_change) {
            violations.push(self.name.clone());
        }
        for child in &self.children {
            violations.extend(child.check_order());
        }
        violations
    }

    pub fn remove_archive_range(&mut self, min: ArchiveNumber, max: ArchiveNumber) {
        self.last_mod.retain(|n, _| *n < min || *n > max);
        self.last_change.retain(|n, _| *n < min || *n > max);
        self.children.iter_mut().for_each(|c| c.remove_archive_range(min, max));
        self.children.retain(|c| !c.is_empty() || !c.children.is_empty());
    }
}

fn finalize_map(map: &mut BTreeMap<ArchiveNumber, Record>, arch: ArchiveNumber, root_mtime: Date) {
    if map.contains_key(&arch) || map.is_empty() {
        return;
    }
    let Some((_, prev)) = map.iter().rev().find(|(&n, _)| n < arch) else { return };
    let date = std::cmp::max(prev.date.plus_seconds(1), root_mtime);
    map.insert(arch, Record { date, state: VersionState::Absent });
}

fn is_non_decreasing(map: &BTreeMap<ArchiveNumber, Record>) -> bool {
    let mut prev: Option<Date> = None;
    for record in map.values() {
        if let Some(p) = prev {
            if record.date < p {
                return false;
            }
        }
        prev = Some(record.date);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(p: &str) -> Vec<String> {
        p.split('/').filter(|c| !c.is_empty()).map(String::from).collect()
    }

    #[test]
    fn get_version_yields_saved_then_absent() {
        // Seed scenario 3.
        let mut root = Node::new("");
        root.update_with(&components("a/f"), 1, Date::from_unix_seconds(100), VersionState::Saved, None);
        root.finalize_except_self(2, Date::from_unix_seconds(200));

        let node = root.child("a").unwrap().child("f").unwrap();
        let mut rows: Vec<_> = node.last_mod.iter().collect();
        rows.sort_by_key(|(n, _)| **n);
        assert_eq!(rows.len(), 2);
        assert_eq!(*rows[0].0, 1);
        assert_eq!(rows[0].1.state, VersionState::Saved);
        assert_eq!(rows[0].1.date, Date::from_unix_seconds(100));
        assert_eq!(*rows[1].0, 2);
        assert_eq!(rows[1].1.state, VersionState::Absent);
        assert_eq!(rows[1].1.date, Date::from_unix_seconds(200));
    }

    #[test]
    fn single_archive_empty_plan_before_root_mtime() {
        // B4
        let mut root = Node::new("");
        root.update_with(&components("a/f"), 1, Date::from_unix_seconds(500), VersionState::Saved, None);
        let node = root.child("a").unwrap().child("f").unwrap();
        assert_eq!(node.lookup(Date::from_unix_seconds(100)), Lookup::NotFound);
    }

    #[test]
    fn order_violation_is_detected() {
        let mut node = Node::new("f");
        node.last_mod.insert(1, Record { date: Date::from_unix_seconds(200), state: VersionState::Saved });
        node.last_mod.insert(2, Record { date: Date::from_unix_seconds(100), state: VersionState::Saved });
        assert_eq!(node.check_order(), vec!["f".to_string()]);
    }
}
