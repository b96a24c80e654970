// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A read-cursor over a loaded catalogue tree (§4.5), yielding entries
//! in dump order paired with a depth delta so consumers (list, diff,
//! restore) can track directory enter/exit without keeping their own
//! stack — mirroring the teacher's `repl` command handlers, which walk
//! a `ramdisk::FileSystem` one entry at a time rather than recursing.
//!
//! The catalogue lives fully in memory for the duration of an operation
//! (§5 resource policy), so the cursor flattens the tree once up front
//! rather than interleaving traversal state with iterator polling.

use crate::catalogue::entry::Entry;

/// The depth of the current entry minus the depth of the previous one
/// yielded (`0` for the first entry). Positive when descending into a
/// directory's children, negative when returning to an ancestor.
pub type DepthDelta = i32;

pub struct CatalogueIter<'a> {
    items: std::vec::IntoIter<(&'a Entry, DepthDelta)>,
}

impl<'a> CatalogueIter<'a> {
    pub fn new(root: &'a Entry) -> CatalogueIter<'a> {
        let mut flat = Vec::new();
        flatten(root, 0, &mut flat);
        let mut items = Vec::with_capacity(flat.len());
        let mut prev_depth = 0i32;
        for (i, (entry, depth)) in flat.into_iter().enumerate() {
            let delta = if i == 0 { 0 } else { depth - prev_depth };
            items.push((entry, delta));
            prev_depth = depth;
        }
        CatalogueIter { items: items.into_iter() }
    }
}

fn flatten<'a>(entry: &'a Entry, depth: i32, out: &mut Vec<(&'a Entry, i32)>) {
    out.push((entry, depth));
    for child in entry.children() {
        flatten(child, depth + 1, out);
    }
}

impl<'a> Iterator for CatalogueIter<'a> {
    type Item = (&'a Entry, DepthDelta);

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::entry::InodeAttrs;
    use crate::date::Date;

    fn leaf(name: &str) -> Entry {
        Entry::Directory { attrs: InodeAttrs::new(name, 0o755, Date::EPOCH), children: vec![] }
    }

    #[test]
    fn visits_every_entry_in_dump_order() {
        let tree = Entry::Directory {
            attrs: InodeAttrs::new("root", 0o755, Date::EPOCH),
            children: vec![leaf("a"), leaf("b")],
        };
        let names: Vec<&str> = CatalogueIter::new(&tree).map(|(e, _)| e.name()).collect();
        assert_eq!(names, vec!["root", "a", "b"]);
    }

    #[test]
    fn depth_delta_tracks_enter_and_exit() {
        let tree = Entry::Directory {
            attrs: InodeAttrs::new("root", 0o755, Date::EPOCH),
            children: vec![
                Entry::Directory { attrs: InodeAttrs::new("sub", 0o755, Date::EPOCH), children: vec![leaf("x")] },
                leaf("y"),
            ],
        };
        let deltas: Vec<i32> = CatalogueIter::new(&tree).map(|(_, d)| d).collect();
        // root, sub(+1), x(+1), y(-2)
        assert_eq!(deltas, vec![0, 1, 1, -2]);
    }
}
