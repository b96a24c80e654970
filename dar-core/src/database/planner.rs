// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The restore planner (§4.8 `restore(paths, opts)`): for each
//! requested path, computes the minimum set of archives needed to
//! reconstruct it at a given date, respecting patch chains.

use crate::database::node::{ArchiveNumber, Node, VersionState};
use crate::date::Date;

/// One archive this plan must invoke, in ascending order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlanStep {
    pub archive: ArchiveNumber,
    pub path: String,
}

/// Walks `last_mod` back from the newest record at or before `date`,
/// following the patch chain to its nearest `saved` or `inode-only`
/// ancestor, collecting every archive that must be applied in order.
pub fn plan_restore(root: &Node, path: &str, date: Date) -> Vec<PlanStep> {
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    let Some(node) = resolve(root, &components) else { return Vec::new() };

    let mut candidates: Vec<(ArchiveNumber, &crate::database::node::Record)> =
        node.last_mod.iter().filter(|(_, r)| r.date <= date).map(|(n, r)| (*n, r)).collect();
    candidates.sort_by_key(|(n, _)| *n);

    let Some(&(latest_arch, latest)) = candidates.last() else { return Vec::new() };
    match latest.state {
        VersionState::Removed | VersionState::Absent => return Vec::new(),
        _ => {}
    }

    let mut chain = vec![latest_arch];
    let mut cursor = candidates.len() - 1;
    let mut state = latest.state;
    while matches!(state, VersionState::Patch) && cursor > 0 {
        cursor -= 1;
        let (arch, record) = candidates[cursor];
        chain.push(arch);
        state = record.state;
    }
    chain.reverse();
    chain.into_iter().map(|archive| PlanStep { archive, path: path.to_string() }).collect()
}

fn resolve<'a>(root: &'a Node, components: &[&str]) -> Option<&'a Node> {
    let mut cur = root;
    for c in components {
        cur = cur.child(c)?;
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::node::Record;

    #[test]
    fn resolves_to_a_single_archive() {
        // Seed scenario 5: date=150 resolves to archive #1.
        let mut root = Node::new("");
        root.update_with(&["a".into(), "f".into()], 1, Date::from_unix_seconds(100), VersionState::Saved, None);
        root.finalize_except_self(2, Date::from_unix_seconds(200));

        let plan = plan_restore(&root, "a/f", Date::from_unix_seconds(150));
        assert_eq!(plan, vec![PlanStep { archive: 1, path: "a/f".into() }]);
    }

    #[test]
    fn absent_at_later_date_yields_no_invocation() {
        let mut root = Node::new("");
        root.update_with(&["a".into(), "f".into()], 1, Date::from_unix_seconds(100), VersionState::Saved, None);
        root.finalize_except_self(2, Date::from_unix_seconds(200));

        let plan = plan_restore(&root, "a/f", Date::from_unix_seconds(250));
        assert!(plan.is_empty());
    }

    #[test]
    fn patch_chain_pulls_in_the_saved_ancestor() {
        let mut node = Node::new("f");
        node.last_mod.insert(1, Record { date: Date::from_unix_seconds(100), state: VersionState::Saved });
        node.last_mod.insert(2, Record { date: Date::from_unix_seconds(200), state: VersionState::Patch });
        let mut root = Node::new("");
        root.children.push(node);
        root.children[0].name = "f".into();

        let plan = plan_restore(&root, "f", Date::from_unix_seconds(250));
        assert_eq!(plan, vec![
            PlanStep { archive: 1, path: "f".into() },
            PlanStep { archive: 2, path: "f".into() },
        ]);
    }
}
