// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The overwriting policy engine (§4.6): a two-axis (data, EA) decision
//! tree of constant actions and conditionals built from pure predicates,
//! evaluated once per name collision during merge or restore.
//!
//! Grounded on the teacher's `repl::evalcmd` dispatch table, which maps
//! a command name to a handler by walking a match statement; here the
//! "dispatch" walks a user-declared tree of criteria instead of a fixed
//! table, but the shape — match on a tag, recurse or act — is the same.

use crate::catalogue::Entry;
use crate::ui::{AskVerdict, UserInteraction};

/// The verdict for one axis (data or EA) of a collision.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Preserve,
    Overwrite,
    PreserveMarkAbsent,
    OverwriteMarkAbsent,
    MergePreserve,
    MergeOverwrite,
    Ask,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Verdict {
    pub data: Action,
    pub ea: Action,
}

/// A pure predicate over the pair (in-place, candidate).
#[derive(Clone, Debug)]
pub enum Criterion {
    InPlaceDataMoreRecent { tolerance_hours: i64 },
    InPlaceDataBigger,
    InPlaceIsInode,
    InPlaceIsDir,
    SameType,
    InPlaceEaMoreRecent,
    Invert(Box<Criterion>),
    And(Vec<Criterion>),
    Or(Vec<Criterion>),
}

impl Criterion {
    pub fn evaluate(&self, in_place: &Entry, candidate: &Entry) -> bool {
        match self {
            Criterion::InPlaceDataMoreRecent { tolerance_hours } => {
                match (in_place.attrs(), candidate.attrs()) {
                    (Some(a), Some(b)) => a.mtime.diff_seconds(&b.mtime) > tolerance_hours * 3600,
                    _ => false,
                }
            }
            Criterion::InPlaceDataBigger => match in_place {
                Entry::File(f) => match candidate {
                    Entry::File(g) => f.size > g.size,
                    _ => false,
                },
                _ => false,
            },
            Criterion::InPlaceIsInode => in_place.is_inode(),
            Criterion::InPlaceIsDir => in_place.is_directory(),
            Criterion::SameType => in_place.tag() == candidate.tag(),
            Criterion::InPlaceEaMoreRecent => match (in_place.attrs(), candidate.attrs()) {
                (Some(a), Some(b)) => a.ctime > b.ctime,
                _ => false,
            },
            Criterion::Invert(inner) => !inner.evaluate(in_place, candidate),
            Criterion::And(list) => list.iter().all(|c| c.evaluate(in_place, candidate)),
            Criterion::Or(list) => list.iter().any(|c| c.evaluate(in_place, candidate)),
        }
    }
}

/// A policy is either a constant verdict or a conditional with two
/// sub-policies; by construction there is no cycle through conditionals
/// (P7: every evaluation terminates, since each branch strictly reduces
/// the tree).
#[derive(Clone, Debug)]
pub enum Policy {
    Constant(Verdict),
    Conditional { criterion: Criterion, then_branch: Box<Policy>, else_branch: Box<Policy> },
}

impl Policy {
    pub fn constant(data: Action, ea: Action) -> Policy {
        Policy::Constant(Verdict { data, ea })
    }

    pub fn when(criterion: Criterion, then_branch: Policy, else_branch: Policy) -> Policy {
        Policy::Conditional { criterion, then_branch: Box::new(then_branch), else_branch: Box::new(else_branch) }
    }

    /// Evaluates the policy for one collision, terminating in bounded
    /// time (P7) since each recursive step strictly descends the tree.
    pub fn evaluate(&self, in_place: &Entry, candidate: &Entry) -> Verdict {
        match self {
            Policy::Constant(v) => *v,
            Policy::Conditional { criterion, then_branch, else_branch } => {
                if criterion.evaluate(in_place, candidate) {
                    then_branch.evaluate(in_place, candidate)
                } else {
                    else_branch.evaluate(in_place, candidate)
                }
            }
        }
    }

    /// Resolves `ask` verdicts through the user-interaction layer,
    /// producing a verdict with only resolvable actions.
    pub fn resolve(&self, in_place: &Entry, candidate: &Entry, ui: &dyn UserInteraction, prompt: &str) -> Verdict {
        let verdict = self.evaluate(in_place, candidate);
        let ask = |text: &str| match ui.ask_overwrite(text) {
            AskVerdict::Keep => Action::Preserve,
            AskVerdict::Overwrite => Action::Overwrite,
            AskVerdict::Abort => Action::Preserve,
        };
        Verdict {
            data: if verdict.data == Action::Ask { ask(prompt) } else { verdict.data },
            ea: if verdict.ea == Action::Ask { ask(prompt) } else { verdict.ea },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{FileEntry, InodeAttrs};
    use crate::date::Date;
    use crate::integers::Infinint;
    use crate::ui::Silent;

    fn file_with_mtime(mtime: i64) -> Entry {
        Entry::File(FileEntry::not_saved(
            InodeAttrs::new("f", 0o644, Date::from_unix_seconds(mtime)),
            Infinint::from(0u64),
        ))
    }

    #[test]
    fn keeps_newer_in_place_data() {
        // Seed scenario 4.
        let policy = Policy::when(
            Criterion::InPlaceDataMoreRecent { tolerance_hours: 0 },
            Policy::constant(Action::Preserve, Action::Preserve),
            Policy::constant(Action::Overwrite, Action::Overwrite),
        );
        let in_place = file_with_mtime(200);
        let candidate = file_with_mtime(100);
        assert_eq!(policy.evaluate(&in_place, &candidate).data, Action::Preserve);
        assert_eq!(policy.evaluate(&candidate, &in_place).data, Action::Overwrite);
    }

    #[test]
    fn ask_resolves_through_user_interaction() {
        let policy = Policy::constant(Action::Ask, Action::Preserve);
        let entry = file_with_mtime(1);
        let ui = Silent;
        let resolved = policy.resolve(&entry, &entry, &ui, "collision");
        // Silent::ask_overwrite always aborts -> mapped to Preserve here.
        assert_eq!(resolved.data, Action::Preserve);
    }

    #[test]
    fn and_or_invert_compose() {
        let a = Criterion::InPlaceIsDir;
        let b = Criterion::SameType;
        let both = Criterion::And(vec![a.clone(), b.clone()]);
        let either = Criterion::Or(vec![a.clone(), b.clone()]);
        let not_dir = Criterion::Invert(Box::new(a));
        let dir = Entry::Directory { attrs: InodeAttrs::new("d", 0o755, Date::EPOCH), children: vec![] };
        let file = file_with_mtime(0);
        assert!(!both.evaluate(&dir, &file));
        assert!(either.evaluate(&dir, &file));
        assert!(!not_dir.evaluate(&dir, &dir));
    }
}
