// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-component counters printed after an error, and at the end of
//! every operation regardless of outcome (§7 "user-visible behaviour").

use std::fmt;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OperationSummary {
    pub treated: u64,
    pub skipped: u64,
    pub too_old: u64,
    pub hard_linked: u64,
    pub errored: u64,
    pub ignored: u64,
    pub deleted: u64,
    pub ea_treated: u64,
    pub fsa_treated: u64,
}

impl OperationSummary {
    pub fn new() -> OperationSummary {
        OperationSummary::default()
    }

    pub fn merge(&mut self, other: &OperationSummary) {
        self.treated += other.treated;
        self.skipped += other.skipped;
        self.too_old += other.too_old;
        self.hard_linked += other.hard_linked;
        self.errored += other.errored;
        self.ignored += other.ignored;
        self.deleted += other.deleted;
        self.ea_treated += other.ea_treated;
        self.fsa_treated += other.fsa_treated;
    }
}

impl fmt::Display for OperationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "treated: {}, skipped: {}, too-old: {}, hard-linked: {}, errored: {}, ignored: {}, deleted: {}, ea-treated: {}, fsa-treated: {}",
            self.treated,
            self.skipped,
            self.too_old,
            self.hard_linked,
            self.errored,
            self.ignored,
            self.deleted,
            self.ea_treated,
            self.fsa_treated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_accumulates_every_field() {
        let mut a = OperationSummary { treated: 1, errored: 1, ..Default::default() };
        let b = OperationSummary { treated: 2, skipped: 3, ..Default::default() };
        a.merge(&b);
        assert_eq!(a.treated, 3);
        assert_eq!(a.skipped, 3);
        assert_eq!(a.errored, 1);
    }
}
