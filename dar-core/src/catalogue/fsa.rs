// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Filesystem-specific attribute bags (§4.4): opaque, family-scoped
//! attributes beyond Unix mode and EA (Linux ext* flags, HFS+ flags,
//! and so on). The family scope configured at create time restricts
//! which families are even read; an unknown family encountered on
//! read-back is ignored rather than rejected, so archives stay portable
//! across systems that don't share every family.

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FsaFamily {
    LinuxExtN,
    HfsPlus,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FsaEntry {
    pub family: FsaFamily,
    pub bits: u64,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FsaSet {
    pub entries: Vec<FsaEntry>,
}

impl FsaSet {
    pub fn empty() -> FsaSet {
        FsaSet::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keeps only the families named in `scope`, dropping anything the
    /// configured scope does not cover and silently ignoring families
    /// this build does not recognize at all.
    pub fn restrict_to(&self, scope: &[FsaFamily]) -> FsaSet {
        FsaSet { entries: self.entries.iter().filter(|e| scope.contains(&e.family)).cloned().collect() }
    }

    pub fn get(&self, family: FsaFamily) -> Option<u64> {
        self.entries.iter().find(|e| e.family == family).map(|e| e.bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restrict_drops_families_outside_scope() {
        let set = FsaSet {
            entries: vec![
                FsaEntry { family: FsaFamily::LinuxExtN, bits: 0x10 },
                FsaEntry { family: FsaFamily::HfsPlus, bits: 0x2 },
            ],
        };
        let restricted = set.restrict_to(&[FsaFamily::LinuxExtN]);
        assert_eq!(restricted.entries.len(), 1);
        assert_eq!(restricted.get(FsaFamily::LinuxExtN), Some(0x10));
        assert_eq!(restricted.get(FsaFamily::HfsPlus), None);
    }
}
