// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extended-attribute sets (§4.4): an ordered list of (name, value)
//! pairs carried alongside a catalogue entry's inode attributes, plus
//! the state machine tracking how completely they were captured.

/// How completely an entry's EA set was captured.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EaState {
    /// No EA were read or none exist.
    None,
    /// Names were read but not values (used when only a quick scan ran).
    Partial,
    /// Names and values both captured.
    Full,
    /// Copied forward from a reference catalogue without being re-read.
    Fake,
    /// The entry used to carry EA; this version records their removal.
    Removed,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EaEntry {
    pub name: String,
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EaSet {
    pub state: Option<EaState>,
    pub entries: Vec<EaEntry>,
}

impl EaSet {
    pub fn none() -> EaSet {
        EaSet { state: None, entries: Vec::new() }
    }

    pub fn full(entries: Vec<EaEntry>) -> EaSet {
        EaSet { state: Some(EaState::Full), entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.value.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        let set = EaSet::full(vec![EaEntry { name: "user.comment".into(), value: b"hi".to_vec() }]);
        assert_eq!(set.get("user.comment"), Some(&b"hi"[..]));
        assert_eq!(set.get("user.other"), None);
    }
}
