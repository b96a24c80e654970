// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-archive slice label.
//!
//! A label is a 10-byte opaque identifier generated once, at create time,
//! from wall clock plus process id. Every slice of an archive carries the
//! same label; loading a slice whose label disagrees with slice 1's is a
//! fatal mismatch (this is how a mixed-up slice from a different archive
//! is detected before any of its bytes are trusted).

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub const LABEL_LEN: usize = 10;

#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Label(pub [u8; LABEL_LEN]);

impl Label {
    /// Generates a fresh label from the current wall clock and pid.
    ///
    /// This isn't cryptographically unique, only operationally so: two
    /// archives created in the same process in the same microsecond would
    /// collide, which in practice never happens because create() holds
    /// the process for the whole operation.
    pub fn generate() -> Label {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let secs = now.as_secs();
        let micros = now.subsec_micros();
        let pid = std::process::id();
        let mut bytes = [0u8; LABEL_LEN];
        bytes[0..4].copy_from_slice(&(secs as u32).to_be_bytes());
        bytes[4..8].copy_from_slice(&micros.to_be_bytes());
        bytes[8..10].copy_from_slice(&(pid as u16).to_be_bytes());
        Label(bytes)
    }

    pub fn from_bytes(bytes: [u8; LABEL_LEN]) -> Label {
        Label(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; LABEL_LEN] {
        &self.0
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label(")?;
        for b in self.0.iter() {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_labels_have_fixed_length() {
        let label = Label::generate();
        assert_eq!(label.as_bytes().len(), LABEL_LEN);
    }
}
