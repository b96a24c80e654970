// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hash side-files: when a hash algorithm is configured on write, each
//! finalized slice gets a `<slice_filename>.<algo>` file holding the
//! digest in that algorithm's standard text format, mirroring the way
//! the teacher computes and prints digests in `repl/sha.rs`.

use sha2::{Digest, Sha256, Sha512};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HashAlgo {
    Sha256,
    Sha512,
}

impl HashAlgo {
    pub fn extension(self) -> &'static str {
        match self {
            HashAlgo::Sha256 => "sha256",
            HashAlgo::Sha512 => "sha512",
        }
    }

    pub fn digest_hex(self, data: &[u8]) -> String {
        match self {
            HashAlgo::Sha256 => {
                let mut h = Sha256::new();
                h.update(data);
                hex(&h.finalize())
            }
            HashAlgo::Sha512 => {
                let mut h = Sha512::new();
                h.update(data);
                hex(&h.finalize())
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_is_well_known() {
        let digest = HashAlgo::Sha256.digest_hex(b"");
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }
}
