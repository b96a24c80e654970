// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The cipher collaborator (§4.1's "end-of-data distinct from physical
//! end" clause exists for this layer's authentication trailer). Gated
//! behind the `crypto` feature, matching the way `dep:aes-gcm` is
//! itself optional in the workspace dependency table.

use crate::error::{DarError, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CipherAlgo {
    None,
    AesGcm,
}

/// A block cipher collaborator: encrypts/decrypts whole spans (one per
/// slice's payload) rather than streaming byte-by-byte, since AEAD
/// ciphers need their full input to produce or verify a tag.
pub trait Cipher: Send {
    fn algo(&self) -> CipherAlgo;
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>>;
    fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
    /// Bytes appended past the payload (the authentication tag) that a
    /// caller must exclude from `end_of_data` when reading back.
    fn trailer_len(&self) -> usize;
}

pub struct NoCipher;

impl Cipher for NoCipher {
    fn algo(&self) -> CipherAlgo {
        CipherAlgo::None
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }

    fn trailer_len(&self) -> usize {
        0
    }
}

#[cfg(feature = "crypto")]
pub use aes_gcm_cipher::AesGcmCipher;

#[cfg(feature = "crypto")]
mod aes_gcm_cipher {
    use super::*;
    use aes_gcm::aead::{Aead, KeyInit, OsRng};
    use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};

    pub struct AesGcmCipher {
        cipher: Aes256Gcm,
    }

    impl AesGcmCipher {
        pub fn new(key: &[u8; 32]) -> AesGcmCipher {
            AesGcmCipher { cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)) }
        }
    }

    const NONCE_LEN: usize = 12;

    impl Cipher for AesGcmCipher {
        fn algo(&self) -> CipherAlgo {
            CipherAlgo::AesGcm
        }

        fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
            let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
            let mut out = self
                .cipher
                .encrypt(&nonce, plaintext)
                .map_err(|e| DarError::Data(format!("encryption failed: {e}")))?;
            let mut sealed = nonce.to_vec();
            sealed.append(&mut out);
            Ok(sealed)
        }

        fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
            if ciphertext.len() < NONCE_LEN {
                return Err(DarError::Data("ciphertext shorter than nonce".into()));
            }
            let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
            let nonce = Nonce::from_slice(nonce_bytes);
            self.cipher.decrypt(nonce, body).map_err(|e| DarError::Data(format!("decryption failed: {e}")))
        }

        fn trailer_len(&self) -> usize {
            16 // GCM authentication tag
        }
    }
}

#[cfg(all(test, feature = "crypto"))]
mod tests {
    use super::*;

    #[test]
    fn aes_gcm_round_trips() {
        let key = [7u8; 32];
        let cipher = AesGcmCipher::new(&key);
        let plaintext = b"archive payload bytes";
        let sealed = cipher.seal(plaintext).unwrap();
        let opened = cipher.open(&sealed).unwrap();
        assert_eq!(opened, plaintext);
    }
}

#[cfg(test)]
mod always_on_tests {
    use super::*;

    #[test]
    fn no_cipher_is_transparent() {
        let c = NoCipher;
        let data = b"abc";
        assert_eq!(c.seal(data).unwrap(), data);
        assert_eq!(c.trailer_len(), 0);
    }
}
