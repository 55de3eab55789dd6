//! AES-256-CTR frame encryption, keyed by SHA-256(passphrase).
//!
//! The wire nonce is 8 bytes and is treated as a counter prefix, with an
//! 8-byte big-endian counter word (initial value 0) appended to build the
//! 16-byte CTR IV. `Ctr128BE` implements that counter construction.

use aes::Aes256;
use cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use sha2::{Digest, Sha256};

pub const NONCE_LEN: usize = 8;
pub const KEY_LEN: usize = 32;

type Aes256Ctr = Ctr128BE<Aes256>;

/// 256-bit key derived from a shared passphrase.
pub fn derive_key(passphrase: &str) -> [u8; KEY_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    hasher.finalize().into()
}

fn iv_from_nonce(nonce: &[u8; NONCE_LEN]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..NONCE_LEN].copy_from_slice(nonce);
    iv
}

/// Encrypts (or decrypts, since CTR mode is its own inverse) `data` in
/// place using `key` and the per-frame `nonce`.
pub fn apply_keystream(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], data: &mut [u8]) {
    let iv = iv_from_nonce(nonce);
    let mut cipher = Aes256Ctr::new(key.into(), &iv.into());
    cipher.apply_keystream(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = derive_key("correct horse battery staple");
        let nonce = [7u8; NONCE_LEN];
        let plaintext = b"fire A1".to_vec();

        let mut ciphertext = plaintext.clone();
        apply_keystream(&key, &nonce, &mut ciphertext);
        assert_ne!(ciphertext, plaintext);

        let mut decrypted = ciphertext.clone();
        apply_keystream(&key, &nonce, &mut decrypted);
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn different_nonce_yields_different_ciphertext() {
        let key = derive_key("pw");
        let plaintext = b"same plaintext".to_vec();

        let mut a = plaintext.clone();
        apply_keystream(&key, &[1u8; NONCE_LEN], &mut a);

        let mut b = plaintext.clone();
        apply_keystream(&key, &[2u8; NONCE_LEN], &mut b);

        assert_ne!(a, b);
    }

    #[test]
    fn different_passphrase_yields_different_key() {
        assert_ne!(derive_key("alice"), derive_key("bob"));
    }
}
