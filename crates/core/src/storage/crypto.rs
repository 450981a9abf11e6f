//! AES-256-GCM at-rest encryption for store snapshots.
//!
//! The key is derived from a caller-supplied password with SHA-256, and the
//! raw key bytes are zeroized on drop. Each encryption draws a fresh random
//! 12-byte nonce; output framing is `nonce || ciphertext || tag`.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};
use std::io;
use zeroize::Zeroize;

/// AES-256-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-256-GCM authentication tag size in bytes.
const TAG_SIZE: usize = 16;

/// Smallest legal ciphertext: nonce + tag around an empty plaintext.
const MIN_ENCRYPTED_LEN: usize = NONCE_SIZE + TAG_SIZE;

/// A password-derived 256-bit AES-GCM key.
pub struct EncryptionKey {
    cipher: Aes256Gcm,
    // The cipher holds its own copy; this one exists so the raw bytes are
    // scrubbed from memory on drop.
    raw: KeyBytes,
}

struct KeyBytes([u8; 32]);

impl Drop for KeyBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl EncryptionKey {
    /// Derives a key from a password via SHA-256.
    pub fn from_password(password: &str) -> Self {
        let digest = Sha256::digest(password.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&bytes));
        Self {
            cipher,
            raw: KeyBytes(bytes),
        }
    }

    /// Encrypts `plaintext`, returning `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .expect("AES-GCM encryption cannot fail for in-memory buffers");

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        out
    }

    /// Decrypts data produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails when the data is truncated, was tampered with, or was written
    /// under a different password.
    pub fn decrypt(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        if data.len() < MIN_ENCRYPTED_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "encrypted snapshot too short: {} bytes (minimum {})",
                    data.len(),
                    MIN_ENCRYPTED_LEN
                ),
            ));
        }
        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        self.cipher.decrypt(nonce, &data[NONCE_SIZE..]).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "decryption failed: wrong password or corrupted snapshot",
            )
        })
    }
}

// Never print key material
impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let _ = &self.raw;
        f.debug_struct("EncryptionKey")
            .field("algorithm", &"AES-256-GCM")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let key = EncryptionKey::from_password("correct horse battery staple");
        let plaintext = b"knowledge store snapshot";
        let enc = key.encrypt(plaintext);
        assert_ne!(&enc[NONCE_SIZE..], plaintext);
        assert_eq!(key.decrypt(&enc).unwrap(), plaintext);
    }

    #[test]
    fn test_empty_plaintext() {
        let key = EncryptionKey::from_password("pw");
        let enc = key.encrypt(b"");
        assert!(key.decrypt(&enc).unwrap().is_empty());
    }

    #[test]
    fn test_same_password_same_key() {
        let k1 = EncryptionKey::from_password("pw");
        let k2 = EncryptionKey::from_password("pw");
        let enc = k1.encrypt(b"data");
        assert_eq!(k2.decrypt(&enc).unwrap(), b"data");
    }

    #[test]
    fn test_wrong_password_fails() {
        let k1 = EncryptionKey::from_password("pw1");
        let k2 = EncryptionKey::from_password("pw2");
        assert!(k2.decrypt(&k1.encrypt(b"secret")).is_err());
    }

    #[test]
    fn test_tampered_data_fails() {
        let key = EncryptionKey::from_password("pw");
        let mut enc = key.encrypt(b"important");
        let last = enc.len() - 1;
        enc[last] ^= 0xFF;
        assert!(key.decrypt(&enc).is_err());
    }

    #[test]
    fn test_truncated_data_fails() {
        let key = EncryptionKey::from_password("pw");
        assert!(key.decrypt(&[0u8; 8]).is_err());
    }

    #[test]
    fn test_unique_nonces() {
        let key = EncryptionKey::from_password("pw");
        let a = key.encrypt(b"same");
        let b = key.encrypt(b"same");
        assert_ne!(&a[..NONCE_SIZE], &b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = EncryptionKey::from_password("pw");
        let s = format!("{key:?}");
        assert!(s.contains("AES-256-GCM"));
        assert!(!s.contains("pw"));
    }
}
