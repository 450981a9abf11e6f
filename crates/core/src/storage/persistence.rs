//! Snapshot persistence for the document store.
//!
//! Snapshots are bincode-serialized and written atomically (temp file +
//! rename). Plaintext snapshots carry a magic + CRC32 footer; encrypted
//! snapshots carry a magic header followed by the AES-GCM framing from
//! [`crate::storage::crypto`].

use crate::storage::crypto::EncryptionKey;
use crate::storage::document_store::DocumentStore;
use std::fs;
use std::io;
use std::path::Path;

/// Magic bytes appended before the CRC32 footer of a plaintext snapshot.
const SNAPSHOT_CRC_MAGIC: &[u8; 4] = b"KDB1";

/// Magic bytes at the start of an encrypted snapshot.
const SNAPSHOT_ENCRYPTED_MAGIC: &[u8; 4] = b"KDBE";

/// Serializes and writes a store snapshot.
///
/// Encrypted layout: `[magic "KDBE"][nonce || ciphertext || tag]`.
/// Plaintext layout: `[bincode][magic "KDB1"][CRC32 BE]`.
pub fn save_store(
    store: &DocumentStore,
    path: &Path,
    encryption_key: Option<&EncryptionKey>,
) -> io::Result<()> {
    let bytes = bincode::serialize(store).map_err(|e| io::Error::other(e.to_string()))?;

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let tmp_path = path.with_extension("db.tmp");

    let output = if let Some(key) = encryption_key {
        let encrypted = key.encrypt(&bytes);
        let mut out = Vec::with_capacity(4 + encrypted.len());
        out.extend_from_slice(SNAPSHOT_ENCRYPTED_MAGIC);
        out.extend_from_slice(&encrypted);
        tracing::info!("saved snapshot {:?} ({} bytes, encrypted)", path, bytes.len());
        out
    } else {
        let crc = crc32fast::hash(&bytes);
        let mut out = Vec::with_capacity(bytes.len() + 8);
        out.extend_from_slice(&bytes);
        out.extend_from_slice(SNAPSHOT_CRC_MAGIC);
        out.extend_from_slice(&crc.to_be_bytes());
        tracing::info!(
            "saved snapshot {:?} ({} bytes, CRC32={:#010x})",
            path,
            bytes.len(),
            crc
        );
        out
    };

    fs::write(&tmp_path, &output)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Reads a snapshot written by [`save_store`], verifying integrity.
///
/// An encrypted snapshot without a key is an error; a plaintext snapshot
/// opened with a key is accepted (the store was created before encryption
/// was turned on).
pub fn load_store(path: &Path, encryption_key: Option<&EncryptionKey>) -> io::Result<DocumentStore> {
    let raw = fs::read(path)?;

    let bytes: Vec<u8> = if raw.len() >= 4 && &raw[..4] == SNAPSHOT_ENCRYPTED_MAGIC {
        let key = encryption_key.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("snapshot {path:?} is encrypted but no password was provided"),
            )
        })?;
        key.decrypt(&raw[4..])?
    } else if raw.len() >= 8 && &raw[raw.len() - 8..raw.len() - 4] == SNAPSHOT_CRC_MAGIC {
        let payload = &raw[..raw.len() - 8];
        let stored = u32::from_be_bytes([
            raw[raw.len() - 4],
            raw[raw.len() - 3],
            raw[raw.len() - 2],
            raw[raw.len() - 1],
        ]);
        let computed = crc32fast::hash(payload);
        if computed != stored {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "snapshot CRC32 mismatch: stored {stored:#010x}, computed {computed:#010x}: {path:?}"
                ),
            ));
        }
        payload.to_vec()
    } else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unrecognized snapshot format: {path:?}"),
        ));
    };

    let store: DocumentStore = bincode::deserialize(&bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    store.validate().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("snapshot validation failed: {e}"),
        )
    })?;

    tracing::info!("loaded snapshot {:?} ({} entries)", path, store.len());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::KnowledgeEntry;

    fn sample_store() -> DocumentStore {
        let mut s = DocumentStore::new(4);
        s.insert(KnowledgeEntry::new("alpha").embedding(vec![1.0, 0.0, 0.0, 0.0]));
        s.insert(KnowledgeEntry::new("beta").embedding(vec![0.0, 1.0, 0.0, 0.0]));
        s.insert(KnowledgeEntry::new("graph-only"));
        s
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let store = sample_store();
        save_store(&store, &path, None).unwrap();

        let loaded = load_store(&path, None).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dimension(), 4);
        let contents: Vec<&str> = loaded.scan().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["alpha", "beta", "graph-only"]);
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        save_store(&sample_store(), &path, None).unwrap();

        let mut data = fs::read(&path).unwrap();
        data[10] ^= 0xFF;
        fs::write(&path, &data).unwrap();
        assert!(load_store(&path, None).is_err());
    }

    #[test]
    fn test_unrecognized_format_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.db");
        fs::write(&path, b"not a snapshot").unwrap();
        assert!(load_store(&path, None).is_err());
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let key = EncryptionKey::from_password("hunter2");
        save_store(&sample_store(), &path, Some(&key)).unwrap();

        let raw = fs::read(&path).unwrap();
        assert_eq!(&raw[..4], b"KDBE");

        let loaded = load_store(&path, Some(&key)).unwrap();
        assert_eq!(loaded.len(), 3);
    }

    #[test]
    fn test_encrypted_without_password_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let key = EncryptionKey::from_password("hunter2");
        save_store(&sample_store(), &path, Some(&key)).unwrap();

        let err = load_store(&path, None).unwrap_err();
        assert!(err.to_string().contains("encrypted"));
    }

    #[test]
    fn test_encrypted_wrong_password_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        save_store(
            &sample_store(),
            &path,
            Some(&EncryptionKey::from_password("right")),
        )
        .unwrap();
        assert!(load_store(&path, Some(&EncryptionKey::from_password("wrong"))).is_err());
    }

    #[test]
    fn test_plaintext_with_password_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        save_store(&sample_store(), &path, None).unwrap();
        let loaded = load_store(&path, Some(&EncryptionKey::from_password("pw"))).unwrap();
        assert_eq!(loaded.len(), 3);
    }
}
