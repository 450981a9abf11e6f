//! Storage layer: the insertion-ordered document store, at-rest encryption,
//! and snapshot persistence (bincode + CRC32, atomic temp-file + rename).

/// Password-derived AES-256-GCM snapshot encryption.
pub mod crypto;
/// Primary-key CRUD and ordered full scan over entries.
pub mod document_store;
/// Snapshot save/load with integrity verification.
pub mod persistence;

pub use crypto::EncryptionKey;
pub use document_store::DocumentStore;
pub use persistence::{load_store, save_store};
