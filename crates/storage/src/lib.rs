//! Persistence layer for safekeep.
//!
//! Everything the backup engine writes goes through a [`PersistenceBackend`]:
//! a flat, namespaced key space of byte values. Two backends ship here:
//!
//! - [`FsBackend`] -- one file per key under a root directory
//! - [`MemoryBackend`] -- a browser-storage-style string map with an optional quota
//!
//! The backend is chosen once at startup from configuration; callers only
//! ever see `Arc<dyn PersistenceBackend>`.

pub mod conformance;
mod error;
mod fs;
pub mod keys;
mod memory;
mod traits;

pub use error::StorageError;
pub use fs::FsBackend;
pub use memory::MemoryBackend;
pub use traits::{read_json, write_json, PersistenceBackend};
