//! Persistent key-value storage for session state.
//!
//! Everything the login flow persists goes through the [`SessionStorage`]
//! trait: key material, the cached public key, and per-attempt bookkeeping
//! records. The default backend is a single JSON document on disk written
//! atomically; [`MemoryStorage`] backs tests and ephemeral profiles.
//!
//! The [`repair`] module runs before anything else reads the store and
//! removes entries matching known corruption patterns, so readers only ever
//! see values that are absent or plausibly well-formed.

mod file;
mod keys;
mod memory;
mod paths;
pub mod repair;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use paths::Paths;
pub use traits::SessionStorage;

use thiserror::Error;

/// Errors from storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backing store cannot be read or written
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Value could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Creates the default storage backend: a JSON document under the
/// profile directory, with parent directories created as needed.
pub fn create_storage() -> StorageResult<Box<dyn SessionStorage>> {
    let paths = Paths::new()?;
    paths.ensure_dirs()?;
    Ok(Box::new(FileStorage::new(paths.store_file())?))
}
