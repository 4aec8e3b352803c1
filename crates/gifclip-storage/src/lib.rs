//! Artifact storage for rendered clips.
//!
//! Finished GIFs live in one output directory, addressed by their
//! `<uuid>.gif` identifier. The store resolves identifiers to paths for
//! serving, removes artifacts once delivered and sweeps stale ones.

pub mod error;
pub mod local;

pub use error::{StorageError, StorageResult};
pub use local::LocalArtifactStore;
