//! Versioned, partitioned record store.

mod persistence;
mod predicate;
mod variant_store;
mod version;

pub use persistence::{partition_path, version_path};
pub use predicate::{Criterion, Predicate, Window};
pub use variant_store::{
    DEFAULT_CHUNK_SIZE, IngestPermit, IngestProgress, RecordSet, StoreConfig, VariantStore,
};
pub use version::{VersionCheck, VersionTag};
