//! Durable storage: file store abstraction, content-addressed components,
//! the composition log, and provisional reductions.

pub mod composition;
pub mod content;
pub mod file_store;
pub mod json_canon;
pub mod log;
pub mod reduction;
pub mod tree;

pub use composition::{
    ComponentRef, CompositionEvent, CompositionRecord, RecordError, sentinel_parent_hash,
};
pub use content::{
    ContentStoreError, component_file_closure, component_path, load_component, store_component,
};
pub use file_store::{
    FilePath, FileStore, FileStoreError, FileStoreReader, FileStoreWriter, InMemoryFileStore,
    LocalFileStore, ProjectedChanges, ProjectionFileStore,
};
pub use json_canon::{CanonJsonError, to_canon_json_bytes};
pub use log::{LogError, StoredRecord, append_record, enumerate_reverse, head_hash, list_segments};
pub use reduction::{
    ProvisionalReduction, ReductionError, load_provisional_reduction, store_provisional_reduction,
};
pub use tree::{TreeNode, TreeParseError};
