#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod pine;
pub mod process;
pub mod store;
pub mod telemetry;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the core types at the crate root for convenience
pub use crate::pine::{
    DecodeExprError, EvalError, EvalMetrics, Evaluator, Expression, Value, ValueHash,
    decode_expression, encode_expression, int_from_value, int_value, sha256_bytes,
    string_from_value, string_value,
};
pub use crate::process::{
    AppCompiler, AppError, CompiledApp, ExpressionTreeCompiler, FunctionApplicationResult,
    LiveApp, PersistentProcess, ProcessError, ProcessStatus, SnapshotHandle, StoreLock,
    TruncationReport,
};
pub use crate::store::{
    ComponentRef, CompositionEvent, CompositionRecord, FilePath, FileStore, FileStoreReader,
    FileStoreWriter, InMemoryFileStore, LocalFileStore, ProvisionalReduction, TreeNode,
    load_component, store_component,
};
