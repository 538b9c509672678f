//! The persistent process: live app shim, supervisor, store lock, and
//! reduction maintenance.

pub mod app;
pub mod lock;
pub mod snapshot;
pub mod supervisor;

pub use app::{
    AppCompiler, AppError, CompiledApp, ExpressionTreeCompiler, FunctionApplicationResult,
    LiveApp, MAIN_BRANCH,
};
pub use lock::{StoreLock, StoreLockError, StoreLockMeta};
pub use snapshot::{DEFAULT_REDUCTION_INTERVAL, ReductionMaintainer, SnapshotHandle};
pub use supervisor::{
    CommitOutcome, PersistentProcess, ProcessError, ProcessStatus, TruncationReport,
};
