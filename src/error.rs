use thiserror::Error;

use crate::api::AdminError;
use crate::config::ConfigError;
use crate::process::lock::StoreLockError;
use crate::process::supervisor::ProcessError;
use crate::store::file_store::FileStoreError;

/// Crate-level convenience error: a thin wrapper over the module errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    StoreLock(#[from] StoreLockError),

    #[error(transparent)]
    FileStore(#[from] FileStoreError),
}
