//! Provisional reductions: snapshots keyed by the composition-log record
//! hash they summarize. A usable reduction bounds the suffix of the log that
//! restore has to replay.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pine::value::ValueHash;
use crate::store::composition::ComponentRef;
use crate::store::file_store::{FilePath, FileStoreError, FileStoreReader, FileStoreWriter};
use crate::store::json_canon::{CanonJsonError, to_canon_json_bytes};

pub const PROVISIONAL_REDUCTION_DIR: &str = "provisional-reduction";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionalReduction {
    pub reduced_composition_hash_base16: ValueHash,
    pub app_config: ComponentRef,
    pub elm_app_state: ComponentRef,
}

#[derive(Debug, Error)]
pub enum ReductionError {
    #[error(transparent)]
    FileStore(#[from] FileStoreError),
    #[error(transparent)]
    Canon(#[from] CanonJsonError),
    #[error("malformed reduction record for {hash}: {reason}")]
    Malformed { hash: ValueHash, reason: String },
}

pub fn reduction_path(hash: &ValueHash) -> FilePath {
    FilePath::new([PROVISIONAL_REDUCTION_DIR.to_string(), hash.to_hex()])
}

pub fn store_provisional_reduction<S: FileStoreWriter + ?Sized>(
    store: &mut S,
    reduction: &ProvisionalReduction,
) -> Result<(), ReductionError> {
    let bytes = to_canon_json_bytes(reduction)?;
    store.set_file_content(
        &reduction_path(&reduction.reduced_composition_hash_base16),
        &bytes,
    )?;
    Ok(())
}

pub fn load_provisional_reduction<S: FileStoreReader + ?Sized>(
    store: &S,
    hash: &ValueHash,
) -> Result<Option<ProvisionalReduction>, ReductionError> {
    let Some(bytes) = store.get_file_content(&reduction_path(hash))? else {
        return Ok(None);
    };
    let reduction: ProvisionalReduction =
        serde_json::from_slice(&bytes).map_err(|e| ReductionError::Malformed {
            hash: *hash,
            reason: e.to_string(),
        })?;
    Ok(Some(reduction))
}
