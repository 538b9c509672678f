//! Composition events and log records.
//!
//! A record is the canonical JSON object
//! `{"compositionEvent": {<one-of>}, "parentHashBase16": "…"}` and its own
//! hash is the SHA-256 of those bytes. Records form a linked chain; the
//! root's parent is the hash of empty input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pine::value::{ValueHash, sha256_bytes};
use crate::store::json_canon::{CanonJsonError, to_canon_json_bytes};

/// A hash reference to a stored component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRef {
    #[serde(rename = "hashBase16")]
    pub hash_base16: ValueHash,
}

impl ComponentRef {
    pub fn new(hash: ValueHash) -> Self {
        Self { hash_base16: hash }
    }
}

impl From<ValueHash> for ComponentRef {
    fn from(hash: ValueHash) -> Self {
        Self::new(hash)
    }
}

/// A typed operation recorded in the log; exactly one case per record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositionEvent {
    #[serde(rename = "updateElmAppStateForEvent")]
    UpdateElmAppStateForEvent(ComponentRef),
    #[serde(rename = "applyFunctionOnElmAppState")]
    ApplyFunctionOnElmAppState(ComponentRef),
    #[serde(rename = "setElmAppState")]
    SetElmAppState(ComponentRef),
    #[serde(rename = "deployAppConfigAndInitElmAppState")]
    DeployAppConfigAndInitElmAppState(ComponentRef),
    #[serde(rename = "deployAppConfigAndMigrateElmAppState")]
    DeployAppConfigAndMigrateElmAppState(ComponentRef),
    #[serde(rename = "revertProcessTo")]
    RevertProcessTo(ComponentRef),
}

impl CompositionEvent {
    pub fn component_ref(&self) -> &ComponentRef {
        match self {
            CompositionEvent::UpdateElmAppStateForEvent(r)
            | CompositionEvent::ApplyFunctionOnElmAppState(r)
            | CompositionEvent::SetElmAppState(r)
            | CompositionEvent::DeployAppConfigAndInitElmAppState(r)
            | CompositionEvent::DeployAppConfigAndMigrateElmAppState(r)
            | CompositionEvent::RevertProcessTo(r) => r,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CompositionEvent::UpdateElmAppStateForEvent(_) => "update-elm-app-state-for-event",
            CompositionEvent::ApplyFunctionOnElmAppState(_) => "apply-function-on-elm-app-state",
            CompositionEvent::SetElmAppState(_) => "set-elm-app-state",
            CompositionEvent::DeployAppConfigAndInitElmAppState(_) => {
                "deploy-app-config-and-init-elm-app-state"
            }
            CompositionEvent::DeployAppConfigAndMigrateElmAppState(_) => {
                "deploy-app-config-and-migrate-elm-app-state"
            }
            CompositionEvent::RevertProcessTo(_) => "revert-process-to",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionRecord {
    #[serde(rename = "parentHashBase16")]
    pub parent_hash_base16: ValueHash,
    #[serde(rename = "compositionEvent")]
    pub event: CompositionEvent,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Canon(#[from] CanonJsonError),
    #[error("malformed composition record: {reason}")]
    Malformed { reason: String },
}

impl CompositionRecord {
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, RecordError> {
        Ok(to_canon_json_bytes(self)?)
    }

    /// The record's own hash: SHA-256 of its canonical JSON.
    pub fn hash(&self) -> Result<ValueHash, RecordError> {
        Ok(sha256_bytes(&self.to_canonical_json()?))
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, RecordError> {
        serde_json::from_slice(bytes).map_err(|e| RecordError::Malformed {
            reason: e.to_string(),
        })
    }
}

/// Parent of the root record.
pub fn sentinel_parent_hash() -> ValueHash {
    sha256_bytes(b"")
}
