//! Content-addressed persistence of values.
//!
//! Each value node is stored under `values/<first-2-hex>/<hash-hex>` as its
//! framed serialization: blobs carry their bytes, lists carry the 32-byte
//! hashes of their children. Storage is idempotent and deduplicates by hash.

use std::collections::BTreeSet;

use bytes::Bytes;
use thiserror::Error;

use crate::pine::value::{Value, ValueHash};
use crate::store::file_store::{
    FilePath, FileStore, FileStoreError, FileStoreReader, FileStoreWriter,
};

pub const VALUES_DIR: &str = "values";

#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error(transparent)]
    FileStore(#[from] FileStoreError),
    #[error("missing component {hash}")]
    Missing { hash: ValueHash },
    #[error("malformed component {hash}: {reason}")]
    Malformed { hash: ValueHash, reason: String },
}

/// File path of a component, sharded by the first two hex chars.
pub fn component_path(hash: &ValueHash) -> FilePath {
    let hex = hash.to_hex();
    FilePath::new([VALUES_DIR.to_string(), hex[..2].to_string(), hex])
}

/// Persist a value and its descendants; returns the value's hash. Already
/// present components are left untouched.
pub fn store_component<S: FileStore + ?Sized>(
    store: &mut S,
    value: &Value,
) -> Result<ValueHash, ContentStoreError> {
    let hash = value.hash();
    let path = component_path(&hash);
    if store.get_file_content(&path)?.is_some() {
        return Ok(hash);
    }
    if let Value::List(items) = value {
        for item in items.iter() {
            store_component(store, item)?;
        }
    }
    store.set_file_content(&path, &value.framed_bytes())?;
    Ok(hash)
}

/// Materialize a value by hash; `None` when the root component is absent.
/// A present root with missing descendants is an error.
pub fn load_component<S: FileStoreReader + ?Sized>(
    store: &S,
    hash: &ValueHash,
) -> Result<Option<Value>, ContentStoreError> {
    let Some(bytes) = store.get_file_content(&component_path(hash))? else {
        return Ok(None);
    };
    let value = materialize(store, hash, &bytes)?;
    Ok(Some(value))
}

fn materialize<S: FileStoreReader + ?Sized>(
    store: &S,
    hash: &ValueHash,
    bytes: &Bytes,
) -> Result<Value, ContentStoreError> {
    match parse_framed(hash, bytes)? {
        Framed::Blob(content) => Ok(Value::Blob(content)),
        Framed::List(children) => {
            let mut items = Vec::with_capacity(children.len());
            for child in children {
                let value = load_component(store, &child)?
                    .ok_or(ContentStoreError::Missing { hash: child })?;
                items.push(value);
            }
            Ok(Value::list(items))
        }
    }
}

/// All component file paths reachable from a hash, the node itself included.
pub fn component_file_closure<S: FileStoreReader + ?Sized>(
    store: &S,
    hash: &ValueHash,
    closure: &mut BTreeSet<FilePath>,
) -> Result<(), ContentStoreError> {
    let path = component_path(hash);
    if !closure.insert(path.clone()) {
        return Ok(());
    }
    let bytes = store
        .get_file_content(&path)?
        .ok_or(ContentStoreError::Missing { hash: *hash })?;
    if let Framed::List(children) = parse_framed(hash, &bytes)? {
        for child in children {
            component_file_closure(store, &child, closure)?;
        }
    }
    Ok(())
}

enum Framed {
    Blob(Bytes),
    List(Vec<ValueHash>),
}

fn parse_framed(hash: &ValueHash, bytes: &Bytes) -> Result<Framed, ContentStoreError> {
    let malformed = |reason: &str| ContentStoreError::Malformed {
        hash: *hash,
        reason: reason.to_string(),
    };

    let terminator = bytes
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| malformed("missing header terminator"))?;
    let header =
        std::str::from_utf8(&bytes[..terminator]).map_err(|_| malformed("header is not UTF-8"))?;
    let (kind, length) = header
        .split_once(' ')
        .ok_or_else(|| malformed("header has no length field"))?;
    let length: usize = length
        .parse()
        .map_err(|_| malformed("header length is not a number"))?;
    let body = bytes.slice(terminator + 1..);

    match kind {
        "blob" => {
            if body.len() != length {
                return Err(malformed("blob length does not match header"));
            }
            Ok(Framed::Blob(body))
        }
        "list" => {
            if body.len() != length * 32 {
                return Err(malformed("list body is not `count * 32` bytes"));
            }
            let children = body
                .chunks(32)
                .map(|chunk| {
                    let mut hash = [0u8; 32];
                    hash.copy_from_slice(chunk);
                    ValueHash(hash)
                })
                .collect();
            Ok(Framed::List(children))
        }
        other => Err(malformed(&format!("unknown component kind '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pine::value::{int_value, string_value};
    use crate::store::file_store::InMemoryFileStore;

    #[test]
    fn store_and_load_roundtrip() {
        let mut store = InMemoryFileStore::new();
        let value = Value::list(vec![
            string_value("hello"),
            Value::list(vec![int_value(-5), Value::blob(vec![0u8; 40])]),
        ]);
        let hash = store_component(&mut store, &value).expect("store");
        assert_eq!(hash, value.hash());

        let loaded = load_component(&store, &hash).expect("load").expect("present");
        assert_eq!(loaded, value);
    }

    #[test]
    fn storing_twice_is_idempotent() {
        let mut store = InMemoryFileStore::new();
        let value = Value::list(vec![int_value(1), int_value(1)]);
        store_component(&mut store, &value).unwrap();
        let file_count = store.files().len();
        store_component(&mut store, &value).unwrap();
        assert_eq!(store.files().len(), file_count);
    }

    #[test]
    fn shared_subvalues_are_deduplicated() {
        let mut store = InMemoryFileStore::new();
        let shared = string_value("shared");
        let value = Value::list(vec![shared.clone(), shared.clone()]);
        store_component(&mut store, &value).unwrap();

        let mut closure = BTreeSet::new();
        component_file_closure(&store, &value.hash(), &mut closure).unwrap();
        assert_eq!(closure.len(), store.files().len());
    }

    #[test]
    fn absent_root_is_none_missing_child_is_error() {
        let mut store = InMemoryFileStore::new();
        let absent = Value::blob(vec![1u8]).hash();
        assert!(load_component(&store, &absent).unwrap().is_none());

        let value = Value::list(vec![int_value(7)]);
        let hash = store_component(&mut store, &value).unwrap();
        store
            .delete_file(&component_path(&int_value(7).hash()))
            .unwrap();
        let err = load_component(&store, &hash).unwrap_err();
        assert!(matches!(err, ContentStoreError::Missing { .. }));
    }

    #[test]
    fn malformed_component_is_rejected() {
        let mut store = InMemoryFileStore::new();
        let hash = Value::blob(vec![9u8]).hash();
        store
            .set_file_content(&component_path(&hash), b"garbage without terminator")
            .unwrap();
        let err = load_component(&store, &hash).unwrap_err();
        assert!(matches!(err, ContentStoreError::Malformed { .. }));
    }
}
