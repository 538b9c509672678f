//! The append-only composition log.
//!
//! Records live in newline-delimited segment files under `composition-log/`,
//! named by zero-padded position. Appending reads the current head, links the
//! new record to it by parent hash, and writes one canonical-JSON line.
//! Reverse enumeration walks segments from the head backward, one segment in
//! memory at a time.

use thiserror::Error;

use crate::pine::value::{ValueHash, sha256_bytes};
use crate::store::composition::{
    CompositionEvent, CompositionRecord, RecordError, sentinel_parent_hash,
};
use crate::store::file_store::{
    FilePath, FileStore, FileStoreError, FileStoreReader, FileStoreWriter,
};

pub const COMPOSITION_LOG_DIR: &str = "composition-log";

/// Segments rotate after this many records.
const RECORDS_PER_SEGMENT: usize = 1000;

#[derive(Debug, Error)]
pub enum LogError {
    #[error(transparent)]
    FileStore(#[from] FileStoreError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("malformed log segment '{segment}': {reason}")]
    MalformedSegment { segment: String, reason: String },
}

/// A parsed record together with its own hash and the segment holding it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredRecord {
    pub hash: ValueHash,
    pub record: CompositionRecord,
    pub segment: FilePath,
}

fn log_dir() -> FilePath {
    FilePath::new([COMPOSITION_LOG_DIR])
}

fn segment_path(index: u64) -> FilePath {
    log_dir().child(format!("{index:08}"))
}

/// Segment paths in ascending position order.
pub fn list_segments<S: FileStoreReader + ?Sized>(
    reader: &S,
) -> Result<Vec<FilePath>, LogError> {
    Ok(reader.list_files(&log_dir())?)
}

fn segment_lines(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    bytes.split(|b| *b == b'\n').filter(|line| !line.is_empty())
}

/// Hash of the most recently appended record, if any.
pub fn head_hash<S: FileStoreReader + ?Sized>(reader: &S) -> Result<Option<ValueHash>, LogError> {
    let segments = list_segments(reader)?;
    let Some(last) = segments.last() else {
        return Ok(None);
    };
    let bytes = reader
        .get_file_content(last)?
        .ok_or_else(|| LogError::MalformedSegment {
            segment: last.to_string(),
            reason: "listed segment vanished".into(),
        })?;
    let Some(line) = segment_lines(&bytes).last() else {
        return Err(LogError::MalformedSegment {
            segment: last.to_string(),
            reason: "segment holds no records".into(),
        });
    };
    Ok(Some(sha256_bytes(line)))
}

/// Append an event to the log; returns the new head hash.
///
/// The parent defaults to the current head (or the sentinel hash of empty for
/// the first record). `parent_override` is how a revert record chains from
/// the record it reverts to instead of the head.
pub fn append_record<S: FileStore + ?Sized>(
    store: &mut S,
    event: CompositionEvent,
    parent_override: Option<ValueHash>,
) -> Result<ValueHash, LogError> {
    let parent = match parent_override {
        Some(parent) => parent,
        None => head_hash(store)?.unwrap_or_else(sentinel_parent_hash),
    };
    let record = CompositionRecord {
        parent_hash_base16: parent,
        event,
    };
    let mut line = record.to_canonical_json()?;
    let hash = sha256_bytes(&line);
    line.push(b'\n');

    let segments = list_segments(store)?;
    let target = match segments.last() {
        Some(last) => {
            let bytes = store.get_file_content(last)?.unwrap_or_default();
            if segment_lines(&bytes).count() < RECORDS_PER_SEGMENT {
                last.clone()
            } else {
                segment_path(segments.len() as u64)
            }
        }
        None => segment_path(0),
    };
    store.append_file_content(&target, &line)?;
    Ok(hash)
}

/// Iterate stored records from the head backward, in file order. Chain
/// following (skipping records orphaned by a revert) is the caller's concern.
pub fn enumerate_reverse(reader: &dyn FileStoreReader) -> Result<ReverseRecords<'_>, LogError> {
    let mut segments = list_segments(reader)?;
    segments.reverse();
    Ok(ReverseRecords {
        reader,
        segments: segments.into_iter(),
        current: Vec::new(),
        failed: false,
    })
}

pub struct ReverseRecords<'a> {
    reader: &'a dyn FileStoreReader,
    segments: std::vec::IntoIter<FilePath>,
    current: Vec<StoredRecord>,
    failed: bool,
}

impl ReverseRecords<'_> {
    fn load_segment(&mut self, segment: &FilePath) -> Result<(), LogError> {
        let bytes = self.reader.get_file_content(segment)?.ok_or_else(|| {
            LogError::MalformedSegment {
                segment: segment.to_string(),
                reason: "listed segment vanished".into(),
            }
        })?;
        // kept in file order; pop() yields the latest first
        self.current = segment_lines(&bytes)
            .map(|line| {
                Ok(StoredRecord {
                    hash: sha256_bytes(line),
                    record: CompositionRecord::from_json_slice(line)?,
                    segment: segment.clone(),
                })
            })
            .collect::<Result<Vec<_>, LogError>>()?;
        Ok(())
    }
}

impl Iterator for ReverseRecords<'_> {
    type Item = Result<StoredRecord, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(record) = self.current.pop() {
                return Some(Ok(record));
            }
            let segment = self.segments.next()?;
            if let Err(e) = self.load_segment(&segment) {
                self.failed = true;
                return Some(Err(e));
            }
        }
    }
}
