//! File store abstraction: blob + directory interface over a local
//! filesystem, with an in-memory implementation and a projection overlay for
//! speculative writes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;

/// A store-relative file path: non-empty UTF-8 segments, no traversal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilePath(Vec<String>);

impl FilePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilePath(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        FilePath(segments)
    }

    pub fn starts_with(&self, prefix: &FilePath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    fn validate(&self) -> Result<(), FileStoreError> {
        if self.0.is_empty() {
            return Err(FileStoreError::InvalidPath {
                path: self.to_string(),
                reason: "empty path".into(),
            });
        }
        for segment in &self.0 {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('/') {
                return Err(FileStoreError::InvalidPath {
                    path: self.to_string(),
                    reason: format!("invalid segment '{segment}'"),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("file store I/O on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid file store path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

pub trait FileStoreReader: Send + Sync {
    /// `Ok(None)` when the path does not exist.
    fn get_file_content(&self, path: &FilePath) -> Result<Option<Bytes>, FileStoreError>;

    /// All file paths under the directory, store-relative, in sorted order.
    fn list_files(&self, directory: &FilePath) -> Result<Vec<FilePath>, FileStoreError>;
}

pub trait FileStoreWriter: Send + Sync {
    fn set_file_content(&mut self, path: &FilePath, content: &[u8]) -> Result<(), FileStoreError>;

    fn append_file_content(&mut self, path: &FilePath, content: &[u8])
    -> Result<(), FileStoreError>;

    /// Deleting a missing file is not an error.
    fn delete_file(&mut self, path: &FilePath) -> Result<(), FileStoreError>;
}

pub trait FileStore: FileStoreReader + FileStoreWriter {}
impl<T: FileStoreReader + FileStoreWriter> FileStore for T {}

/// File store over a local directory root.
#[derive(Debug)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, FileStoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| FileStoreError::Io {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &FilePath) -> Result<PathBuf, FileStoreError> {
        path.validate()?;
        let mut full = self.root.clone();
        for segment in path.segments() {
            full.push(segment);
        }
        Ok(full)
    }

    fn io_error(path: &Path, source: std::io::Error) -> FileStoreError {
        FileStoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn collect_files(
        &self,
        dir: &Path,
        relative: &FilePath,
        out: &mut Vec<FilePath>,
    ) -> Result<(), FileStoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(Self::io_error(dir, source)),
        };
        for entry in entries {
            let entry = entry.map_err(|source| Self::io_error(dir, source))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child = relative.child(name);
            let file_type = entry
                .file_type()
                .map_err(|source| Self::io_error(&entry.path(), source))?;
            if file_type.is_dir() {
                self.collect_files(&entry.path(), &child, out)?;
            } else {
                out.push(child);
            }
        }
        Ok(())
    }
}

impl FileStoreReader for LocalFileStore {
    fn get_file_content(&self, path: &FilePath) -> Result<Option<Bytes>, FileStoreError> {
        let full = self.full_path(path)?;
        match fs::read(&full) {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Self::io_error(&full, source)),
        }
    }

    fn list_files(&self, directory: &FilePath) -> Result<Vec<FilePath>, FileStoreError> {
        let mut full = self.root.clone();
        for segment in directory.segments() {
            full.push(segment);
        }
        let mut out = Vec::new();
        self.collect_files(&full, directory, &mut out)?;
        out.sort();
        Ok(out)
    }
}

impl FileStoreWriter for LocalFileStore {
    fn set_file_content(&mut self, path: &FilePath, content: &[u8]) -> Result<(), FileStoreError> {
        let full = self.full_path(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|source| Self::io_error(parent, source))?;
        }
        fs::write(&full, content).map_err(|source| Self::io_error(&full, source))
    }

    fn append_file_content(
        &mut self,
        path: &FilePath,
        content: &[u8],
    ) -> Result<(), FileStoreError> {
        let full = self.full_path(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|source| Self::io_error(parent, source))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .map_err(|source| Self::io_error(&full, source))?;
        file.write_all(content)
            .map_err(|source| Self::io_error(&full, source))?;
        file.flush().map_err(|source| Self::io_error(&full, source))
    }

    fn delete_file(&mut self, path: &FilePath) -> Result<(), FileStoreError> {
        let full = self.full_path(path)?;
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Self::io_error(&full, source)),
        }
    }
}

/// In-memory file store, for tests and as the projection overlay's backing.
#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    files: BTreeMap<FilePath, Bytes>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &BTreeMap<FilePath, Bytes> {
        &self.files
    }
}

impl FileStoreReader for InMemoryFileStore {
    fn get_file_content(&self, path: &FilePath) -> Result<Option<Bytes>, FileStoreError> {
        Ok(self.files.get(path).cloned())
    }

    fn list_files(&self, directory: &FilePath) -> Result<Vec<FilePath>, FileStoreError> {
        Ok(self
            .files
            .keys()
            .filter(|path| path.starts_with(directory))
            .cloned()
            .collect())
    }
}

impl FileStoreWriter for InMemoryFileStore {
    fn set_file_content(&mut self, path: &FilePath, content: &[u8]) -> Result<(), FileStoreError> {
        path.validate()?;
        self.files
            .insert(path.clone(), Bytes::copy_from_slice(content));
        Ok(())
    }

    fn append_file_content(
        &mut self,
        path: &FilePath,
        content: &[u8],
    ) -> Result<(), FileStoreError> {
        path.validate()?;
        let mut combined = self
            .files
            .get(path)
            .map(|existing| existing.to_vec())
            .unwrap_or_default();
        combined.extend_from_slice(content);
        self.files.insert(path.clone(), Bytes::from(combined));
        Ok(())
    }

    fn delete_file(&mut self, path: &FilePath) -> Result<(), FileStoreError> {
        self.files.remove(path);
        Ok(())
    }
}

/// The change set captured by a [`ProjectionFileStore`].
#[derive(Debug, Default)]
pub struct ProjectedChanges {
    pub writes: BTreeMap<FilePath, Bytes>,
    pub deletions: BTreeSet<FilePath>,
}

impl ProjectedChanges {
    /// Replay the captured changes onto a real store.
    pub fn apply_to(&self, store: &mut dyn FileStoreWriter) -> Result<(), FileStoreError> {
        for path in &self.deletions {
            store.delete_file(path)?;
        }
        for (path, content) in &self.writes {
            store.set_file_content(path, content)?;
        }
        Ok(())
    }
}

/// Routes reads to an in-memory overlay first, falling back to a read-only
/// base; writes land only in the overlay. Extracting the change set after a
/// successful speculative run is what makes the two-phase commit atomic from
/// the base store's point of view.
pub struct ProjectionFileStore<'a> {
    base: &'a dyn FileStoreReader,
    overlay: BTreeMap<FilePath, Bytes>,
    deleted: BTreeSet<FilePath>,
}

impl<'a> ProjectionFileStore<'a> {
    pub fn new(base: &'a dyn FileStoreReader) -> Self {
        Self {
            base,
            overlay: BTreeMap::new(),
            deleted: BTreeSet::new(),
        }
    }

    pub fn into_changes(self) -> ProjectedChanges {
        ProjectedChanges {
            writes: self.overlay,
            deletions: self.deleted,
        }
    }
}

impl FileStoreReader for ProjectionFileStore<'_> {
    fn get_file_content(&self, path: &FilePath) -> Result<Option<Bytes>, FileStoreError> {
        if self.deleted.contains(path) {
            return Ok(None);
        }
        if let Some(content) = self.overlay.get(path) {
            return Ok(Some(content.clone()));
        }
        self.base.get_file_content(path)
    }

    fn list_files(&self, directory: &FilePath) -> Result<Vec<FilePath>, FileStoreError> {
        let mut paths: BTreeSet<FilePath> = self.base.list_files(directory)?.into_iter().collect();
        for path in self.overlay.keys() {
            if path.starts_with(directory) {
                paths.insert(path.clone());
            }
        }
        for path in &self.deleted {
            paths.remove(path);
        }
        Ok(paths.into_iter().collect())
    }
}

impl FileStoreWriter for ProjectionFileStore<'_> {
    fn set_file_content(&mut self, path: &FilePath, content: &[u8]) -> Result<(), FileStoreError> {
        path.validate()?;
        self.deleted.remove(path);
        self.overlay
            .insert(path.clone(), Bytes::copy_from_slice(content));
        Ok(())
    }

    fn append_file_content(
        &mut self,
        path: &FilePath,
        content: &[u8],
    ) -> Result<(), FileStoreError> {
        path.validate()?;
        let existing = match self.get_file_content(path)? {
            Some(existing) => existing.to_vec(),
            None => Vec::new(),
        };
        let mut combined = existing;
        combined.extend_from_slice(content);
        self.deleted.remove(path);
        self.overlay.insert(path.clone(), Bytes::from(combined));
        Ok(())
    }

    fn delete_file(&mut self, path: &FilePath) -> Result<(), FileStoreError> {
        self.overlay.remove(path);
        self.deleted.insert(path.clone());
        Ok(())
    }
}
