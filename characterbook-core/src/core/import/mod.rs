//! Import pipeline for files opened or shared from outside the app.
//!
//! Each external open/share event goes through four steps:
//!
//! 1. **Received**: the host delivers an [`ImportEvent`].
//! 2. **Classified**: [`classify`] assigns a [`FileType`]; `Unknown` aborts
//!    with [`CharacterBookError::UnsupportedFileType`].
//! 3. **Staged**: the bytes are streamed into the cache directory under a
//!    collision-free name by [`Stager`].
//! 4. **Delivered**: the resulting [`StagedImport`] is handed to the
//!    registered [`ImportSink`]. Parsing is the sink's business.
//!
//! Failures (`Cancelled`, `UnsupportedFileType`, `CopyFailed`) are reported
//! to the sink and returned to the caller. Cancellation is only possible
//! before staging starts; a copy in progress runs to completion or failure.

pub mod classify;
pub mod staging;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::{CharacterBookError, Result, StoreSettings};

pub use classify::{classify, FileType};
pub use staging::{staged_file_name, ContentSource, FileSystemSource, Stager};

/// What the host knows about an external file when it is opened or shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub uri: String,
    pub declared_mime: Option<String>,
    pub display_name: Option<String>,
}

impl ImportRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            declared_mime: None,
            display_name: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.declared_mime = Some(mime.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// An external open/share event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    Opened(ImportRequest),
    /// The user dismissed the system picker.
    Cancelled,
}

/// A file copied into the import cache, waiting to be consumed.
///
/// Not persisted: it lives until the consumer ingests it or calls
/// [`discard`](Self::discard).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImport {
    pub path: PathBuf,
    pub file_type: FileType,
    /// Display name as supplied by the host or provider, unmodified.
    pub original_name: Option<String>,
}

impl StagedImport {
    /// Deletes the staged file.
    pub fn discard(self) -> Result<()> {
        self.remove_file()
    }

    pub(crate) fn remove_file(&self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        log::debug!("removed staged import {}", self.path.display());
        Ok(())
    }
}

/// Receives the outcome of every import event.
pub trait ImportSink {
    fn delivered(&mut self, staged: StagedImport);
    fn failed(&mut self, error: &CharacterBookError);
}

/// FIFO queue of staged imports awaiting the UI.
#[derive(Debug, Default)]
pub struct PendingImports {
    queue: VecDeque<StagedImport>,
    failures: Vec<String>,
}

impl PendingImports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the oldest pending import.
    pub fn pop(&mut self) -> Option<StagedImport> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// User-facing messages for failed imports, oldest first.
    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}

impl ImportSink for PendingImports {
    fn delivered(&mut self, staged: StagedImport) {
        self.queue.push_back(staged);
    }

    fn failed(&mut self, error: &CharacterBookError) {
        self.failures.push(error.user_message());
    }
}

/// Classifies, stages and delivers external files to a sink.
pub struct ImportPipeline<S: ImportSink> {
    stager: Stager,
    source: Box<dyn ContentSource>,
    sink: S,
}

impl<S: ImportSink> ImportPipeline<S> {
    /// Creates a pipeline staging into `cache_dir` and reading from the filesystem.
    pub fn new<P: AsRef<Path>>(cache_dir: P, sink: S) -> Self {
        Self::with_source(cache_dir, Box::new(FileSystemSource), sink)
    }

    pub fn with_source<P: AsRef<Path>>(cache_dir: P, source: Box<dyn ContentSource>, sink: S) -> Self {
        Self {
            stager: Stager::new(cache_dir),
            source,
            sink,
        }
    }

    pub fn from_settings(settings: &StoreSettings, sink: S) -> Self {
        Self::new(settings.import_cache_dir(), sink)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn cache_dir(&self) -> &Path {
        self.stager.cache_dir()
    }

    /// Runs one event through the pipeline.
    ///
    /// On success the staged import is delivered to the sink and its path is
    /// returned; ownership of the file passes to the sink. On failure the
    /// sink is notified and the error is returned.
    ///
    /// # Errors
    ///
    /// [`CharacterBookError::Cancelled`] for a cancelled pick,
    /// [`CharacterBookError::UnsupportedFileType`] if the file classifies as
    /// unknown, [`CharacterBookError::CopyFailed`] if reading or writing fails.
    pub fn handle(&mut self, event: ImportEvent) -> Result<PathBuf> {
        match self.process(event) {
            Ok(staged) => {
                let path = staged.path.clone();
                log::info!("delivering {} import staged at {}", staged.file_type, path.display());
                self.sink.delivered(staged);
                Ok(path)
            }
            Err(e) => {
                log::warn!("import failed: {e}");
                self.sink.failed(&e);
                Err(e)
            }
        }
    }

    fn process(&self, event: ImportEvent) -> Result<StagedImport> {
        let request = match event {
            ImportEvent::Opened(request) => request,
            ImportEvent::Cancelled => return Err(CharacterBookError::Cancelled),
        };

        let file_type = classify(&request);
        if !file_type.is_known() {
            let name = request.display_name.as_deref().unwrap_or(&request.uri);
            return Err(CharacterBookError::UnsupportedFileType(name.to_string()));
        }
        log::debug!("classified {} as {file_type}", request.uri);

        let original_name = request
            .display_name
            .clone()
            .or_else(|| self.source.display_name(&request.uri));
        let file_name = staged_file_name(original_name.as_deref(), file_type);

        let copy_failed = |source: std::io::Error| CharacterBookError::CopyFailed {
            uri: request.uri.clone(),
            source,
        };
        let mut reader = self.source.open(&request.uri).map_err(copy_failed)?;
        let path = self.stager.stage(&mut reader, &file_name).map_err(copy_failed)?;

        Ok(StagedImport {
            path,
            file_type,
            original_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read};
    use tempfile::TempDir;

    /// Serves fixed bytes for any URI, like an Android content provider.
    struct MemorySource {
        bytes: Vec<u8>,
        name: Option<String>,
    }

    impl ContentSource for MemorySource {
        fn open(&self, _uri: &str) -> io::Result<Box<dyn Read>> {
            Ok(Box::new(io::Cursor::new(self.bytes.clone())))
        }

        fn display_name(&self, _uri: &str) -> Option<String> {
            self.name.clone()
        }
    }

    fn memory_pipeline(dir: &TempDir, name: Option<&str>) -> ImportPipeline<PendingImports> {
        let source = MemorySource {
            bytes: b"{\"kind\":\"character\",\"title\":\"Aria\"}".to_vec(),
            name: name.map(str::to_string),
        };
        ImportPipeline::with_source(dir.path().join("imports"), Box::new(source), PendingImports::new())
    }

    #[test]
    fn test_cancelled_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = memory_pipeline(&dir, None);
        let err = pipeline.handle(ImportEvent::Cancelled).unwrap_err();
        assert!(matches!(err, CharacterBookError::Cancelled));
        assert!(pipeline.sink().is_empty());
        assert_eq!(pipeline.sink().failures().to_vec(), vec!["Import cancelled".to_string()]);
    }

    #[test]
    fn test_unknown_type_aborts_before_staging() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = memory_pipeline(&dir, Some("photo.png"));
        let request = ImportRequest::new("content://media/document/9")
            .with_mime("image/png")
            .with_display_name("photo.png");
        let err = pipeline.handle(ImportEvent::Opened(request)).unwrap_err();
        assert!(matches!(err, CharacterBookError::UnsupportedFileType(ref n) if n == "photo.png"));
        assert!(!dir.path().join("imports").exists());
        assert_eq!(pipeline.sink().failures().len(), 1);
    }

    #[test]
    fn test_provider_display_name_is_used() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = memory_pipeline(&dir, Some("Aria"));
        let request = ImportRequest::new("content://provider/document/12")
            .with_mime("application/vnd.characterbook.character");
        let path = pipeline.handle(ImportEvent::Opened(request)).unwrap();
        assert_eq!(path.file_name().unwrap(), "Aria.character");

        let staged = pipeline.sink_mut().pop().unwrap();
        assert_eq!(staged.file_type, FileType::Character);
        assert_eq!(staged.original_name.as_deref(), Some("Aria"));
    }

    #[test]
    fn test_synthesized_name_without_metadata() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = memory_pipeline(&dir, None);
        let request = ImportRequest::new("content://provider/document/12").with_mime("application/json");
        let path = pipeline.handle(ImportEvent::Opened(request)).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("imported_"), "{name}");
        assert!(name.ends_with(".json"), "{name}");
        assert!(pipeline.sink_mut().pop().unwrap().original_name.is_none());
    }

    #[test]
    fn test_same_name_twice_yields_distinct_files() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = memory_pipeline(&dir, None);
        let request = ImportRequest::new("content://p/doc/1").with_display_name("party.chax");

        let first = pipeline.handle(ImportEvent::Opened(request.clone())).unwrap();
        let second = pipeline.handle(ImportEvent::Opened(request)).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
        assert_eq!(pipeline.sink().len(), 2);
    }

    #[test]
    fn test_missing_file_is_copy_failed() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = ImportPipeline::new(dir.path().join("imports"), PendingImports::new());
        let missing = dir.path().join("gone.character");
        let err = pipeline
            .handle(ImportEvent::Opened(ImportRequest::new(missing.to_string_lossy())))
            .unwrap_err();
        match err {
            CharacterBookError::CopyFailed { uri, source } => {
                assert!(uri.ends_with("gone.character"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected CopyFailed, got {other:?}"),
        }
        assert!(pipeline.sink().is_empty());
    }

    #[test]
    fn test_discard_removes_file() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = memory_pipeline(&dir, Some("Aria.character"));
        let path = pipeline
            .handle(ImportEvent::Opened(
                ImportRequest::new("content://p/doc/3").with_mime("application/vnd.characterbook.character"),
            ))
            .unwrap();
        let staged = pipeline.sink_mut().pop().unwrap();
        staged.discard().unwrap();
        assert!(!path.exists());
    }
}
