//! Copying external content into the pipeline's cache directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::classify::{parse_uri, FileType};

/// Upper bound on `name-N.ext` candidates tried before giving up.
const MAX_NAME_ATTEMPTS: usize = 10_000;

/// Resolves an external URI to readable bytes.
///
/// Platform hosts implement this over their content provider; the default
/// [`FileSystemSource`] handles `file://` URIs and plain paths.
pub trait ContentSource {
    fn open(&self, uri: &str) -> io::Result<Box<dyn Read>>;

    /// Display name reported by the provider's metadata, if any.
    fn display_name(&self, _uri: &str) -> Option<String> {
        None
    }
}

/// Reads `file://` URIs and plain filesystem paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemSource;

impl FileSystemSource {
    fn local_path(uri: &str) -> io::Result<PathBuf> {
        match parse_uri(uri) {
            Some(url) if url.scheme() == "file" => url.to_file_path().map_err(|()| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{uri} does not name a local file"),
                )
            }),
            Some(url) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("no content resolver for {} URIs", url.scheme()),
            )),
            None => Ok(PathBuf::from(uri.trim())),
        }
    }
}

impl ContentSource for FileSystemSource {
    fn open(&self, uri: &str) -> io::Result<Box<dyn Read>> {
        let file = File::open(Self::local_path(uri)?)?;
        Ok(Box::new(file))
    }

    fn display_name(&self, uri: &str) -> Option<String> {
        Self::local_path(uri)
            .ok()?
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Writes streams into a cache directory without ever overwriting a file.
#[derive(Debug, Clone)]
pub struct Stager {
    cache_dir: PathBuf,
}

impl Stager {
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Streams `reader` into a new file named `file_name` (or `stem-N.ext`
    /// if taken) and returns its path. A partially written file is removed
    /// on failure.
    pub fn stage(&self, reader: &mut dyn Read, file_name: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.cache_dir)?;
        let (file, path) = self.create_unique(file_name)?;

        let mut writer = BufWriter::new(file);
        let copied = io::copy(reader, &mut writer).and_then(|bytes| {
            writer.flush()?;
            Ok(bytes)
        });
        match copied {
            Ok(bytes) => {
                log::debug!("staged {bytes} bytes at {}", path.display());
                Ok(path)
            }
            Err(e) => {
                drop(writer);
                if let Err(cleanup) = fs::remove_file(&path) {
                    log::warn!("could not remove partial file {}: {cleanup}", path.display());
                }
                Err(e)
            }
        }
    }

    /// Creates `file_name`, or `stem-2.ext`, `stem-3.ext`, … on collision.
    fn create_unique(&self, file_name: &str) -> io::Result<(File, PathBuf)> {
        let (stem, ext) = split_extension(file_name);
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 1 {
                file_name.to_string()
            } else {
                format!("{stem}-{attempt}{ext}")
            };
            let path = self.cache_dir.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((file, path)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free name for {file_name} in {}", self.cache_dir.display()),
        ))
    }
}

/// Splits `name.ext` into (`name`, `.ext`). Leading-dot names have no extension.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name.split_at(dot),
        _ => (file_name, ""),
    }
}

/// Reduces a provider-supplied name to a safe single path component.
fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|') { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Chooses the file name a staged import is written under.
///
/// Prefers the original display name, with the type's extension appended
/// when the name does not already carry it. Without a usable name, falls back
/// to `imported_<timestamp>.<ext>`.
pub fn staged_file_name(original_name: Option<&str>, file_type: FileType) -> String {
    let ext = file_type.extension().unwrap_or("bin");
    match original_name.and_then(sanitize_file_name) {
        Some(name) => {
            let (_, current) = split_extension(&name);
            if FileType::from_extension(current.trim_start_matches('.')) == Some(file_type) {
                name
            } else {
                format!("{name}.{ext}")
            }
        }
        None => format!(
            "imported_{}.{ext}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S%3f")
        ),
    }
}
