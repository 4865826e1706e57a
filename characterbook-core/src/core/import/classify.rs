//! Deterministic file-type classification for externally supplied files.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use super::ImportRequest;

/// Logical type of an external file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Character,
    Race,
    /// A character archive.
    Chax,
    /// Generic JSON import candidate.
    Json,
    Unknown,
}

/// Suffixes that identify a typed file, in match priority order.
const TYPED_SUFFIXES: [(&str, FileType); 3] = [
    (".character", FileType::Character),
    (".race", FileType::Race),
    (".chax", FileType::Chax),
];

const KNOWN_MIME_TYPES: [(&str, FileType); 5] = [
    ("application/json", FileType::Json),
    ("text/json", FileType::Json),
    ("application/vnd.characterbook.character", FileType::Character),
    ("application/vnd.characterbook.race", FileType::Race),
    ("application/vnd.characterbook.chax", FileType::Chax),
];

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Race => "race",
            Self::Chax => "chax",
            Self::Json => "json",
            Self::Unknown => "unknown",
        }
    }

    /// File extension (without the dot) used when staging this type.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Unknown => None,
            known => Some(known.as_str()),
        }
    }

    /// Maps a bare extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "character" => Some(Self::Character),
            "race" => Some(Self::Race),
            "chax" => Some(Self::Chax),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Maps a declared MIME type. Parameters such as `; charset=utf-8` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        KNOWN_MIME_TYPES
            .iter()
            .find(|(known, _)| *known == essence)
            .map(|(_, file_type)| *file_type)
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an import request. Total: every input yields exactly one type.
///
/// Rules, first match wins:
/// 1. extension of the URI's last path segment, then of the display name;
/// 2. the declared MIME type;
/// 3. any path segment containing `.character`, `.race` or `.chax`;
/// 4. otherwise [`FileType::Unknown`].
pub fn classify(request: &ImportRequest) -> FileType {
    let segments = path_segments(&request.uri);

    if let Some(file_type) = segments.last().and_then(|name| extension_type(name)) {
        return file_type;
    }
    if let Some(file_type) = request.display_name.as_deref().and_then(extension_type) {
        return file_type;
    }
    if let Some(file_type) = request.declared_mime.as_deref().and_then(FileType::from_mime) {
        return file_type;
    }
    scan_segments(&segments).unwrap_or(FileType::Unknown)
}

/// Parses `uri_or_path` as a URL if it carries a scheme.
///
/// Single-letter schemes are Windows drive letters and make this a path.
pub(crate) fn parse_uri(uri_or_path: &str) -> Option<Url> {
    Url::parse(uri_or_path.trim())
        .ok()
        .filter(|url| url.scheme().len() > 1)
}

/// Path segments of a URI or plain filesystem path.
///
/// URIs lose scheme, authority, query and fragment, and each segment is
/// percent-decoded. Plain paths are split verbatim on either separator.
pub(crate) fn path_segments(uri_or_path: &str) -> Vec<String> {
    match parse_uri(uri_or_path) {
        Some(url) => match url.path_segments() {
            Some(segments) => segments
                .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
                .collect(),
            None => vec![percent_decode_str(url.path()).decode_utf8_lossy().into_owned()],
        },
        None => uri_or_path
            .trim()
            .split(['/', '\\'])
            .map(str::to_string)
            .collect(),
    }
}

fn extension_type(name: &str) -> Option<FileType> {
    let (_, ext) = name.trim().rsplit_once('.')?;
    FileType::from_extension(ext)
}

fn scan_segments(segments: &[String]) -> Option<FileType> {
    segments.iter().find_map(|segment| {
        let segment = segment.to_ascii_lowercase();
        TYPED_SUFFIXES
            .iter()
            .find(|(suffix, _)| segment.contains(suffix))
            .map(|(_, file_type)| *file_type)
    })
}
