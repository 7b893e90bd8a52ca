use std::path::PathBuf;

use reqwest::StatusCode;

/// Every way the install pipeline, the store, or a CLI command can fail.
///
/// Variants are grouped the way §7 of the design groups them: input,
/// resource, transport, integrity, trust, archive, filesystem.
#[derive(Debug, thiserror::Error)]
pub enum ZvmError {
    // -- input --
    #[error("unknown version: {0}")]
    VersionNotFound(String),
    #[error("no artifact for {tool} {version} on {platform}")]
    UnsupportedPlatform {
        tool: &'static str,
        version: String,
        platform: String,
    },
    #[error("usage error: {0}")]
    UsageError(String),
    #[error("{0} is the active version; switch to another version before removing it")]
    ActiveVersionInUse(String),

    // -- resource --
    #[error("resource pool exhausted (capacity {capacity})")]
    PoolExhausted { capacity: usize },
    #[error("buffer too small: needed {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("path too long: {0}")]
    PathTooLong(PathBuf),
    #[error("could not determine home directory")]
    HomeNotFound,

    // -- transport --
    #[error("request to {url} failed: {status}")]
    HttpRequestFailed { url: String, status: StatusCode },
    #[error("response body exceeded buffer ({limit} bytes)")]
    ResponseTooLarge { limit: usize },
    #[error("declared size {expected} does not match downloaded size {actual}")]
    IncorrectSize { expected: u64, actual: u64 },
    #[error("mirror #{mirror_index} failed: {source}")]
    MirrorAttemptFailed {
        mirror_index: usize,
        #[source]
        source: Box<ZvmError>,
    },

    // -- integrity --
    #[error("checksum mismatch for {version}: expected {expected}, got {actual}")]
    HashMismatch {
        version: String,
        expected: String,
        actual: String,
    },

    // -- trust --
    #[error("signature verification failed")]
    SignatureVerificationFailed,
    #[error("unsupported minisign algorithm: {0:?}")]
    UnsupportedAlgorithm([u8; 2]),
    #[error("invalid minisign encoding: {0}")]
    InvalidEncoding(String),
    #[error("signature key id does not match the trusted public key")]
    KeyIdMismatch,

    // -- archive --
    #[error("unsupported archive format: {0}")]
    UnsupportedArchiveFormat(String),
    #[error("extraction failed: {0}")]
    ExtractFailed(String),
    #[error("archive entry escapes the output root: {0}")]
    PathEscape(String),

    // -- filesystem --
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Semver(#[from] semver::Error),
}

/// Classifies which errors the mirror strategy (§4.5) retries on the next
/// mirror, versus which ones it surfaces immediately.
impl ZvmError {
    /// Trust failures never trigger a retry; every other transport/integrity
    /// failure does, until the mirror list is exhausted.
    pub fn is_mirror_retryable(&self) -> bool {
        matches!(
            self,
            ZvmError::HttpRequestFailed { .. }
                | ZvmError::HashMismatch { .. }
                | ZvmError::IncorrectSize { .. }
                | ZvmError::Http(_)
        )
    }

    /// The mirror index that was in use when this error occurred, if it
    /// came from the mirror loop (§4.5).
    pub fn mirror_index(&self) -> Option<usize> {
        match self {
            ZvmError::MirrorAttemptFailed { mirror_index, .. } => Some(*mirror_index),
            _ => None,
        }
    }

    /// The stable machine-readable tag used by the JSON error emitter.
    pub fn kind(&self) -> &'static str {
        match self {
            ZvmError::VersionNotFound(_) => "VersionNotFound",
            ZvmError::UnsupportedPlatform { .. } => "UnsupportedPlatform",
            ZvmError::UsageError(_) => "UsageError",
            ZvmError::ActiveVersionInUse(_) => "ActiveVersionInUse",
            ZvmError::PoolExhausted { .. } => "PoolExhausted",
            ZvmError::BufferTooSmall { .. } => "BufferTooSmall",
            ZvmError::PathTooLong(_) => "PathTooLong",
            ZvmError::HomeNotFound => "HomeNotFound",
            ZvmError::HttpRequestFailed { .. } => "HttpRequestFailed",
            ZvmError::ResponseTooLarge { .. } => "ResponseTooLarge",
            ZvmError::IncorrectSize { .. } => "IncorrectSize",
            ZvmError::MirrorAttemptFailed { source, .. } => source.kind(),
            ZvmError::HashMismatch { .. } => "HashMismatch",
            ZvmError::SignatureVerificationFailed => "SignatureVerificationFailed",
            ZvmError::UnsupportedAlgorithm(_) => "UnsupportedAlgorithm",
            ZvmError::InvalidEncoding(_) => "InvalidEncoding",
            ZvmError::KeyIdMismatch => "KeyIdMismatch",
            ZvmError::UnsupportedArchiveFormat(_) => "UnsupportedArchiveFormat",
            ZvmError::ExtractFailed(_) => "ExtractFailed",
            ZvmError::PathEscape(_) => "PathEscape",
            ZvmError::PermissionDenied(_) => "PermissionDenied",
            ZvmError::Io(_) => "IoError",
            ZvmError::Http(_) => "HttpRequestFailed",
            ZvmError::Json(_) => "IoError",
            ZvmError::Url(_) => "IoError",
            ZvmError::Semver(_) => "VersionNotFound",
        }
    }
}

pub type Result<T> = std::result::Result<T, ZvmError>;
