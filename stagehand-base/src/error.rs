use crate::AssetId;
use std::sync::Arc;

/// Error-kind tag carried by every [`AssetLoadError`]. `RetryLimitExceeded`
/// is synthesized by the asset manager when a retriable failure runs out of
/// its retry budget; it is always non-retriable.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AssetLoadErrorKind {
    Unspecified,
    RetryLimitExceeded,
    AbortedByHolder,
}

/// A failure reported by a concrete resource load. `retriable` classifies the
/// failure as transient (eligible for another attempt) or permanent.
#[derive(Clone, Debug)]
pub struct AssetLoadError {
    pub kind: AssetLoadErrorKind,
    pub retriable: bool,
    pub message: String,
}

impl AssetLoadError {
    pub fn retriable(message: impl Into<String>) -> Self {
        AssetLoadError {
            kind: AssetLoadErrorKind::Unspecified,
            retriable: true,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        AssetLoadError {
            kind: AssetLoadErrorKind::Unspecified,
            retriable: false,
            message: message.into(),
        }
    }

    pub fn retry_limit_exceeded(id: &AssetId) -> Self {
        AssetLoadError {
            kind: AssetLoadErrorKind::RetryLimitExceeded,
            retriable: false,
            message: format!("retry limit exceeded for asset {}", id),
        }
    }
}

impl std::error::Error for AssetLoadError {}

impl core::fmt::Display for AssetLoadError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        write!(
            fmt,
            "{:?} (retriable: {}): {}",
            self.kind, self.retriable, self.message
        )
    }
}

/// Problems found while normalizing the static game manifest. Configuration
/// is user input, so these are surfaced as errors rather than assertions.
#[derive(Clone, Debug)]
pub enum ManifestError {
    StringError(String),
    JsonError(Arc<serde_json::Error>),
    MissingField(AssetId, &'static str),
    UnknownAudioSystem(AssetId, String),
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            ManifestError::StringError(_) => None,
            ManifestError::JsonError(ref e) => Some(&**e),
            ManifestError::MissingField(_, _) => None,
            ManifestError::UnknownAudioSystem(_, _) => None,
        }
    }
}

impl core::fmt::Display for ManifestError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            ManifestError::StringError(ref e) => e.fmt(fmt),
            ManifestError::JsonError(ref e) => e.fmt(fmt),
            ManifestError::MissingField(ref id, field) => {
                write!(fmt, "asset {} is missing required field `{}`", id, field)
            }
            ManifestError::UnknownAudioSystem(ref id, ref system) => {
                write!(fmt, "asset {} references unknown audio system {}", id, system)
            }
        }
    }
}

impl From<&str> for ManifestError {
    fn from(str: &str) -> Self {
        ManifestError::StringError(str.to_string())
    }
}

impl From<String> for ManifestError {
    fn from(string: String) -> Self {
        ManifestError::StringError(string)
    }
}

impl From<serde_json::Error> for ManifestError {
    fn from(error: serde_json::Error) -> Self {
        ManifestError::JsonError(Arc::new(error))
    }
}

/// A failed persisted-storage read.
#[derive(Clone, Debug)]
pub struct StorageError {
    pub message: String,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        StorageError {
            message: message.into(),
        }
    }
}

impl std::error::Error for StorageError {}

impl core::fmt::Display for StorageError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        write!(fmt, "storage read failed: {}", self.message)
    }
}
