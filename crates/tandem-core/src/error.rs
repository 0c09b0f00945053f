//! Error types module
//!
//! All pipeline failures are unified under `PipelineError`. Per-artifact
//! failures (encode, thumbnail, upload) only degrade the resulting record;
//! the pre-check failures and `Timeout` are fatal for the whole run.

use std::io;
use std::time::Duration;

use crate::models::{Artifact, TranscodeTarget};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected rejections like oversized uploads
    Debug,
    /// Degraded results, a single artifact went missing
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// to whatever surface sits in front of the pipeline.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DURATION_EXCEEDED")
    fn error_code(&self) -> &'static str;

    /// Whether the upload can be retried as-is
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Upload too large: {size} bytes exceeds limit of {limit} bytes")]
    SizeLimitExceeded { size: u64, limit: u64 },

    #[error("Media too long: {duration_secs}s exceeds limit of {limit_secs}s")]
    DurationExceeded { duration_secs: u64, limit_secs: u64 },

    #[error("Unprobable media: {0}")]
    UnprobableMedia(String),

    #[error("Encode to {target} failed: {reason}")]
    EncodeFailure {
        target: TranscodeTarget,
        reason: String,
    },

    #[error("Thumbnail extraction failed: {0}")]
    ThumbnailFailure(String),

    #[error("Upload of {artifact} failed: {reason}")]
    UploadFailure { artifact: Artifact, reason: String },

    #[error("Pipeline timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to persist record: {0}")]
    StorageWriteFailure(String),

    #[error("Source file error: {0}")]
    SourceFile(#[from] io::Error),
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn pipeline_error_static_metadata(
    err: &PipelineError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        PipelineError::SizeLimitExceeded { .. } => (
            413,
            "SIZE_LIMIT_EXCEEDED",
            false,
            Some("Reduce file size and upload again"),
            false,
            LogLevel::Debug,
        ),
        PipelineError::DurationExceeded { .. } => (
            400,
            "DURATION_EXCEEDED",
            false,
            Some("Trim the clip and upload again"),
            false,
            LogLevel::Debug,
        ),
        PipelineError::UnprobableMedia(_) => (
            400,
            "UNPROBABLE_MEDIA",
            false,
            Some("Check media format and try a different file"),
            false,
            LogLevel::Debug,
        ),
        PipelineError::EncodeFailure { .. } => (
            500,
            "ENCODE_FAILURE",
            true,
            Some("Retry the upload"),
            true,
            LogLevel::Warn,
        ),
        PipelineError::ThumbnailFailure(_) => (
            500,
            "THUMBNAIL_FAILURE",
            true,
            Some("Retry the upload"),
            true,
            LogLevel::Warn,
        ),
        PipelineError::UploadFailure { .. } => (
            502,
            "UPLOAD_FAILURE",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        PipelineError::Timeout(_) => (
            504,
            "TIMEOUT",
            true,
            Some("Retry with a shorter clip"),
            false,
            LogLevel::Error,
        ),
        PipelineError::StorageWriteFailure(_) => (
            500,
            "STORAGE_WRITE_FAILURE",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        PipelineError::SourceFile(_) => (
            500,
            "SOURCE_FILE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl PipelineError {
    /// Fatal errors abort the whole run; the rest only leave a record slot empty.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::EncodeFailure { .. }
                | PipelineError::ThumbnailFailure(_)
                | PipelineError::UploadFailure { .. }
        )
    }

    pub fn error_type(&self) -> &str {
        match self {
            PipelineError::SizeLimitExceeded { .. } => "SizeLimitExceeded",
            PipelineError::DurationExceeded { .. } => "DurationExceeded",
            PipelineError::UnprobableMedia(_) => "UnprobableMedia",
            PipelineError::EncodeFailure { .. } => "EncodeFailure",
            PipelineError::ThumbnailFailure(_) => "ThumbnailFailure",
            PipelineError::UploadFailure { .. } => "UploadFailure",
            PipelineError::Timeout(_) => "Timeout",
            PipelineError::StorageWriteFailure(_) => "StorageWriteFailure",
            PipelineError::SourceFile(_) => "SourceFile",
        }
    }
}

impl ErrorMetadata for PipelineError {
    fn http_status_code(&self) -> u16 {
        pipeline_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        pipeline_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        pipeline_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        pipeline_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        pipeline_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        pipeline_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            PipelineError::SizeLimitExceeded { .. }
            | PipelineError::DurationExceeded { .. }
            | PipelineError::Timeout(_) => self.to_string(),
            PipelineError::UnprobableMedia(_) => "Could not read media duration".to_string(),
            PipelineError::EncodeFailure { target, .. } => {
                format!("Failed to encode {} rendition", target)
            }
            PipelineError::ThumbnailFailure(_) => "Failed to create thumbnail".to_string(),
            PipelineError::UploadFailure { artifact, .. } => {
                format!("Failed to store {}", artifact)
            }
            PipelineError::StorageWriteFailure(_) => "Failed to save media record".to_string(),
            PipelineError::SourceFile(_) => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_size_limit() {
        let err = PipelineError::SizeLimitExceeded {
            size: 60,
            limit: 50,
        };
        assert_eq!(err.http_status_code(), 413);
        assert_eq!(err.error_code(), "SIZE_LIMIT_EXCEEDED");
        assert!(!err.is_recoverable());
        assert!(err.client_message().contains("60"));
        assert!(err.client_message().contains("50"));
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_error_metadata_encode_failure() {
        let err = PipelineError::EncodeFailure {
            target: TranscodeTarget::Webm,
            reason: "exit status: 1".to_string(),
        };
        assert_eq!(err.error_code(), "ENCODE_FAILURE");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to encode webm rendition");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Warn);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_error_metadata_timeout() {
        let err = PipelineError::Timeout(Duration::from_secs(600));
        assert_eq!(err.http_status_code(), 504);
        assert!(err.is_fatal());
        assert_eq!(err.error_type(), "Timeout");
    }

    #[test]
    fn test_io_error_converts_to_source_file() {
        let err: PipelineError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, PipelineError::SourceFile(_)));
        assert_eq!(err.client_message(), "Internal server error");
    }
}
