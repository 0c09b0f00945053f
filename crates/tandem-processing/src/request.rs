use std::fmt;
use std::pin::Pin;

use tandem_core::FormatPreferences;
use tokio::io::AsyncRead;
use uuid::Uuid;

/// One incoming upload. Lives only for the duration of a single ingest call.
pub struct UploadRequest {
    pub user_id: Uuid,
    /// Declared body length; checked against the media limit before any read.
    pub content_length: u64,
    pub body: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    pub preferences: FormatPreferences,
    pub description: Option<String>,
}

impl UploadRequest {
    pub fn new(
        user_id: Uuid,
        content_length: u64,
        body: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            user_id,
            content_length,
            body: Box::pin(body),
            preferences: FormatPreferences::default(),
            description: None,
        }
    }

    pub fn with_preferences(mut self, preferences: FormatPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("user_id", &self.user_id)
            .field("content_length", &self.content_length)
            .field("preferences", &self.preferences)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
