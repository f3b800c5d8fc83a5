//! Error types for the lookout pipeline.

use thiserror::Error;

/// Result type alias using lookout's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lookout operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Feed queue item not found
    #[error("Feed item not found: {0}")]
    FeedItemNotFound(uuid::Uuid),

    /// A run lease is already held for the topic
    #[error("Run already active for topic {topic_id}: {run_id}")]
    RunActive {
        topic_id: uuid::Uuid,
        run_id: uuid::Uuid,
    },

    /// Feed queue error
    #[error("Feed error: {0}")]
    Feed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_feed_item_not_found() {
        let id = Uuid::nil();
        let err = Error::FeedItemNotFound(id);
        assert_eq!(err.to_string(), format!("Feed item not found: {}", id));
    }

    #[test]
    fn test_error_display_run_active() {
        let topic_id = Uuid::nil();
        let run_id = Uuid::nil();
        let err = Error::RunActive { topic_id, run_id };
        assert!(err.to_string().contains("Run already active"));
        assert!(err.to_string().contains(&topic_id.to_string()));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
