use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("SLACK_USER_TOKEN environment variable not set")]
    MissingToken,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Slack API error: {0}")]
    SlackApi(String),

    #[error("Slack rate limit error: retry after {retry_after_secs}s")]
    SlackRateLimit { retry_after_secs: u64 },

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("failed to write file at {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("invalid link pattern: {0}")]
    InvalidPattern(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_missing_token_display() {
        let err = AppError::MissingToken;
        assert_eq!(
            err.to_string(),
            "SLACK_USER_TOKEN environment variable not set"
        );
    }

    #[test]
    fn test_invalid_config_display() {
        let err = AppError::InvalidConfig("batch size must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "invalid configuration: batch size must be positive"
        );
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: AppError = io_err.into();
        assert!(matches!(err, AppError::Io(_)));
        assert!(err.to_string().starts_with("IO error:"));
    }

    #[test]
    fn test_slack_api_display() {
        let err = AppError::SlackApi("invalid_auth".to_string());
        assert_eq!(err.to_string(), "Slack API error: invalid_auth");
    }

    #[test]
    fn test_slack_rate_limit_display() {
        let err = AppError::SlackRateLimit { retry_after_secs: 30 };
        assert_eq!(err.to_string(), "Slack rate limit error: retry after 30s");
    }

    #[test]
    fn test_write_file_display_and_source() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        let err = AppError::WriteFile {
            path: "/readonly/extracted-links.csv".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("/readonly/extracted-links.csv"));
        assert!(err.to_string().contains("failed to write file"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppError>();
    }
}
