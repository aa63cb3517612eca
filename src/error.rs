//! Stable error codes shared by services and HTTP responses.

use serde::Serialize;

/// Errors that carry a stable machine-readable code.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// JSON body returned alongside non-2xx statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ErrorBody {
    #[must_use]
    pub fn from_error(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self { code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Gone;

    impl std::fmt::Display for Gone {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "gone")
        }
    }

    impl ErrorCode for Gone {
        fn error_code(&self) -> &'static str {
            "E_GONE"
        }
    }

    #[test]
    fn error_body_copies_code_message_and_default_retryable() {
        let body = ErrorBody::from_error(&Gone);
        assert_eq!(body.code, "E_GONE");
        assert_eq!(body.message, "gone");
        assert!(!body.retryable);
    }

    #[test]
    fn error_body_serializes_flat() {
        let json = serde_json::to_value(ErrorBody::from_error(&Gone)).unwrap();
        assert_eq!(json, serde_json::json!({"code": "E_GONE", "message": "gone", "retryable": false}));
    }
}
