//! Relay Error Types
//!
//! Only registration failures cross the bridge boundary. Notifications with the
//! wrong topic or a missing payload field are ordinary traffic and are dropped
//! without producing an error.

use thiserror::Error;

use crate::relay::source::RegistrationToken;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors reported by a notification source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The caller lacks a permission the source requires
    #[error("permission denied: {permission} is required")]
    PermissionDenied { permission: String },

    /// The source cannot accept registrations right now
    #[error("notification source unavailable: {reason}")]
    Unavailable { reason: String },

    /// The token does not name a live registration
    #[error("unknown registration token: {0}")]
    UnknownToken(RegistrationToken),

    /// Any other source-specific failure
    #[error("notification source error: {message}")]
    Other { message: String },
}

impl SourceError {
    pub fn permission_denied<S: Into<String>>(permission: S) -> Self {
        Self::PermissionDenied {
            permission: permission.into(),
        }
    }

    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// Errors surfaced to callers of the relay
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The notification source rejected the receiver registration
    #[error("failed to register receiver for topic '{topic}': {source}")]
    Registration {
        topic: String,
        #[source]
        source: SourceError,
    },
}

impl RelayError {
    pub fn registration<S: Into<String>>(topic: S, source: SourceError) -> Self {
        Self::Registration {
            topic: topic.into(),
            source,
        }
    }

    /// True when the failure is a missing permission the embedding application can grant
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            RelayError::Registration {
                source: SourceError::PermissionDenied { .. },
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_error_message_names_topic_and_cause() {
        let error = RelayError::registration(
            "com.scanner.BARCODE",
            SourceError::permission_denied("com.scanner.permission.RECEIVE"),
        );

        let message = error.to_string();
        assert!(message.contains("com.scanner.BARCODE"));
        assert!(message.contains("com.scanner.permission.RECEIVE"));
        assert!(error.is_permission_denied());
    }

    #[test]
    fn test_unavailable_is_not_permission_denied() {
        let error = RelayError::registration("t", SourceError::unavailable("bus closed"));
        assert!(!error.is_permission_denied());

        let source = std::error::Error::source(&error).map(|e| e.to_string());
        assert_eq!(
            source.as_deref(),
            Some("notification source unavailable: bus closed")
        );
    }
}
