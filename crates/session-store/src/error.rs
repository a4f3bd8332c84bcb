//! Session store errors

use thiserror::Error;

/// Failure reported by a secure random byte source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("secure random source failed: {0}")]
pub struct RandomSourceError(pub String);

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid session ID: {0:?}")]
    InvalidIdentifier(String),

    #[error(transparent)]
    RandomSource(#[from] RandomSourceError),

    #[error("Unable to find unused session ID after {attempts} attempts")]
    ExhaustedAttempts { attempts: u32 },

    #[error("Invalid user descriptor rejected: {0}")]
    InvalidUser(String),

    #[error("Invalid request for replacing user {existing} of session with {attempted}")]
    UserConflict { existing: String, attempted: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl SessionError {
    /// HTTP-style status code the transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            SessionError::InvalidIdentifier(_)
            | SessionError::InvalidUser(_)
            | SessionError::UserConflict { .. } => 400,
            SessionError::RandomSource(_)
            | SessionError::ExhaustedAttempts { .. }
            | SessionError::Config(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(SessionError::InvalidIdentifier("x".into()).status_code(), 400);
        assert!(SessionError::InvalidUser("missing name".into()).is_client_error());
        assert!(SessionError::UserConflict {
            existing: "a".into(),
            attempted: "b".into(),
        }
        .is_client_error());

        let err: SessionError = RandomSourceError("entropy".into()).into();
        assert_eq!(err.status_code(), 500);
        assert!(!SessionError::ExhaustedAttempts { attempts: 3 }.is_client_error());
    }

    #[test]
    fn test_messages() {
        let err = SessionError::ExhaustedAttempts { attempts: 1000 };
        assert_eq!(
            err.to_string(),
            "Unable to find unused session ID after 1000 attempts"
        );

        let err: SessionError = RandomSourceError("no entropy".into()).into();
        assert_eq!(err.to_string(), "secure random source failed: no entropy");
    }
}
