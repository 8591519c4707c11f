use gatherly_core::error::CoreError;
use gatherly_core::wizard::NavigationRejection;

use crate::config::ConfigError;

/// Draft storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid draft key '{0}': only [A-Za-z0-9_-] is allowed")]
    InvalidKey(String),

    #[error("Draft storage I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Injected or backend-specific failure.
    #[error("Draft storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by the event creation backend.
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    /// The backend answered with an error envelope.
    #[error("{message}")]
    Rejected {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    /// The request never produced a usable response.
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected response from events API: {0}")]
    InvalidResponse(String),
}

impl CreateError {
    /// Text shown to the organizer. Backend and network messages pass
    /// through verbatim; `None` when there is nothing readable to show.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } | Self::Transport(message)
                if !message.trim().is_empty() =>
            {
                Some(message)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CreateError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Why a submission did not produce an event.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("A submission is already in progress")]
    AlreadyInFlight,

    #[error("You must be signed in to create events")]
    Unauthenticated,

    /// The terminal-step gate refused the submit.
    #[error("{0}")]
    Blocked(NavigationRejection),

    #[error(transparent)]
    Payload(#[from] CoreError),

    #[error(transparent)]
    Create(#[from] CreateError),
}

/// Errors raised while setting up or driving a session.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type WizardResult<T> = Result<T, WizardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_message_is_verbatim() {
        let err = CreateError::Rejected {
            status: Some(422),
            code: Some("VALIDATION_ERROR".to_string()),
            message: "Venue is closed on that date".to_string(),
        };
        assert_eq!(err.to_string(), "Venue is closed on that date");
        assert_eq!(err.user_message(), Some("Venue is closed on that date"));
    }

    #[test]
    fn blank_or_malformed_errors_have_no_user_message() {
        let blank = CreateError::Rejected {
            status: Some(500),
            code: None,
            message: "  ".to_string(),
        };
        assert_eq!(blank.user_message(), None);
        assert_eq!(CreateError::Transport(String::new()).user_message(), None);
        assert_eq!(
            CreateError::InvalidResponse("missing id".to_string()).user_message(),
            None
        );
    }

    #[test]
    fn transport_message_is_shown() {
        let err = CreateError::Transport("error sending request: connection refused".to_string());
        assert_eq!(
            err.user_message(),
            Some("error sending request: connection refused")
        );
    }

    #[test]
    fn unauthenticated_message() {
        assert_eq!(
            SubmissionError::Unauthenticated.to_string(),
            "You must be signed in to create events"
        );
    }
}
