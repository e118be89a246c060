use thiserror::Error;

/// Result type alias used across every store and coordination operation.
pub type Result<T> = std::result::Result<T, HowellError>;

/// Error taxonomy for the coordination engine (spec.md §7). Each variant
/// maps to an HTTP status code via [`HowellError::status_code`]; none of
/// them carry a stack trace, only a short free-text message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HowellError {
    /// Named entity/task/handoff/agent/instance absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing required field, unknown template, invalid category or
    /// priority, malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Claim races, scope overlap, already-claimed handoff, rename to an
    /// existing name.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Shared-secret or webhook HMAC check failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// An outbound call to an external collaborator failed or timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// A durable store's primary file is unreadable and its backup is
    /// also unreadable; the store was reset to empty rather than
    /// crashing the daemon.
    #[error("store corrupt: {0}")]
    CorruptStore(String),

    /// Anything else: an uncaught failure in a handler.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HowellError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn invalid_argument(what: impl std::fmt::Display) -> Self {
        Self::InvalidArgument(what.to_string())
    }

    pub fn conflict(what: impl std::fmt::Display) -> Self {
        Self::Conflict(what.to_string())
    }

    pub fn unauthorized(what: impl std::fmt::Display) -> Self {
        Self::Unauthorized(what.to_string())
    }

    pub fn transport(what: impl std::fmt::Display) -> Self {
        Self::Transport(what.to_string())
    }

    pub fn corrupt_store(what: impl std::fmt::Display) -> Self {
        Self::CorruptStore(what.to_string())
    }

    pub fn internal(what: impl std::fmt::Display) -> Self {
        Self::Internal(what.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HowellError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, HowellError::Conflict(_))
    }

    /// The kind name as used in the `{error: "<kind>: message"}` body.
    pub fn kind(&self) -> &'static str {
        match self {
            HowellError::NotFound(_) => "NotFound",
            HowellError::InvalidArgument(_) => "InvalidArgument",
            HowellError::Conflict(_) => "Conflict",
            HowellError::Unauthorized(_) => "Unauthorized",
            HowellError::Transport(_) => "TransportError",
            HowellError::CorruptStore(_) => "CorruptStore",
            HowellError::Internal(_) => "Internal",
        }
    }

    /// HTTP status code equivalent (spec.md §7).
    pub fn status_code(&self) -> u16 {
        match self {
            HowellError::NotFound(_) => 404,
            HowellError::InvalidArgument(_) => 400,
            HowellError::Conflict(_) => 409,
            HowellError::Unauthorized(_) => 401,
            HowellError::Transport(_) => 500,
            HowellError::CorruptStore(_) => 500,
            HowellError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_spec() {
        assert_eq!(HowellError::not_found("task").status_code(), 404);
        assert_eq!(HowellError::invalid_argument("x").status_code(), 400);
        assert_eq!(HowellError::conflict("x").status_code(), 409);
        assert_eq!(HowellError::unauthorized("x").status_code(), 401);
        assert_eq!(HowellError::internal("x").status_code(), 500);
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(HowellError::not_found("x").kind(), "NotFound");
        assert_eq!(HowellError::conflict("x").kind(), "Conflict");
    }

    #[test]
    fn predicates() {
        assert!(HowellError::not_found("x").is_not_found());
        assert!(!HowellError::conflict("x").is_not_found());
        assert!(HowellError::conflict("x").is_conflict());
    }
}
