//! Error types for impmail

use thiserror::Error;

/// Main error type for impmail
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Preference error: {0}")]
    Prefs(String),

    #[error("Hook not set: {0}")]
    HookNotSet(&'static str),

    #[error("Hook error: {0}")]
    Hook(String),

    #[error("Mailbox error: {0}")]
    Mailbox(String),

    #[error("MDN error: {0}")]
    Mdn(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for impmail
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Prefs(_) => "PREFS_ERROR",
            Error::HookNotSet(_) => "HOOK_NOT_SET",
            Error::Hook(_) => "HOOK_ERROR",
            Error::Mailbox(_) => "MAILBOX_ERROR",
            Error::Mdn(_) => "MDN_ERROR",
            Error::Template(_) => "TEMPLATE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// True when the error only signals that no hook is registered
    pub fn is_hook_not_set(&self) -> bool {
        matches!(self, Error::HookNotSet(_))
    }
}
