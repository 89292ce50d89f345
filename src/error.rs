//! Error types shared by the client-side repositories and the session manager.
//!
//! Validation failures are raised before any remote call; provider and store
//! failures carry whatever the hosted collaborator reported.

use thiserror::Error;

/// Minimum accepted password length, counted in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Input rejected locally, before anything is sent to the hosted store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("project name is required")]
    EmptyName,
    #[error("budget '{0}' is not a number")]
    InvalidBudget(String),
    #[error("budget cannot be negative")]
    NegativeBudget,
    #[error("budget must be at most {} with two decimals", crate::stats::MAX_MONEY)]
    BudgetOutOfRange,
    #[error("choose a cost category")]
    CategoryRequired,
    #[error("amount '{0}' is not a number")]
    InvalidAmount(String),
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("amount must be at most {} with two decimals", crate::stats::MAX_MONEY)]
    AmountOutOfRange,
    #[error("description is required")]
    EmptyDescription,
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("verification token is required")]
    EmptyToken,
}

/// Failure reported by the identity provider contract.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("identity provider unreachable: {0}")]
    Transport(String),
    #[error("{message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
}

impl ProviderError {
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => Some(code),
            Self::Transport(_) => None,
        }
    }
}

/// Failure reported by the data store contract.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("data store unreachable: {0}")]
    Transport(String),
    #[error("{message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
    #[error("unexpected data store response: {0}")]
    Decode(String),
}

/// Everything a repository or the session manager can hand back to the view layer.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("email address not confirmed yet; use the link from the confirmation email")]
    EmailNotConfirmed,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("not signed in")]
    NotSignedIn,
    #[error("session changed before the response arrived")]
    SessionChanged,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("data access failed: {0}")]
    DataAccess(#[from] StoreError),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err.code() {
            Some("email_not_confirmed") => Error::EmailNotConfirmed,
            Some("invalid_credentials") => Error::InvalidCredentials,
            _ => Error::Auth(err.to_string()),
        }
    }
}
