use thiserror::Error;

/// Failure taxonomy for loan operations. Every failure is terminal for the
/// triggering request — nothing here is retried internally.
#[derive(Debug, Error)]
pub enum LendingError {
    #[error("authentication required")]
    Unauthorized,

    /// Valid actor, wrong role or not a party to the target loan.
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    ValidationFailed(String),

    /// A concurrent mutation invalidated this update; the caller may re-read
    /// and decide whether to try again.
    #[error("{0}")]
    Conflict(&'static str),

    #[error("store failure")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LendingError>;
