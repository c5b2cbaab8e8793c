use thiserror::Error;

/// Core error type for workflow and activity record handling.
///
/// These errors arise when converting persisted state strings back into
/// the closed enums; the engine itself never produces an invalid state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An invalid workflow state string was encountered during parsing.
    #[error("invalid workflow state: {0}")]
    InvalidWorkflowState(String),

    /// An invalid activity state string was encountered during parsing.
    #[error("invalid activity state: {0}")]
    InvalidActivityState(String),
}

pub type Result<T> = std::result::Result<T, Error>;
