use thiserror::Error;

/// An error that might occur while aligning deconvolutions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignmentError {
    #[error("Cannot align an empty collection of deconvolutions")]
    EmptyInput,
    #[error("Invalid configuration for {parameter}: {reason}")]
    InvalidConfiguration {
        parameter: &'static str,
        reason: String,
    },
}
