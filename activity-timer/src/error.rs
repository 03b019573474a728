use miette::Diagnostic;
use std::convert::Infallible;
use thiserror::Error;

/// Errors returned by activity store and output operations
#[derive(Error, Diagnostic, Debug)]
pub enum ActivityError {
    #[error("Invalid argument: {0}")]
    #[diagnostic(code(activity_timer::invalid_argument))]
    InvalidArgument(String),

    #[error("Activity not found: {0}")]
    #[diagnostic(
        code(activity_timer::not_found),
        help("the activity was never created or has already ended")
    )]
    NotFound(u64),

    #[error("No output handlers registered")]
    #[diagnostic(
        code(activity_timer::no_handlers),
        help("register an output handler or disable output")
    )]
    NoHandlers,

    #[error("Output handler {index} failed: {source}")]
    #[diagnostic(code(activity_timer::handler))]
    Handler {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Activity IDs exhausted")]
    #[diagnostic(code(activity_timer::ids_exhausted))]
    IdsExhausted,
}

impl ActivityError {
    /// Create a new invalid argument error
    pub fn invalid_argument<S: ToString>(reason: S) -> Self {
        Self::InvalidArgument(reason.to_string())
    }
}

// Lets `ActivityMessage` itself be passed where a convertible message is expected.
impl From<Infallible> for ActivityError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// A specialized result type for activity operations
pub type Result<T, E = ActivityError> = std::result::Result<T, E>;
