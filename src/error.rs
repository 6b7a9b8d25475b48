//! Error types for cellhost.

use thiserror::Error;

/// Errors surfaced synchronously by the cell API.
///
/// Session-level failures (a script raising mid-run, or a session
/// superseded by a newer activation) are not errors in this sense:
/// they are reported as a [`SessionOutcome`](crate::cell::SessionOutcome)
/// to whoever awaits the session, and never unwind into the host's
/// call stack.
#[derive(Error, Debug)]
pub enum CellError {
    /// A script failed to compile or bind against the scope list.
    /// `index` is the position of the first offending script in the
    /// sequence passed to `set_scripts`.
    #[error("script {index} failed to compile: {message}")]
    Compile { index: usize, message: String },

    /// Invalid construction argument, e.g. a host scope binding whose
    /// name is not a valid identifier.
    #[error("invalid construction argument: {0}")]
    Construction(String),
}

pub type Result<T> = std::result::Result<T, CellError>;
