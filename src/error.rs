//! Error types exposed at the crate's API seams.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("the session is no longer running")]
    Closed,
}
