//! Scoreboard error types.

use crate::pattern::PatternError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] PatternError),
}

impl From<Error> for common::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Json(e) => common::Error::Json(e),
            other => common::Error::Generic(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
