//! Stats error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] scoreboard::PatternError),

    #[error("Scoreboard error: {0}")]
    Scoreboard(#[from] scoreboard::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
