//! Error type for the regalo store and bootstrap layer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the root folder or reading `regalo.toml`
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unparseable `regalo.toml`
    #[error("Configuration error: {0}")]
    Config(String),

    /// Phrase catalog rejected before seeding
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// A row the store just wrote could not be read back
    #[error("Store inconsistency: {0}")]
    Inconsistent(String),
}
