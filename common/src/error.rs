use thiserror::Error;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Region query error: {0}")]
    RegionQuery(String),
    #[error("Query pattern error: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}
