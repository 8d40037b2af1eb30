use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the image-renamer library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Inference endpoint failure, after any retries
    #[error("Endpoint error: {0}")]
    Endpoint(String),

    /// Model output could not be turned into a valid analysis
    #[error("Response parse error: {0}")]
    Parse(String),

    /// Metadata read/write failure
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Session log read/write failure
    #[error("Session error: {0}")]
    Session(String),

    /// Unknown error
    #[error("Unknown error: {0}")]
    Unknown(String),
}
