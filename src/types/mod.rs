use thiserror::Error;

mod domain_types;

pub use domain_types::*;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Empty required field: {0}")]
    EmptyField(&'static str),

    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid sheet name: {name} - {reason}")]
    InvalidSheetName { name: String, reason: String },

    #[error("Invalid file prefix: {prefix} - {reason}")]
    InvalidFilePrefix { prefix: String, reason: String },

    #[error("Invalid file extension: {extension}")]
    InvalidExtension { extension: String },

    #[error("Unsupported character encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Recipient list must contain at least one recipient")]
    NoRecipients,

    #[error("Value out of bounds: {value}, expected {min}..={max}")]
    OutOfBounds { value: u64, min: u64, max: u64 },

    #[error("Invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
