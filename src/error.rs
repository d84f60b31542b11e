//! Error types for the conversion pipeline.
//!
//! Every variant is terminal for the current request; nothing is retried at
//! this layer. Soft encoder rejections never surface here, they are folded
//! into the boolean result of `Convertor::convert_if_needed`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertorError {
    /// Conversion is disabled, or image creation is disallowed in read-only mode.
    #[error("WebP conversion is not enabled")]
    NotEnabled,

    #[error("the mimetype \"{0}\" is not supported")]
    UnsupportedMimetype(String),

    #[error("source image does not exist: {0}")]
    SourceMissing(PathBuf),

    /// The encoder rejected the input and no previously generated file exists.
    #[error("WebP path \"{0}\" does not exist after conversion")]
    ConversionMissing(PathBuf),

    /// Hard encoder failure, wraps the underlying message and the target path.
    #[error("{target}: {message}")]
    ConversionFailed { target: PathBuf, message: String },

    #[error("invalid convertor configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, ConvertorError>;
