use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum NaipError {
    #[error("missing environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid selection: {0}")]
    #[diagnostic(help("expected region/year/resolution/spectrum/grid, e.g. md/2013/1m/rgbir/38077"))]
    InvalidSelection(String),

    #[error("invalid sample count: {0}")]
    #[diagnostic(help("use a non-negative number, -1, or `all`"))]
    InvalidSampleCount(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("s3cmd config {path}: {message}")]
    CredentialFile { path: PathBuf, message: String },

    #[error("refusing object key outside the imagery directory: {0}")]
    UnsafeKey(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("listing failed: {0}")]
    Listing(String),

    #[error("S3 request failed: {0}")]
    S3(String),

    #[error("object not found: s3://{bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("async runtime error: {0}")]
    Runtime(String),
}
