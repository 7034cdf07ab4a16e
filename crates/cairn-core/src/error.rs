use thiserror::Error;

/// Configuration errors are raised before any network or filesystem call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("watermark removal cannot be combined with comment updates; the watermark is what identifies the comment to update")]
    WatermarkRequiredForUpdate,
    #[error("comment target '{0}' is not of the form 'commit/<sha>' or 'pr/<id>'")]
    MalformedTarget(String),
}
