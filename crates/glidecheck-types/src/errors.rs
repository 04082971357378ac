use thiserror::Error;

pub type Result<T, E = GlideError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum GlideError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("media error: {0}")]
    Media(String),
    #[error("vision error: {0}")]
    Vision(String),
    #[error("narrator error: {0}")]
    Narrator(String),
    #[error("pipeline error: {0}")]
    Pipeline(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
