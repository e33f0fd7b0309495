use burn::{config::ConfigError, record::RecorderError};

/// Error returned by the fallible steps of the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to record model: {0}")]
    Recorder(#[from] RecorderError),
    #[error("invalid training config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
    #[error("cannot evaluate on an empty dataset")]
    EmptyDataset,
}
