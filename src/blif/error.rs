use thiserror::Error;

/// The result of a BLIF operation.
pub type Result<T> = std::result::Result<T, BlifError>;

/// Error returned when reading a BLIF netlist failed.
#[derive(Debug, Error)]
pub enum BlifError {
    /// All features are not supported (only what technology mappers write back in fact).
    #[error("line {0}: unsupported feature: {1}")]
    UnsupportedFeature(usize, String),

    /// Invalid token, something else was expected.
    #[error("line {0}: invalid token: {1}")]
    InvalidToken(usize, String),

    /// The netlist does not contain the requested model.
    #[error("the netlist does not contain a model `{0}`")]
    MissingModel(String),

    /// An IO error occured while reading the file.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}
