use std::path::PathBuf;

use thiserror::Error;

use crate::blif::BlifError;
use crate::design::DesignError;
use crate::graph::GraphError;

/// The result of a technology mapping operation.
pub type Result<T> = std::result::Result<T, TechmapError>;

/// Error returned when a technology mapping run failed.
#[derive(Debug, Error)]
pub enum TechmapError {
    /// A file of the run directory could not be created, written or read.
    #[error("can't access `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The mapper could not be started at all.
    #[error("can't run `{command}`: {source}")]
    MapperSpawn {
        command: String,
        source: std::io::Error,
    },

    /// The mapper ran but returned a non-zero status.
    #[error("execution of command `{command}` failed: return code {status}")]
    MapperFailed { command: String, status: i32 },

    /// A mapped net name has no counterpart in the module.
    #[error("mapped netlist refers to `{0}`, which has no wire in the module")]
    MissingNet(String),

    /// A `.names` of the mapped netlist has too many inputs to become a LUT.
    #[error("`.names` driving `{0}` has {1} inputs, more than a LUT can have")]
    LutTooWide(String, usize),

    /// Just forwarding a [`DesignError`].
    #[error("{0}")]
    DesignError(#[from] DesignError),

    /// Just forwarding a [`GraphError`].
    #[error("{0}")]
    GraphError(#[from] GraphError),

    /// Just forwarding a [`BlifError`].
    #[error("{0}")]
    BlifError(#[from] BlifError),
}

impl TechmapError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| TechmapError::Io { path, source }
    }
}
