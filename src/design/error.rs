use thiserror::Error;

/// The result of a host circuit operation.
pub type Result<T> = std::result::Result<T, DesignError>;

/// Error returned when editing or querying the host circuit failed.
#[derive(Debug, Error)]
pub enum DesignError {
    /// A wire with the given name already exists in the module.
    #[error("a wire named `{0}` already exists")]
    DuplicateWire(String),

    /// A cell with the given name already exists in the module.
    #[error("a cell named `{0}` already exists")]
    DuplicateCell(String),

    /// No cell with the given name.
    #[error("no cell named `{0}`")]
    UnknownCell(String),

    /// The cell has no connection on that port.
    #[error("cell `{0}` has no port `{1}`")]
    MissingPort(String, String),

    /// The port is connected to a signal of an unexpected width.
    #[error("port `{port}` of cell `{cell}` is {got} bits wide, expected {expected}")]
    PortWidth {
        cell: String,
        port: String,
        expected: usize,
        got: usize,
    },

    /// The two sides of a connection do not have the same width.
    #[error("cannot connect signals of width {0} and {1}")]
    ConnectionWidth(usize, usize),
}
