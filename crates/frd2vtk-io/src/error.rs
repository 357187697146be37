//! Error types for frd2vtk-io

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Error, Debug)]
pub enum ConvertError {
    /// Malformed or truncated input record.
    #[error("format error: {0}")]
    Format(String),

    /// An element names a node id never declared in the node block.
    #[error("element {element} references undeclared node {node}")]
    Reference { element: i32, node: i32 },

    /// Element type code with no topology-mapping entry. Fatal for the
    /// whole conversion: dropping the element would corrupt cell counts.
    #[error("unsupported element type {0}")]
    UnsupportedElementType(i32),

    /// I/O failure while emitting one output file.
    #[error("write error for {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    /// I/O failure while reading the input.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "vtkhdf")]
    #[error("HDF5 error: {0}")]
    Hdf5(String),
}

impl ConvertError {
    pub(crate) fn format(line: usize, reason: impl Into<String>) -> Self {
        ConvertError::Format(format!("line {line}: {}", reason.into()))
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConvertError::Write {
            path: path.into(),
            source,
        }
    }
}

#[cfg(feature = "vtkhdf")]
impl From<hdf5::Error> for ConvertError {
    fn from(err: hdf5::Error) -> Self {
        ConvertError::Hdf5(format!("{err}"))
    }
}
