//! Output writers for the supported visualization formats.
//!
//! Every writer follows the same strict write order, modeled as a small
//! state machine: `Initialized → HeaderWritten → GeometryWritten →
//! DataBlockWritten* → Closed`. Violating the order is a programming
//! error, not an I/O condition, and panics via [`Stage::advance`].
//!
//! Output files are created under a temporary name in the destination
//! directory and renamed into place on success, so a failed write never
//! leaves a half-written file visible under its final name.

use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{ConvertError, Result};

pub mod legacy;
pub mod xml;

#[cfg(feature = "vtkhdf")]
pub mod hdf;

/// Requested target format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Legacy ASCII VTK dataset file
    LegacyVtk,
    /// VTK-XML unstructured grid
    Vtu,
    /// HDF-backed VTK container
    #[cfg(feature = "vtkhdf")]
    VtkHdf,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::LegacyVtk => "vtk",
            OutputFormat::Vtu => "vtu",
            #[cfg(feature = "vtkhdf")]
            OutputFormat::VtkHdf => "vtkhdf",
        }
    }
}

/// Write-order state shared by all writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Initialized,
    HeaderWritten,
    GeometryWritten,
    DataBlockWritten,
    Closed,
}

impl Stage {
    /// Move to `next`, panicking on an out-of-order transition.
    pub(crate) fn advance(&mut self, next: Stage) {
        let legal = match next {
            Stage::Initialized => false,
            Stage::HeaderWritten => *self == Stage::Initialized,
            Stage::GeometryWritten => *self == Stage::HeaderWritten,
            Stage::DataBlockWritten => {
                matches!(*self, Stage::GeometryWritten | Stage::DataBlockWritten)
            }
            Stage::Closed => matches!(*self, Stage::GeometryWritten | Stage::DataBlockWritten),
        };
        assert!(legal, "writer contract violation: {self:?} -> {next:?}");
        *self = next;
    }
}

/// Scoped acquisition of a destination file: writes go to a temporary
/// sibling, [`OutputFile::commit`] renames it into place, and dropping
/// without committing removes the temporary.
pub(crate) struct OutputFile {
    temp: NamedTempFile,
    path: PathBuf,
}

impl OutputFile {
    pub(crate) fn create(path: &Path) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir).map_err(|err| ConvertError::write(path, err))?;
        Ok(Self {
            temp,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn file(&mut self) -> &mut File {
        self.temp.as_file_mut()
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn commit(self) -> Result<()> {
        let path = self.path;
        self.temp
            .persist(&path)
            .map_err(|err| ConvertError::write(path, err.error))?;
        Ok(())
    }
}

/// Counters for non-finite values sanitized to zero, reported once per
/// data block like the original converter does.
#[derive(Debug, Default)]
pub(crate) struct Sanitizer {
    nan: usize,
    inf: usize,
}

impl Sanitizer {
    pub(crate) fn clean(&mut self, value: f64) -> f64 {
        if value.is_nan() {
            self.nan += 1;
            0.0
        } else if value.is_infinite() {
            self.inf += 1;
            0.0
        } else {
            value
        }
    }

    pub(crate) fn report(&self, field: &str) {
        if self.nan > 0 {
            warn!(field, count = self.nan, "NaN values written as 0.0");
        }
        if self.inf > 0 {
            warn!(field, count = self.inf, "Inf values written as 0.0");
        }
    }
}

/// Fixed-format scientific notation (` 1.00000000E+00` style): explicit
/// exponent sign and at least two exponent digits, matching the
/// column-aligned numbers the legacy format readers expect.
pub(crate) fn fmt_e(value: f64) -> String {
    let rendered = format!("{value:.8E}");
    match rendered.split_once('E') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}E{sign}{digits:0>2}")
        }
        None => rendered,
    }
}

/// Zero-filled row for a node a field has no value for.
pub(crate) fn field_row<'a>(
    field: &'a frd2vtk_model::ResultField,
    node: i32,
    zeros: &'a [f64],
) -> &'a [f64] {
    field
        .values
        .get(&node)
        .map(Vec::as_slice)
        .unwrap_or(zeros)
}
