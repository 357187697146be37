//! Conversion pipeline: one input file, one sequential pass.
//!
//! The scanner is exhausted before planning (reconciliation needs the
//! full record-count statistics), and each step's writer reaches its
//! closed state before the next step begins. Nothing is shared between
//! step writes; converting independent inputs concurrently is a caller
//! concern.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::builder::read_frd;
use crate::error::{ConvertError, Result};
use crate::planner::{Plan, Step};
use crate::topology::Grid;
use crate::writer::legacy::LegacyVtkWriter;
use crate::writer::xml::{write_pvd, PvdEntry, VtuEncoding, VtuWriter};
use crate::writer::{OutputFile, OutputFormat};

/// Caller-supplied conversion settings.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Target formats, one set of output files per format
    pub formats: Vec<OutputFormat>,
    /// Exclude the solver's ERROR field from the output (its record
    /// counts still feed node-count reconciliation)
    pub skip_error_fields: bool,
    /// Payload encoding for `.vtu` output
    pub vtu_encoding: VtuEncoding,
    /// Destination directory; defaults to the input's directory
    pub output_dir: Option<PathBuf>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Vtu],
            skip_error_fields: true,
            vtu_encoding: VtuEncoding::default(),
            output_dir: None,
        }
    }
}

/// Summary of one completed conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub node_count: usize,
    pub cell_count: usize,
    pub step_count: usize,
    pub files: Vec<PathBuf>,
}

impl ConversionReport {
    /// Write the report as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(path, bytes).map_err(|err| ConvertError::write(path, err))
    }
}

/// Convert one `.frd` file into every requested format.
///
/// Parse and topology errors abort before any output file is created;
/// a write error aborts the file being written (its temporary is
/// removed, earlier completed files remain).
pub fn convert_file(input: &Path, options: &ConvertOptions) -> Result<ConversionReport> {
    let reader = BufReader::new(File::open(input)?);
    let (mesh, fields) = read_frd(reader)?;
    let plan = Plan::build(&mesh, &fields, options.skip_error_fields);
    info!(
        input = %input.display(),
        nodes = plan.node_count,
        cells = mesh.element_count(),
        steps = plan.steps.len(),
        "parsed result file"
    );
    let grid = Grid::build(&mesh, plan.node_count)?;

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let dir = match &options.output_dir {
        Some(dir) => dir.clone(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };

    let mut files = Vec::new();
    for &format in &options.formats {
        match format {
            OutputFormat::LegacyVtk => {
                for step in &plan.steps {
                    let path = dir.join(plan.output_name(stem, step, format.extension()));
                    write_legacy_file(&path, &grid, step)?;
                    info!(file = %path.display(), step = step.index, "wrote legacy VTK");
                    files.push(path);
                }
            }
            OutputFormat::Vtu => {
                let mut entries = Vec::new();
                for step in &plan.steps {
                    let name = plan.output_name(stem, step, format.extension());
                    let path = dir.join(&name);
                    write_vtu_file(&path, &grid, step, options.vtu_encoding)?;
                    info!(file = %path.display(), step = step.index, "wrote VTU");
                    entries.push(PvdEntry {
                        time: step.time,
                        file: name,
                    });
                    files.push(path);
                }
                if entries.len() > 1 {
                    let path = dir.join(format!("{stem}.pvd"));
                    write_pvd_file(&path, &entries)?;
                    info!(file = %path.display(), "wrote PVD collection");
                    files.push(path);
                }
            }
            #[cfg(feature = "vtkhdf")]
            OutputFormat::VtkHdf => {
                for step in &plan.steps {
                    let path = dir.join(plan.output_name(stem, step, format.extension()));
                    crate::writer::hdf::write_vtkhdf(&path, &grid, &step.fields)?;
                    info!(file = %path.display(), step = step.index, "wrote VTKHDF");
                    files.push(path);
                }
            }
        }
    }

    Ok(ConversionReport {
        input: input.to_path_buf(),
        node_count: grid.points.len(),
        cell_count: grid.cells.len(),
        step_count: plan.steps.len(),
        files,
    })
}

fn write_legacy_file(path: &Path, grid: &Grid, step: &Step<'_>) -> Result<()> {
    let mut out = OutputFile::create(path)?;
    write_legacy_step(BufWriter::new(out.file()), grid, step)
        .map_err(|err| ConvertError::write(out.path(), err))?;
    out.commit()
}

fn write_legacy_step<W: Write>(out: W, grid: &Grid, step: &Step<'_>) -> io::Result<()> {
    let mut writer = LegacyVtkWriter::new(out);
    writer.write_header("Converted CalculiX results")?;
    writer.write_geometry(grid)?;
    for &field in &step.fields {
        writer.write_field(grid, field)?;
    }
    writer.finish()?;
    Ok(())
}

fn write_vtu_file(path: &Path, grid: &Grid, step: &Step<'_>, encoding: VtuEncoding) -> Result<()> {
    let mut out = OutputFile::create(path)?;
    write_vtu_step(BufWriter::new(out.file()), grid, step, encoding)
        .map_err(|err| ConvertError::write(out.path(), err))?;
    out.commit()
}

fn write_vtu_step<W: Write>(
    out: W,
    grid: &Grid,
    step: &Step<'_>,
    encoding: VtuEncoding,
) -> io::Result<()> {
    let mut writer = VtuWriter::new(out, encoding);
    writer.write_header()?;
    writer.write_geometry(grid)?;
    for &field in &step.fields {
        writer.write_field(grid, field)?;
    }
    writer.finish()?;
    Ok(())
}

fn write_pvd_file(path: &Path, entries: &[PvdEntry]) -> Result<()> {
    let mut out = OutputFile::create(path)?;
    write_pvd(BufWriter::new(out.file()), entries)
        .map_err(|err| ConvertError::write(out.path(), err))?;
    out.commit()
}
