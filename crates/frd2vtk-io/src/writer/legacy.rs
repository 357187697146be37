//! Legacy ASCII VTK dataset writer.
//!
//! Layout per the VTK file-formats specification, version 3.0: header,
//! POINTS, CELLS + CELL_TYPES, then POINT_DATA blocks. Numbers use
//! fixed-format scientific notation so repeated conversions are
//! byte-identical.

use std::io::{self, Write};

use frd2vtk_model::ResultField;
use tracing::warn;

use crate::topology::Grid;
use crate::writer::{field_row, fmt_e, Sanitizer, Stage};

pub struct LegacyVtkWriter<W: Write> {
    out: W,
    stage: Stage,
    point_count: usize,
}

impl<W: Write> LegacyVtkWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            stage: Stage::Initialized,
            point_count: 0,
        }
    }

    pub fn write_header(&mut self, title: &str) -> io::Result<()> {
        self.stage.advance(Stage::HeaderWritten);
        writeln!(self.out, "# vtk DataFile Version 3.0")?;
        writeln!(self.out, "{title}")?;
        writeln!(self.out, "ASCII")?;
        writeln!(self.out, "DATASET UNSTRUCTURED_GRID")?;
        Ok(())
    }

    pub fn write_geometry(&mut self, grid: &Grid) -> io::Result<()> {
        self.stage.advance(Stage::GeometryWritten);
        self.point_count = grid.points.len();

        writeln!(self.out, "POINTS {} double", grid.points.len())?;
        for point in &grid.points {
            writeln!(
                self.out,
                "{:>15}{:>15}{:>15}",
                fmt_e(point[0]),
                fmt_e(point[1]),
                fmt_e(point[2])
            )?;
        }

        writeln!(
            self.out,
            "CELLS {} {}",
            grid.cells.len(),
            grid.cells.len() + grid.connectivity_len()
        )?;
        for cell in &grid.cells {
            write!(self.out, "{}", cell.connectivity.len())?;
            for &index in &cell.connectivity {
                write!(self.out, " {index}")?;
            }
            writeln!(self.out)?;
        }

        writeln!(self.out, "CELL_TYPES {}", grid.cells.len())?;
        for cell in &grid.cells {
            writeln!(self.out, "{}", cell.cell_type as i32)?;
        }
        Ok(())
    }

    /// Write one field as a POINT_DATA block. The semantic kind follows
    /// the component count: 1 scalar, 3 vector, 6 tensor (Voigt order
    /// expanded to the full 3×3), anything else a generic FIELD array.
    pub fn write_field(&mut self, grid: &Grid, field: &ResultField) -> io::Result<()> {
        if field.components.is_empty() || field.values.is_empty() {
            warn!(field = %field.name, "no data for this increment, block skipped");
            return Ok(());
        }
        let first_block = self.stage == Stage::GeometryWritten;
        self.stage.advance(Stage::DataBlockWritten);
        if first_block {
            writeln!(self.out, "POINT_DATA {}", self.point_count)?;
        }

        let ncomps = field.ncomps();
        let zeros = vec![0.0f64; ncomps];
        let mut sanitizer = Sanitizer::default();
        let mut missing = 0usize;

        match ncomps {
            1 => {
                writeln!(self.out, "SCALARS {} double 1", field.name)?;
                writeln!(self.out, "LOOKUP_TABLE default")?;
            }
            3 => writeln!(self.out, "VECTORS {} double", field.name)?,
            6 => writeln!(self.out, "TENSORS {} double", field.name)?,
            n => {
                writeln!(self.out, "FIELD {} 1", field.name)?;
                writeln!(
                    self.out,
                    "{} {} {} double",
                    field.name, n, self.point_count
                )?;
            }
        }

        for &node in &grid.point_ids {
            if !field.values.contains_key(&node) {
                missing += 1;
            }
            let row = field_row(field, node, &zeros);
            if ncomps == 6 {
                // Voigt (xx, yy, zz, xy, yz, zx) to full rows
                let mut t = |i: usize| sanitizer.clean(row[i]);
                let full = [
                    [t(0), t(3), t(5)],
                    [t(3), t(1), t(4)],
                    [t(5), t(4), t(2)],
                ];
                for tensor_row in full {
                    for value in tensor_row {
                        write!(self.out, "{:>15}", fmt_e(value))?;
                    }
                    writeln!(self.out)?;
                }
                writeln!(self.out)?;
            } else {
                for &value in row {
                    write!(self.out, "{:>15}", fmt_e(sanitizer.clean(value)))?;
                }
                writeln!(self.out)?;
            }
        }

        if missing > 0 {
            warn!(
                field = %field.name,
                missing,
                "field covers a node subset, gaps written as zeros"
            );
        }
        sanitizer.report(&field.name);
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.stage.advance(Stage::Closed);
        self.out.flush()?;
        Ok(self.out)
    }
}
