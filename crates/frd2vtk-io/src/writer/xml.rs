//! VTK-XML unstructured grid writer (`.vtu`) and the time-series
//! collection file (`.pvd`).
//!
//! Payloads are either inline ASCII text or an appended raw binary
//! section (`header_type="UInt64"`, little-endian). Appended offsets
//! are assigned in array declaration order, so the byte buffer and the
//! declared offsets stay consistent by construction.

use std::io::{self, Write};

use frd2vtk_model::ResultField;
use tracing::warn;

use crate::topology::Grid;
use crate::writer::{field_row, Sanitizer, Stage};

/// Payload encoding for `.vtu` DataArrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VtuEncoding {
    /// Inline ASCII values
    #[default]
    Ascii,
    /// Appended raw binary section
    AppendedRaw,
}

pub struct VtuWriter<W: Write> {
    out: W,
    stage: Stage,
    encoding: VtuEncoding,
    appended: Vec<u8>,
    point_data_open: bool,
}

impl<W: Write> VtuWriter<W> {
    pub fn new(out: W, encoding: VtuEncoding) -> Self {
        Self {
            out,
            stage: Stage::Initialized,
            encoding,
            appended: Vec::new(),
            point_data_open: false,
        }
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        self.stage.advance(Stage::HeaderWritten);
        writeln!(self.out, "<?xml version=\"1.0\"?>")?;
        writeln!(
            self.out,
            "<VTKFile type=\"UnstructuredGrid\" version=\"1.0\" \
             byte_order=\"LittleEndian\" header_type=\"UInt64\">"
        )?;
        writeln!(self.out, "  <UnstructuredGrid>")?;
        Ok(())
    }

    pub fn write_geometry(&mut self, grid: &Grid) -> io::Result<()> {
        self.stage.advance(Stage::GeometryWritten);
        writeln!(
            self.out,
            "    <Piece NumberOfPoints=\"{}\" NumberOfCells=\"{}\">",
            grid.points.len(),
            grid.cells.len()
        )?;

        writeln!(self.out, "      <Points>")?;
        let coords: Vec<f64> = grid.points.iter().flatten().copied().collect();
        self.f64_array(None, 3, &coords)?;
        writeln!(self.out, "      </Points>")?;

        writeln!(self.out, "      <Cells>")?;
        let connectivity: Vec<i64> = grid
            .cells
            .iter()
            .flat_map(|c| c.connectivity.iter().map(|&i| i as i64))
            .collect();
        self.i64_array("connectivity", &connectivity)?;
        let mut offsets = Vec::with_capacity(grid.cells.len());
        let mut running = 0i64;
        for cell in &grid.cells {
            running += cell.connectivity.len() as i64;
            offsets.push(running);
        }
        self.i64_array("offsets", &offsets)?;
        let types: Vec<u8> = grid.cells.iter().map(|c| c.cell_type as u8).collect();
        self.u8_array("types", &types)?;
        writeln!(self.out, "      </Cells>")?;
        Ok(())
    }

    /// Write one field as a PointData array; rows for nodes the field
    /// does not cover are zero-filled, non-finite values become zero.
    pub fn write_field(&mut self, grid: &Grid, field: &ResultField) -> io::Result<()> {
        if field.components.is_empty() || field.values.is_empty() {
            warn!(field = %field.name, "no data for this increment, array skipped");
            return Ok(());
        }
        self.stage.advance(Stage::DataBlockWritten);
        if !self.point_data_open {
            writeln!(self.out, "      <PointData>")?;
            self.point_data_open = true;
        }

        let ncomps = field.ncomps();
        let zeros = vec![0.0f64; ncomps];
        let mut sanitizer = Sanitizer::default();
        let mut data = Vec::with_capacity(grid.point_ids.len() * ncomps);
        for &node in &grid.point_ids {
            for &value in field_row(field, node, &zeros) {
                data.push(sanitizer.clean(value));
            }
        }
        self.f64_array(Some(&field.name), ncomps, &data)?;
        sanitizer.report(&field.name);
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.stage.advance(Stage::Closed);
        if self.point_data_open {
            writeln!(self.out, "      </PointData>")?;
        }
        writeln!(self.out, "    </Piece>")?;
        writeln!(self.out, "  </UnstructuredGrid>")?;
        if self.encoding == VtuEncoding::AppendedRaw {
            writeln!(self.out, "  <AppendedData encoding=\"raw\">")?;
            self.out.write_all(b"   _")?;
            self.out.write_all(&self.appended)?;
            writeln!(self.out)?;
            writeln!(self.out, "  </AppendedData>")?;
        }
        writeln!(self.out, "</VTKFile>")?;
        self.out.flush()?;
        Ok(self.out)
    }

    fn open_tag(vtk_type: &str, name: Option<&str>, ncomps: usize) -> String {
        let mut tag = format!("        <DataArray type=\"{vtk_type}\"");
        if let Some(name) = name {
            tag.push_str(&format!(" Name=\"{name}\""));
        }
        if ncomps > 1 {
            tag.push_str(&format!(" NumberOfComponents=\"{ncomps}\""));
        }
        tag
    }

    fn append_block(&mut self, payload: &[u8]) -> u64 {
        let offset = self.appended.len() as u64;
        self.appended
            .extend_from_slice(&(payload.len() as u64).to_le_bytes());
        self.appended.extend_from_slice(payload);
        offset
    }

    fn f64_array(&mut self, name: Option<&str>, ncomps: usize, data: &[f64]) -> io::Result<()> {
        let tag = Self::open_tag("Float64", name, ncomps);
        match self.encoding {
            VtuEncoding::Ascii => {
                writeln!(self.out, "{tag} format=\"ascii\">")?;
                for chunk in data.chunks(ncomps.max(1)) {
                    write!(self.out, "         ")?;
                    for value in chunk {
                        write!(self.out, " {value:e}")?;
                    }
                    writeln!(self.out)?;
                }
                writeln!(self.out, "        </DataArray>")?;
            }
            VtuEncoding::AppendedRaw => {
                let mut payload = Vec::with_capacity(data.len() * 8);
                for value in data {
                    payload.extend_from_slice(&value.to_le_bytes());
                }
                let offset = self.append_block(&payload);
                writeln!(self.out, "{tag} format=\"appended\" offset=\"{offset}\"/>")?;
            }
        }
        Ok(())
    }

    fn i64_array(&mut self, name: &str, data: &[i64]) -> io::Result<()> {
        let tag = Self::open_tag("Int64", Some(name), 1);
        match self.encoding {
            VtuEncoding::Ascii => {
                writeln!(self.out, "{tag} format=\"ascii\">")?;
                write!(self.out, "         ")?;
                for value in data {
                    write!(self.out, " {value}")?;
                }
                writeln!(self.out)?;
                writeln!(self.out, "        </DataArray>")?;
            }
            VtuEncoding::AppendedRaw => {
                let mut payload = Vec::with_capacity(data.len() * 8);
                for value in data {
                    payload.extend_from_slice(&value.to_le_bytes());
                }
                let offset = self.append_block(&payload);
                writeln!(self.out, "{tag} format=\"appended\" offset=\"{offset}\"/>")?;
            }
        }
        Ok(())
    }

    fn u8_array(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        let tag = Self::open_tag("UInt8", Some(name), 1);
        match self.encoding {
            VtuEncoding::Ascii => {
                writeln!(self.out, "{tag} format=\"ascii\">")?;
                write!(self.out, "         ")?;
                for value in data {
                    write!(self.out, " {value}")?;
                }
                writeln!(self.out)?;
                writeln!(self.out, "        </DataArray>")?;
            }
            VtuEncoding::AppendedRaw => {
                let offset = self.append_block(data);
                writeln!(self.out, "{tag} format=\"appended\" offset=\"{offset}\"/>")?;
            }
        }
        Ok(())
    }
}

/// One dataset reference in a `.pvd` collection.
#[derive(Debug, Clone, PartialEq)]
pub struct PvdEntry {
    pub time: f64,
    pub file: String,
}

/// Write a ParaView collection file listing one `.vtu` per step with
/// its time value, enabling time-series playback.
pub fn write_pvd<W: Write>(mut out: W, entries: &[PvdEntry]) -> io::Result<()> {
    writeln!(out, "<?xml version=\"1.0\"?>")?;
    writeln!(
        out,
        "<VTKFile type=\"Collection\" version=\"0.1\" byte_order=\"LittleEndian\">"
    )?;
    writeln!(out, "  <Collection>")?;
    for entry in entries {
        writeln!(
            out,
            "    <DataSet timestep=\"{:e}\" group=\"\" part=\"0\" file=\"{}\"/>",
            entry.time, entry.file
        )?;
    }
    writeln!(out, "  </Collection>")?;
    writeln!(out, "</VTKFile>")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Cell, VtkCellType};

    fn tet_grid() -> Grid {
        Grid {
            point_ids: vec![1, 2, 3, 4],
            points: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            cells: vec![Cell {
                cell_type: VtkCellType::Tetra,
                connectivity: vec![0, 1, 2, 3],
            }],
        }
    }

    fn disp_field() -> ResultField {
        let mut field = ResultField::new("DISP", 1, 1.0);
        field.components = vec!["D1".into(), "D2".into(), "D3".into()];
        for node in 1..=4 {
            field.values.insert(node, vec![node as f64, 0.0, 0.0]);
        }
        field
    }

    fn write(encoding: VtuEncoding) -> Vec<u8> {
        let grid = tet_grid();
        let mut writer = VtuWriter::new(Vec::new(), encoding);
        writer.write_header().expect("header");
        writer.write_geometry(&grid).expect("geometry");
        writer.write_field(&grid, &disp_field()).expect("field");
        writer.finish().expect("finish")
    }

    #[test]
    fn ascii_output_has_expected_structure() {
        let text = String::from_utf8(write(VtuEncoding::Ascii)).expect("UTF-8");
        assert!(text.contains("<Piece NumberOfPoints=\"4\" NumberOfCells=\"1\">"));
        assert!(text.contains("Name=\"connectivity\""));
        assert!(text.contains("Name=\"offsets\""));
        assert!(text.contains("Name=\"types\""));
        assert!(text.contains("Name=\"DISP\" NumberOfComponents=\"3\""));
        assert!(text.contains("</VTKFile>"));
        assert!(!text.contains("AppendedData"));
    }

    #[test]
    fn appended_output_declares_monotonic_offsets() {
        let bytes = write(VtuEncoding::AppendedRaw);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("<AppendedData encoding=\"raw\">"));
        let offsets: Vec<u64> = text
            .match_indices("offset=\"")
            .map(|(at, _)| {
                let rest = &text[at + 8..];
                let end = rest.find('"').expect("closing quote");
                rest[..end].parse().expect("offset is numeric")
            })
            .collect();
        assert_eq!(offsets.len(), 5); // points, connectivity, offsets, types, DISP
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        // points block: u64 length prefix of 4 * 3 * 8 bytes
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[1], 8 + 96);
    }

    #[test]
    fn empty_step_produces_piece_without_point_data() {
        let grid = tet_grid();
        let mut writer = VtuWriter::new(Vec::new(), VtuEncoding::Ascii);
        writer.write_header().expect("header");
        writer.write_geometry(&grid).expect("geometry");
        let text = String::from_utf8(writer.finish().expect("finish")).expect("UTF-8");
        assert!(!text.contains("<PointData>"));
        assert!(text.contains("</Piece>"));
    }

    #[test]
    fn pvd_lists_every_step_with_time() {
        let entries = vec![
            PvdEntry {
                time: 0.1,
                file: "job.1.vtu".into(),
            },
            PvdEntry {
                time: 0.2,
                file: "job.2.vtu".into(),
            },
        ];
        let mut out = Vec::new();
        write_pvd(&mut out, &entries).expect("pvd");
        let text = String::from_utf8(out).expect("UTF-8");
        assert!(text.contains("type=\"Collection\""));
        assert!(text.contains("file=\"job.1.vtu\""));
        assert!(text.contains("file=\"job.2.vtu\""));
        assert_eq!(text.matches("<DataSet").count(), 2);
    }

    #[test]
    #[should_panic(expected = "writer contract violation")]
    fn geometry_before_header_panics() {
        let mut writer = VtuWriter::new(Vec::new(), VtuEncoding::Ascii);
        let _ = writer.write_geometry(&tet_grid());
    }
}
