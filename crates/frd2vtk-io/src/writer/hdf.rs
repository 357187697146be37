//! VTKHDF unstructured grid writer (requires the `vtkhdf` feature).
//!
//! Emits the `/VTKHDF` group layout ParaView reads natively:
//! Version/Type attributes, point and cell datasets, and one PointData
//! dataset per field. Like the other writers, the file is built under a
//! temporary name and renamed into place on success.

use std::fs;
use std::path::Path;

use frd2vtk_model::ResultField;
use hdf5::types::VarLenUnicode;

use crate::error::{ConvertError, Result};
use crate::topology::Grid;
use crate::writer::Sanitizer;

pub fn write_vtkhdf(path: &Path, grid: &Grid, fields: &[&ResultField]) -> Result<()> {
    let temp = path.with_extension("vtkhdf.part");
    match build_file(&temp, grid, fields) {
        Ok(()) => {
            fs::rename(&temp, path).map_err(|err| ConvertError::write(path, err))?;
            Ok(())
        }
        Err(err) => {
            let _ = fs::remove_file(&temp);
            Err(err)
        }
    }
}

fn build_file(path: &Path, grid: &Grid, fields: &[&ResultField]) -> Result<()> {
    let file = hdf5::File::create(path)?;
    let root = file.create_group("VTKHDF")?;

    root.new_attr::<i64>()
        .shape(2)
        .create("Version")?
        .write(&[2i64, 0])?;
    let grid_type: VarLenUnicode = "UnstructuredGrid"
        .parse()
        .map_err(|_| ConvertError::Hdf5("invalid Type attribute".to_string()))?;
    root.new_attr::<VarLenUnicode>()
        .create("Type")?
        .write_scalar(&grid_type)?;

    let point_count = grid.points.len();
    root.new_dataset_builder()
        .with_data(&[point_count as i64])
        .create("NumberOfPoints")?;
    let coords: Vec<f64> = grid.points.iter().flatten().copied().collect();
    let points = root
        .new_dataset::<f64>()
        .shape([point_count, 3])
        .create("Points")?;
    points.write_raw(&coords)?;

    let connectivity: Vec<i64> = grid
        .cells
        .iter()
        .flat_map(|c| c.connectivity.iter().map(|&i| i as i64))
        .collect();
    root.new_dataset_builder()
        .with_data(&[grid.cells.len() as i64])
        .create("NumberOfCells")?;
    root.new_dataset_builder()
        .with_data(&[connectivity.len() as i64])
        .create("NumberOfConnectivityIds")?;
    root.new_dataset_builder()
        .with_data(&connectivity)
        .create("Connectivity")?;

    let mut offsets = Vec::with_capacity(grid.cells.len() + 1);
    offsets.push(0i64);
    let mut running = 0i64;
    for cell in &grid.cells {
        running += cell.connectivity.len() as i64;
        offsets.push(running);
    }
    root.new_dataset_builder()
        .with_data(&offsets)
        .create("Offsets")?;
    let types: Vec<u8> = grid.cells.iter().map(|c| c.cell_type as u8).collect();
    root.new_dataset_builder().with_data(&types).create("Types")?;

    let point_data = root.create_group("PointData")?;
    for &field in fields {
        if field.components.is_empty() || field.values.is_empty() {
            continue;
        }
        let ncomps = field.ncomps();
        let zeros = vec![0.0f64; ncomps];
        let mut sanitizer = Sanitizer::default();
        let mut data = Vec::with_capacity(point_count * ncomps);
        for &node in &grid.point_ids {
            for &value in crate::writer::field_row(field, node, &zeros) {
                data.push(sanitizer.clean(value));
            }
        }
        let dataset = point_data
            .new_dataset::<f64>()
            .shape([point_count, ncomps])
            .create(field.name.as_str())?;
        dataset.write_raw(&data)?;
        sanitizer.report(&field.name);
    }

    file.close()?;
    Ok(())
}
