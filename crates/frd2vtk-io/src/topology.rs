//! Table-driven mapping from cgx element types to VTK cell types.
//!
//! First- and second-order element families order their local nodes
//! differently in the source and target conventions, so every table
//! entry carries an explicit node permutation; it is applied for every
//! element, never assumed identity. The permutation may be shorter than
//! the element's node list: C3D15 has no VTK counterpart and degrades
//! to a 6-node wedge, dropping the midside nodes.

use frd2vtk_model::Mesh;

use crate::error::{ConvertError, Result};

/// VTK cell type codes (legacy and XML formats share the enumeration).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VtkCellType {
    Line = 3,
    Triangle = 5,
    Quad = 9,
    Tetra = 10,
    Hexahedron = 12,
    Wedge = 13,
    QuadraticEdge = 21,
    QuadraticTriangle = 22,
    QuadraticQuad = 23,
    QuadraticTetra = 24,
    QuadraticHexahedron = 25,
}

/// Target cell type plus the node-index permutation to apply.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapping {
    pub cell_type: VtkCellType,
    pub permutation: &'static [usize],
}

/// cgx type 4 (C3D20): the last two groups of midside nodes swap.
const PERM_C3D20: &[usize] = &[
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 16, 17, 18, 19, 12, 13, 14, 15,
];
/// cgx types 2/5 (C3D6/C3D15): wedge winding differs; C3D15 midside
/// nodes are dropped.
const PERM_WEDGE: &[usize] = &[0, 2, 1, 3, 5, 4];
const PERM_8: &[usize] = &[0, 1, 2, 3, 4, 5, 6, 7];
const PERM_10: &[usize] = &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
const PERM_6: &[usize] = &[0, 1, 2, 3, 4, 5];
const PERM_4: &[usize] = &[0, 1, 2, 3];
const PERM_3: &[usize] = &[0, 1, 2];
const PERM_2: &[usize] = &[0, 1];

/// Look up the target cell type and node permutation for a cgx element
/// type code. Unknown codes are fatal for the whole conversion.
pub fn map_source_type(source_type: i32) -> Result<TypeMapping> {
    let (cell_type, permutation) = match source_type {
        1 => (VtkCellType::Hexahedron, PERM_8), // C3D8
        2 => (VtkCellType::Wedge, PERM_WEDGE),  // C3D6
        3 => (VtkCellType::Tetra, PERM_4),      // C3D4
        4 => (VtkCellType::QuadraticHexahedron, PERM_C3D20), // C3D20
        5 => (VtkCellType::Wedge, PERM_WEDGE),  // C3D15, reduced
        6 => (VtkCellType::QuadraticTetra, PERM_10), // C3D10
        7 => (VtkCellType::Triangle, PERM_3),   // S3
        8 => (VtkCellType::QuadraticTriangle, PERM_6), // S6
        9 => (VtkCellType::Quad, PERM_4),       // S4
        10 => (VtkCellType::QuadraticQuad, PERM_8), // S8
        11 => (VtkCellType::Line, PERM_2),      // B31
        12 => (VtkCellType::QuadraticEdge, PERM_3), // B32
        other => return Err(ConvertError::UnsupportedElementType(other)),
    };
    Ok(TypeMapping {
        cell_type,
        permutation,
    })
}

/// One translated cell: target type and zero-based point indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub cell_type: VtkCellType,
    pub connectivity: Vec<usize>,
}

/// Mesh geometry translated to the target conventions: points in
/// node-id order truncated to the reconciled node count, and cells with
/// permuted, renumbered connectivity.
#[derive(Debug, Clone)]
pub struct Grid {
    /// Node ids backing each point, in point order
    pub point_ids: Vec<i32>,
    /// Point coordinates, one per entry of `point_ids`
    pub points: Vec<[f64; 3]>,
    /// Cells in element-id order
    pub cells: Vec<Cell>,
}

impl Grid {
    /// Translate the mesh. Points beyond `node_count` are phantom rows
    /// introduced by solver transform directives and are excluded; an
    /// element referencing one of them fails the conversion.
    pub fn build(mesh: &Mesh, node_count: usize) -> Result<Self> {
        let mut point_ids = Vec::with_capacity(node_count);
        let mut points = Vec::with_capacity(node_count);
        for (&id, &coords) in mesh.nodes.iter().take(node_count) {
            point_ids.push(id);
            points.push(coords);
        }
        let index_of = |node: i32| point_ids.binary_search(&node).ok();

        let mut cells = Vec::with_capacity(mesh.elements.len());
        for element in mesh.elements.values() {
            let mapping = map_source_type(element.source_type)?;
            let mut connectivity = Vec::with_capacity(mapping.permutation.len());
            for &local in mapping.permutation {
                let node = *element.nodes.get(local).ok_or_else(|| {
                    ConvertError::Format(format!(
                        "element {} has {} nodes but type {} needs index {}",
                        element.id,
                        element.nodes.len(),
                        element.source_type,
                        local
                    ))
                })?;
                let index = index_of(node).ok_or(ConvertError::Reference {
                    element: element.id,
                    node,
                })?;
                connectivity.push(index);
            }
            cells.push(Cell {
                cell_type: mapping.cell_type,
                connectivity,
            });
        }
        Ok(Self {
            point_ids,
            points,
            cells,
        })
    }

    /// Total length of all cell connectivity lists.
    pub fn connectivity_len(&self) -> usize {
        self.cells.iter().map(|c| c.connectivity.len()).sum()
    }
}
