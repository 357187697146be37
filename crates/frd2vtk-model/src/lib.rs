//! Domain model for CalculiX result conversion.
//!
//! Holds the mesh and per-step result data read from an `.frd` file,
//! decoupled from parsing and from the output formats. Node and element
//! ids are kept in sorted order (`BTreeMap`) so that downstream writers
//! produce deterministic output without re-sorting.

use std::collections::BTreeMap;

/// Field name CalculiX uses for its discrepancy/error estimator.
pub const ERROR_FIELD_NAME: &str = "ERROR";

/// Element connectivity as declared in the result file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Element ID
    pub id: i32,
    /// Element type code in the source (cgx) convention
    pub source_type: i32,
    /// Node connectivity, in source-local node order
    pub nodes: Vec<i32>,
}

/// Finite-element mesh: nodes, elements and the header-declared totals.
///
/// The declared totals can differ from the map sizes when the solver
/// appends phantom nodes (see the step planner); both are kept.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Node coordinates (node id → xyz), sorted by id
    pub nodes: BTreeMap<i32, [f64; 3]>,
    /// Elements (element id → connectivity), sorted by id
    pub elements: BTreeMap<i32, Element>,
    /// Node total declared by the node block header
    pub declared_node_count: usize,
    /// Element total declared by the element block header
    pub declared_element_count: usize,
}

impl Mesh {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

/// One result quantity for one step: a fixed-width numeric vector per node.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultField {
    /// Field name from the block descriptor (e.g. "DISP", "STRESS")
    pub name: String,
    /// Step number the field belongs to
    pub step: i32,
    /// Time or frequency value of the step
    pub time: f64,
    /// Labels of the stored components, in column order
    pub components: Vec<String>,
    /// Per-node value rows (node id → components), sorted by id
    pub values: BTreeMap<i32, Vec<f64>>,
    /// True for the solver's discrepancy estimator field
    pub is_error_field: bool,
}

impl ResultField {
    pub fn new(name: impl Into<String>, step: i32, time: f64) -> Self {
        let name = name.into();
        let is_error_field = name == ERROR_FIELD_NAME;
        Self {
            name,
            step,
            time,
            components: Vec::new(),
            values: BTreeMap::new(),
            is_error_field,
        }
    }

    /// Number of stored components per node.
    pub fn ncomps(&self) -> usize {
        self.components.len()
    }

    /// Number of value rows, phantom rows included.
    pub fn row_count(&self) -> usize {
        self.values.len()
    }
}
