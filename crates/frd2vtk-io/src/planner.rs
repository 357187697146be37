//! Step planner: node-count reconciliation, step grouping and naming.

use std::collections::BTreeSet;

use frd2vtk_model::{Mesh, ResultField};
use tracing::{debug, warn};

/// One planned output step with its (already filtered) fields.
#[derive(Debug)]
pub struct Step<'a> {
    /// Step number from the input
    pub index: i32,
    /// Zero-padded file-name suffix; `None` for a single-step run
    pub label: Option<String>,
    /// Time or frequency value of the step
    pub time: f64,
    /// Fields to write, input order, error fields already suppressed
    pub fields: Vec<&'a ResultField>,
}

/// Conversion plan for one input file.
#[derive(Debug)]
pub struct Plan<'a> {
    /// Reconciled true node count (phantom rows excluded)
    pub node_count: usize,
    /// Steps sorted ascending by index
    pub steps: Vec<Step<'a>>,
}

impl<'a> Plan<'a> {
    /// Group fields into steps and reconcile the node count. Error
    /// fields always participate in the reconciliation statistics; the
    /// suppression toggle only controls what gets written.
    pub fn build(mesh: &Mesh, fields: &'a [ResultField], skip_error_fields: bool) -> Self {
        let node_count = reconcile_node_count(fields, mesh.declared_node_count);

        let indices: BTreeSet<i32> = fields.iter().map(|f| f.step).collect();
        let multi = indices.len() > 1;
        let width = index_width(indices.len());

        let mut steps: Vec<Step<'a>> = indices
            .into_iter()
            .map(|index| {
                let step_fields: Vec<&ResultField> = fields
                    .iter()
                    .filter(|f| f.step == index)
                    .filter(|f| !(skip_error_fields && f.is_error_field))
                    .collect();
                let time = fields
                    .iter()
                    .find(|f| f.step == index)
                    .map(|f| f.time)
                    .unwrap_or(0.0);
                Step {
                    index,
                    label: multi.then(|| format!("{index:0width$}")),
                    time,
                    fields: step_fields,
                }
            })
            .collect();

        // No result blocks at all: still run the pipeline once with an
        // empty-field step.
        if steps.is_empty() {
            steps.push(Step {
                index: 1,
                label: None,
                time: 0.0,
                fields: Vec::new(),
            });
        }

        debug!(
            node_count,
            steps = steps.len(),
            "planned conversion"
        );
        Plan { node_count, steps }
    }

    /// Output file name for one step: the input stem plus the format
    /// extension, with the zero-padded step label inserted when more
    /// than one step exists.
    pub fn output_name(&self, stem: &str, step: &Step<'_>, extension: &str) -> String {
        match &step.label {
            Some(label) => format!("{stem}.{label}.{extension}"),
            None => format!("{stem}.{extension}"),
        }
    }
}

/// Reconcile the true node count from the distinct per-field row counts.
///
/// Solver transform directives can append phantom all-zero rows to
/// result blocks, so the apparent row count may exceed the true mesh
/// node count. Policy:
/// - one distinct count: use it;
/// - exactly three distinct counts: the second-largest (empirically the
///   true count sits between an inflated and a further-reduced variant);
/// - anything else: fall back to the header-declared total.
///
/// This is a heuristic. A result legitimately written for an arbitrary
/// node subset is indistinguishable from a transform artifact here; see
/// DESIGN.md.
pub fn reconcile_node_count(fields: &[ResultField], declared: usize) -> usize {
    let counts: BTreeSet<usize> = fields.iter().map(|f| f.row_count()).collect();
    let mut descending: Vec<usize> = counts.into_iter().collect();
    descending.reverse();
    match descending.len() {
        1 => descending[0],
        3 => {
            warn!(
                counts = ?descending,
                chosen = descending[1],
                "row counts differ across result blocks, assuming phantom rows"
            );
            descending[1]
        }
        _ => declared,
    }
}

/// Digit count of the number of distinct steps, used as the zero-pad
/// width of the file-name suffix.
fn index_width(step_count: usize) -> usize {
    step_count.max(1).to_string().len()
}
