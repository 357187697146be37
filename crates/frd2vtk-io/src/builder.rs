//! Mesh builder and result collector.
//!
//! Consume scanner records into the domain model: a [`Mesh`] with
//! referential-integrity checks and a list of [`ResultField`]s keyed by
//! step number and field name, in input order.

use std::collections::BTreeMap;
use std::io::BufRead;

use frd2vtk_model::{Element, Mesh, ResultField};
use tracing::{debug, warn};

use crate::error::{ConvertError, Result};
use crate::scanner::{FrdScanner, Record};

/// Accumulates node and element records into a [`Mesh`].
#[derive(Debug, Default)]
pub struct MeshBuilder {
    nodes: BTreeMap<i32, [f64; 3]>,
    elements: BTreeMap<i32, Element>,
    declared_node_count: usize,
    declared_element_count: usize,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_nodes(&mut self, total: usize) {
        self.declared_node_count = total;
    }

    pub fn declare_elements(&mut self, total: usize) {
        self.declared_element_count = total;
    }

    pub fn add_node(&mut self, id: i32, coords: [f64; 3]) {
        self.nodes.insert(id, coords);
    }

    pub fn add_element(&mut self, id: i32, source_type: i32, nodes: Vec<i32>) {
        self.elements.insert(
            id,
            Element {
                id,
                source_type,
                nodes,
            },
        );
    }

    /// Verify referential integrity and freeze the mesh. Every node id
    /// named by an element must have been declared in the node block.
    pub fn finish(self) -> Result<Mesh> {
        if self.declared_element_count != 0 && self.declared_element_count != self.elements.len() {
            warn!(
                declared = self.declared_element_count,
                parsed = self.elements.len(),
                "element block header total does not match parsed elements"
            );
        }
        for element in self.elements.values() {
            for &node in &element.nodes {
                if !self.nodes.contains_key(&node) {
                    return Err(ConvertError::Reference {
                        element: element.id,
                        node,
                    });
                }
            }
        }
        Ok(Mesh {
            nodes: self.nodes,
            elements: self.elements,
            declared_node_count: self.declared_node_count,
            declared_element_count: self.declared_element_count,
        })
    }
}

/// Accumulates result records into per-step, per-field value tables.
#[derive(Debug, Default)]
pub struct ResultCollector {
    fields: Vec<ResultField>,
    current: Option<ResultField>,
    step: i32,
    time: f64,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_block(&mut self, step: i32, time: f64) -> Result<()> {
        self.flush_current()?;
        self.step = step;
        self.time = time;
        Ok(())
    }

    pub fn start_field(&mut self, name: &str) -> Result<()> {
        self.flush_current()?;
        self.current = Some(ResultField::new(name, self.step, self.time));
        Ok(())
    }

    pub fn add_component(&mut self, label: &str, calculated: bool) {
        if calculated {
            return;
        }
        if let Some(field) = self.current.as_mut() {
            field.components.push(label.to_string());
        }
    }

    pub fn add_row(&mut self, node: i32, values: Vec<f64>) {
        if let Some(field) = self.current.as_mut() {
            field.values.insert(node, values);
        }
    }

    /// Close the current field. Fields that repeat a (step, name) pair
    /// merge their rows into the first occurrence; the repeated block
    /// must declare the same stored components, otherwise the merged
    /// rows would not all match the field's width.
    fn flush_current(&mut self) -> Result<()> {
        let Some(field) = self.current.take() else {
            return Ok(());
        };
        debug!(
            step = field.step,
            field = %field.name,
            components = field.ncomps(),
            rows = field.row_count(),
            "collected result field"
        );
        if let Some(existing) = self
            .fields
            .iter_mut()
            .find(|f| f.step == field.step && f.name == field.name)
        {
            if existing.ncomps() != field.ncomps() {
                return Err(ConvertError::Format(format!(
                    "result field {} repeats in step {} with {} components, previously {}",
                    field.name,
                    field.step,
                    field.ncomps(),
                    existing.ncomps()
                )));
            }
            existing.values.extend(field.values);
        } else {
            self.fields.push(field);
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<ResultField>> {
        self.flush_current()?;
        Ok(self.fields)
    }
}

/// Single pass over an FRD stream: scan every record and build the mesh
/// and result fields. The scanner is exhausted before returning, so the
/// caller has the full record-count statistics for node reconciliation.
pub fn read_frd<R: BufRead>(reader: R) -> Result<(Mesh, Vec<ResultField>)> {
    let mut mesh = MeshBuilder::new();
    let mut results = ResultCollector::new();
    for record in FrdScanner::new(reader) {
        match record? {
            Record::Info(_) => {}
            Record::NodeBlockStart { declared } => mesh.declare_nodes(declared),
            Record::Node { id, coords } => mesh.add_node(id, coords),
            Record::ElementBlockStart { declared } => mesh.declare_elements(declared),
            Record::Element {
                id,
                source_type,
                nodes,
            } => mesh.add_element(id, source_type, nodes),
            Record::ResultBlockStart { step, time, .. } => results.start_block(step, time)?,
            Record::FieldStart { name, .. } => results.start_field(&name)?,
            Record::Component { label, calculated } => results.add_component(&label, calculated),
            Record::ResultRow { node, values } => results.add_row(node, values),
            Record::BlockEnd => {}
            Record::FileEnd => break,
        }
    }
    Ok((mesh.finish()?, results.finish()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_rejects_undeclared_node_reference() {
        let mut builder = MeshBuilder::new();
        builder.add_node(1, [0.0, 0.0, 0.0]);
        builder.add_node(2, [1.0, 0.0, 0.0]);
        builder.add_element(5, 11, vec![1, 2]);
        builder.add_element(6, 11, vec![2, 99]);
        let err = builder.finish().expect_err("dangling reference should fail");
        match err {
            ConvertError::Reference { element, node } => {
                assert_eq!(element, 6);
                assert_eq!(node, 99);
            }
            other => panic!("expected reference error, got {other}"),
        }
    }

    #[test]
    fn collector_merges_repeated_step_and_name() {
        let mut collector = ResultCollector::new();
        collector.start_block(1, 0.5).expect("block");
        collector.start_field("NDTEMP").expect("field");
        collector.add_component("T", false);
        collector.add_row(1, vec![20.0]);
        collector.start_block(1, 0.5).expect("block");
        collector.start_field("NDTEMP").expect("field");
        collector.add_component("T", false);
        collector.add_row(2, vec![21.0]);
        let fields = collector.finish().expect("finish");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].row_count(), 2);
    }

    #[test]
    fn collector_rejects_merge_with_different_components() {
        let mut collector = ResultCollector::new();
        collector.start_block(1, 1.0).expect("block");
        collector.start_field("STRESS").expect("field");
        for i in 1..=6 {
            collector.add_component(&format!("S{i}"), false);
        }
        collector.add_row(1, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        collector.start_field("STRESS").expect("field");
        collector.add_component("MISES", false);
        collector.add_row(2, vec![7.0]);
        let err = collector
            .finish()
            .expect_err("component count mismatch should fail");
        assert!(format!("{err}").contains("STRESS"));
    }

    #[test]
    fn collector_drops_calculated_components() {
        let mut collector = ResultCollector::new();
        collector.start_block(2, 1.0).expect("block");
        collector.start_field("DISP").expect("field");
        collector.add_component("D1", false);
        collector.add_component("D2", false);
        collector.add_component("D3", false);
        collector.add_component("ALL", true);
        let fields = collector.finish().expect("finish");
        assert_eq!(fields[0].components, vec!["D1", "D2", "D3"]);
        assert_eq!(fields[0].step, 2);
        assert_eq!(fields[0].time, 1.0);
    }

    #[test]
    fn error_field_is_collected_and_tagged() {
        let mut collector = ResultCollector::new();
        collector.start_block(1, 1.0).expect("block");
        collector.start_field("ERROR").expect("field");
        collector.add_component("STR(%)", false);
        collector.add_row(1, vec![4.2]);
        let fields = collector.finish().expect("finish");
        assert!(fields[0].is_error_field);
        assert_eq!(fields[0].row_count(), 1);
    }

    #[test]
    fn finish_tolerates_header_total_mismatch() {
        let mut builder = MeshBuilder::new();
        builder.declare_nodes(2);
        builder.declare_elements(5);
        builder.add_node(1, [0.0, 0.0, 0.0]);
        builder.add_node(2, [1.0, 0.0, 0.0]);
        builder.add_element(1, 11, vec![1, 2]);
        // a stale header total is logged, not fatal
        let mesh = builder.finish().expect("mesh should build");
        assert_eq!(mesh.element_count(), 1);
        assert_eq!(mesh.declared_element_count, 5);
    }
}
