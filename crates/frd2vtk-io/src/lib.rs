//! Conversion engine for CalculiX `.frd` result files.
//!
//! This crate provides:
//! - **Block scanner** for the fixed-column FRD record format
//! - **Mesh builder / result collector** with referential-integrity
//!   checks and per-step, per-field value tables
//! - **Topology mapper** from cgx element types to VTK cell types with
//!   explicit node permutations
//! - **Step planner** with node-count reconciliation for phantom rows
//!   introduced by solver transform directives
//! - **Writers** for legacy VTK, VTU-XML (plus a PVD collection for
//!   multi-step runs) and, behind the `vtkhdf` feature, VTKHDF
//!
//! ## Usage
//!
//! ```rust,no_run
//! use frd2vtk_io::{convert_file, ConvertOptions, OutputFormat};
//!
//! let options = ConvertOptions {
//!     formats: vec![OutputFormat::LegacyVtk, OutputFormat::Vtu],
//!     ..ConvertOptions::default()
//! };
//! let report = convert_file("job.frd".as_ref(), &options)?;
//! println!("{} nodes, {} cells", report.node_count, report.cell_count);
//! # Ok::<(), frd2vtk_io::ConvertError>(())
//! ```

pub mod builder;
pub mod convert;
pub mod error;
pub mod planner;
pub mod scanner;
pub mod topology;
pub mod writer;

pub use builder::{MeshBuilder, ResultCollector, read_frd};
pub use convert::{ConversionReport, ConvertOptions, convert_file};
pub use error::{ConvertError, Result};
pub use planner::{Plan, Step, reconcile_node_count};
pub use scanner::{FrdScanner, Record};
pub use topology::{Cell, Grid, TypeMapping, VtkCellType, map_source_type};
pub use writer::OutputFormat;
pub use writer::legacy::LegacyVtkWriter;
pub use writer::xml::{PvdEntry, VtuEncoding, VtuWriter, write_pvd};
