//! End-to-end conversion tests over synthetic FRD fixtures.

use std::fs;
use std::path::PathBuf;

use frd2vtk_io::{ConvertError, ConvertOptions, OutputFormat, VtuEncoding, convert_file};

/// 12-character fixed-column float, ` 1.00000E+00` style.
fn e12(value: f64) -> String {
    let rendered = format!("{value:.5E}");
    let normalized = match rendered.split_once('E') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}E{sign}{digits:0>2}")
        }
        None => rendered,
    };
    format!("{normalized:>12}")
}

struct Fixture {
    lines: Vec<String>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            lines: vec!["    1C  fixture".to_string()],
        }
    }

    fn nodes(mut self, coords: &[[f64; 3]]) -> Self {
        self.lines.push(format!("    2C{:>30}", coords.len()));
        for (i, c) in coords.iter().enumerate() {
            self.lines.push(format!(
                " -1{:>10}{}{}{}",
                i + 1,
                e12(c[0]),
                e12(c[1]),
                e12(c[2])
            ));
        }
        self.lines.push(" -3".to_string());
        self
    }

    fn elements(mut self, elements: &[(i32, &[i32])]) -> Self {
        self.lines.push(format!("    3C{:>30}", elements.len()));
        for (i, (etype, nodes)) in elements.iter().enumerate() {
            self.lines
                .push(format!(" -1{:>10}{etype:>5}{:>5}{:>5}", i + 1, 1, 1));
            let mut line = " -2".to_string();
            for node in *nodes {
                line.push_str(&format!("{node:>10}"));
            }
            self.lines.push(line);
        }
        self.lines.push(" -3".to_string());
        self
    }

    fn field(mut self, step: i32, time: f64, name: &str, labels: &[&str], rows: &[&[f64]]) -> Self {
        self.lines.push(format!(
            "  100CL  101{}{:>12}{:>20}{:>2}{step:>5}{:>10}{:>2}",
            e12(time),
            rows.len(),
            "",
            0,
            "",
            1
        ));
        self.lines
            .push(format!(" -4  {name:<8}{:>5}{:>5}", labels.len(), 1));
        for (i, label) in labels.iter().enumerate() {
            self.lines.push(format!(
                " -5  {label:<8}{:>5}{:>5}{:>5}{:>5}",
                1,
                2,
                i + 1,
                0
            ));
        }
        for (node, row) in rows.iter().enumerate() {
            let mut line = format!(" -1{:>10}", node + 1);
            for value in *row {
                line.push_str(&e12(*value));
            }
            self.lines.push(line);
        }
        self.lines.push(" -3".to_string());
        self
    }

    fn write(self, dir: &std::path::Path, name: &str) -> PathBuf {
        let mut body = self.lines.join("\n");
        body.push_str("\n 9999\n");
        let path = dir.join(name);
        fs::write(&path, body).expect("fixture should write");
        path
    }
}

fn tet_coords() -> Vec<[f64; 3]> {
    vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ]
}

fn two_step_fixture(dir: &std::path::Path) -> PathBuf {
    let disp_rows: Vec<Vec<f64>> = (1..=4).map(|n| vec![n as f64 * 1e-3, 0.0, 0.0]).collect();
    let disp: Vec<&[f64]> = disp_rows.iter().map(Vec::as_slice).collect();
    let error_rows: Vec<Vec<f64>> = (1..=4).map(|n| vec![n as f64]).collect();
    let error: Vec<&[f64]> = error_rows.iter().map(Vec::as_slice).collect();
    Fixture::new()
        .nodes(&tet_coords())
        .elements(&[(3, &[1, 2, 3, 4])])
        .field(1, 0.5, "DISP", &["D1", "D2", "D3"], &disp)
        .field(1, 0.5, "ERROR", &["STR(%)"], &error)
        .field(2, 1.0, "DISP", &["D1", "D2", "D3"], &disp)
        .field(2, 1.0, "ERROR", &["STR(%)"], &error)
        .write(dir, "job.frd")
}

#[test]
fn two_steps_produce_suffixed_files_and_a_collection() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = two_step_fixture(dir.path());
    let options = ConvertOptions {
        formats: vec![OutputFormat::LegacyVtk, OutputFormat::Vtu],
        ..ConvertOptions::default()
    };
    let report = convert_file(&input, &options).expect("conversion should succeed");

    assert_eq!(report.node_count, 4);
    assert_eq!(report.cell_count, 1);
    assert_eq!(report.step_count, 2);
    let names: Vec<String> = report
        .files
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
        .collect();
    assert_eq!(
        names,
        vec!["job.1.vtk", "job.2.vtk", "job.1.vtu", "job.2.vtu", "job.pvd"]
    );
    for file in &report.files {
        assert!(file.exists(), "{} should exist", file.display());
    }

    let pvd = fs::read_to_string(dir.path().join("job.pvd")).expect("pvd should read");
    assert!(pvd.contains("file=\"job.1.vtu\""));
    assert!(pvd.contains("file=\"job.2.vtu\""));
}

#[test]
fn single_step_file_name_has_no_suffix() {
    let dir = tempfile::tempdir().expect("temp dir");
    let disp_rows: Vec<Vec<f64>> = (1..=4).map(|n| vec![n as f64, 0.0, 0.0]).collect();
    let disp: Vec<&[f64]> = disp_rows.iter().map(Vec::as_slice).collect();
    let input = Fixture::new()
        .nodes(&tet_coords())
        .elements(&[(3, &[1, 2, 3, 4])])
        .field(1, 1.0, "DISP", &["D1", "D2", "D3"], &disp)
        .write(dir.path(), "job.frd");

    let options = ConvertOptions {
        formats: vec![OutputFormat::LegacyVtk],
        ..ConvertOptions::default()
    };
    let report = convert_file(&input, &options).expect("conversion should succeed");
    assert_eq!(report.files.len(), 1);
    assert!(dir.path().join("job.vtk").exists());
    assert!(!dir.path().join("job.1.vtk").exists());
}

#[test]
fn error_field_suppression_changes_only_data_blocks() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = two_step_fixture(dir.path());

    let suppressed = ConvertOptions {
        formats: vec![OutputFormat::LegacyVtk],
        skip_error_fields: true,
        ..ConvertOptions::default()
    };
    convert_file(&input, &suppressed).expect("conversion should succeed");
    let without = fs::read_to_string(dir.path().join("job.1.vtk")).expect("read");

    let kept = ConvertOptions {
        formats: vec![OutputFormat::LegacyVtk],
        skip_error_fields: false,
        ..ConvertOptions::default()
    };
    convert_file(&input, &kept).expect("conversion should succeed");
    let with = fs::read_to_string(dir.path().join("job.1.vtk")).expect("read");

    assert!(!without.contains("SCALARS ERROR"));
    assert!(with.contains("SCALARS ERROR"));
    assert_eq!(
        without.matches("VECTORS").count(),
        with.matches("VECTORS").count()
    );
    // suppression never changes geometry
    assert!(without.contains("POINTS 4 double"));
    assert!(with.contains("POINTS 4 double"));
    assert!(without.contains("POINT_DATA 4"));
    assert!(with.contains("POINT_DATA 4"));
}

#[test]
fn repeated_conversion_is_byte_identical() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = two_step_fixture(dir.path());
    let options = ConvertOptions {
        formats: vec![OutputFormat::LegacyVtk, OutputFormat::Vtu],
        ..ConvertOptions::default()
    };

    convert_file(&input, &options).expect("first conversion");
    let first_vtk = fs::read(dir.path().join("job.1.vtk")).expect("read");
    let first_vtu = fs::read(dir.path().join("job.1.vtu")).expect("read");

    convert_file(&input, &options).expect("second conversion");
    assert_eq!(fs::read(dir.path().join("job.1.vtk")).expect("read"), first_vtk);
    assert_eq!(fs::read(dir.path().join("job.1.vtu")).expect("read"), first_vtu);
}

#[test]
fn phantom_rows_are_reconciled_away() {
    let dir = tempfile::tempdir().expect("temp dir");
    // six declared nodes, row counts {6, 4, 2}: the second-largest wins
    let coords: Vec<[f64; 3]> = (0..6).map(|i| [i as f64, 0.0, 0.0]).collect();
    let six_rows: Vec<Vec<f64>> = (1..=6).map(|n| vec![n as f64]).collect();
    let six: Vec<&[f64]> = six_rows.iter().map(Vec::as_slice).collect();
    let four_rows: Vec<Vec<f64>> = (1..=4).map(|n| vec![n as f64]).collect();
    let four: Vec<&[f64]> = four_rows.iter().map(Vec::as_slice).collect();
    let two_rows: Vec<Vec<f64>> = (1..=2).map(|n| vec![n as f64]).collect();
    let two: Vec<&[f64]> = two_rows.iter().map(Vec::as_slice).collect();
    let input = Fixture::new()
        .nodes(&coords)
        .elements(&[(3, &[1, 2, 3, 4])])
        .field(1, 1.0, "A", &["V"], &six)
        .field(1, 1.0, "B", &["V"], &four)
        .field(1, 1.0, "C", &["V"], &two)
        .write(dir.path(), "phantom.frd");

    let options = ConvertOptions {
        formats: vec![OutputFormat::LegacyVtk],
        ..ConvertOptions::default()
    };
    let report = convert_file(&input, &options).expect("conversion should succeed");
    assert_eq!(report.node_count, 4);
    let vtk = fs::read_to_string(dir.path().join("phantom.vtk")).expect("read");
    assert!(vtk.contains("POINTS 4 double"));
    assert!(vtk.contains("POINT_DATA 4"));
}

#[test]
fn no_result_blocks_still_emit_one_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = Fixture::new()
        .nodes(&tet_coords())
        .elements(&[(3, &[1, 2, 3, 4])])
        .write(dir.path(), "bare.frd");

    let report = convert_file(&input, &ConvertOptions::default())
        .expect("conversion should succeed");
    assert_eq!(report.step_count, 1);
    let vtu = fs::read_to_string(dir.path().join("bare.vtu")).expect("read");
    assert!(vtu.contains("NumberOfPoints=\"4\""));
    assert!(!vtu.contains("<PointData>"));
}

#[test]
fn unmapped_element_type_fails_without_output() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = Fixture::new()
        .nodes(&tet_coords())
        .elements(&[(99, &[1, 2, 3, 4])])
        .write(dir.path(), "bad.frd");

    let err = convert_file(&input, &ConvertOptions::default())
        .expect_err("type 99 should be rejected");
    assert!(matches!(err, ConvertError::UnsupportedElementType(99)));
    assert!(!dir.path().join("bad.vtu").exists());
    // only the fixture itself remains
    assert_eq!(fs::read_dir(dir.path()).expect("read dir").count(), 1);
}

#[test]
fn repeated_field_with_different_components_fails_without_output() {
    let dir = tempfile::tempdir().expect("temp dir");
    let stress_rows: Vec<Vec<f64>> = (1..=4)
        .map(|n| (1..=6).map(|c| (n * c) as f64).collect())
        .collect();
    let stress: Vec<&[f64]> = stress_rows.iter().map(Vec::as_slice).collect();
    let mises_rows: Vec<Vec<f64>> = (1..=4).map(|n| vec![n as f64]).collect();
    let mises: Vec<&[f64]> = mises_rows.iter().map(Vec::as_slice).collect();
    let input = Fixture::new()
        .nodes(&tet_coords())
        .elements(&[(3, &[1, 2, 3, 4])])
        .field(
            1,
            1.0,
            "STRESS",
            &["SXX", "SYY", "SZZ", "SXY", "SYZ", "SZX"],
            &stress,
        )
        .field(1, 1.0, "STRESS", &["MISES"], &mises)
        .write(dir.path(), "dup.frd");

    let err = convert_file(&input, &ConvertOptions::default())
        .expect_err("mismatched repeat of STRESS should be rejected");
    assert!(matches!(err, ConvertError::Format(_)));
    assert!(format!("{err}").contains("STRESS"));
    assert!(!dir.path().join("dup.vtu").exists());
}

#[test]
fn appended_binary_vtu_is_structurally_complete() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = two_step_fixture(dir.path());
    let options = ConvertOptions {
        formats: vec![OutputFormat::Vtu],
        vtu_encoding: VtuEncoding::AppendedRaw,
        ..ConvertOptions::default()
    };
    convert_file(&input, &options).expect("conversion should succeed");
    let bytes = fs::read(dir.path().join("job.1.vtu")).expect("read");
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("format=\"appended\""));
    assert!(text.contains("<AppendedData encoding=\"raw\">"));
    assert!(text.contains("</VTKFile>"));
}

#[test]
fn report_round_trips_through_json() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = two_step_fixture(dir.path());
    let report = convert_file(&input, &ConvertOptions::default())
        .expect("conversion should succeed");
    let path = dir.path().join("report.json");
    report.save(&path).expect("report should save");
    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("valid JSON");
    assert_eq!(parsed["node_count"], 4);
    assert_eq!(parsed["step_count"], 2);
}
