use std::path::PathBuf;
use std::process::ExitCode;

use frd2vtk_io::{ConvertOptions, OutputFormat, VtuEncoding, convert_file};

fn usage() {
    eprintln!("usage: frd2vtk <job.frd> [formats] [options]");
    eprintln!("  formats: vtk vtu vtkhdf (default: vtu)");
    eprintln!("  --keep-error-fields   also write the solver's ERROR field");
    eprintln!("  --binary              appended raw payload for .vtu output");
    eprintln!("  --out <dir>           destination directory");
    eprintln!("  --report <file>       write a JSON conversion report");
}

struct Args {
    input: PathBuf,
    options: ConvertOptions,
    report: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Option<Args> {
    let mut input = None;
    let mut formats = Vec::new();
    let mut skip_error_fields = true;
    let mut vtu_encoding = VtuEncoding::Ascii;
    let mut output_dir = None;
    let mut report = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "vtk" => formats.push(OutputFormat::LegacyVtk),
            "vtu" => formats.push(OutputFormat::Vtu),
            #[cfg(feature = "vtkhdf")]
            "vtkhdf" => formats.push(OutputFormat::VtkHdf),
            #[cfg(not(feature = "vtkhdf"))]
            "vtkhdf" => {
                eprintln!("frd2vtk was built without the vtkhdf feature");
                return None;
            }
            "--keep-error-fields" => skip_error_fields = false,
            "--binary" => vtu_encoding = VtuEncoding::AppendedRaw,
            "--out" => output_dir = Some(PathBuf::from(iter.next()?)),
            "--report" => report = Some(PathBuf::from(iter.next()?)),
            other if other.starts_with('-') => return None,
            other if input.is_none() => input = Some(PathBuf::from(other)),
            _ => return None,
        }
    }

    if formats.is_empty() {
        formats.push(OutputFormat::Vtu);
    }
    Some(Args {
        input: input?,
        options: ConvertOptions {
            formats,
            skip_error_fields,
            vtu_encoding,
            output_dir,
        },
        report,
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(args) = parse_args(&args) else {
        usage();
        return ExitCode::from(2);
    };

    let report = match convert_file(&args.input, &args.options) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("conversion failed: {err}");
            return ExitCode::from(1);
        }
    };

    for file in &report.files {
        println!("{}", file.display());
    }

    if let Some(path) = &args.report {
        let envelope = serde_json::json!({
            "generated": chrono::Utc::now().to_rfc3339(),
            "conversion": report,
        });
        let body = match serde_json::to_string_pretty(&envelope) {
            Ok(body) => body,
            Err(err) => {
                eprintln!("report serialization failed: {err}");
                return ExitCode::from(1);
            }
        };
        if let Err(err) = std::fs::write(path, body) {
            eprintln!("failed to write report {}: {err}", path.display());
            return ExitCode::from(1);
        }
    }

    ExitCode::SUCCESS
}
