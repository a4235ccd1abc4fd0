/// scan: prefix sums on an OpenCL device.
///
///   scan                      → Hillis-Steele scan of eight ones
///   scan -m 1 --input 3,1,7,0,4,1,6,3
///   scan -m 2 -n 1000000
use std::process::ExitCode;

use clap::Parser;

use cllab::cli::DeviceArgs;
use cllab::plan::ScanMode;
use cllab::profiling::Phase;
use cllab::vector::{format_vector, parse_csv};
use cllab::LabResult;

const PRINT_LIMIT: usize = 100;

#[derive(Parser, Debug)]
#[command(version, about = "Prefix sums on an OpenCL device")]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    /// Comma-separated input vector
    #[arg(long, conflicts_with = "length")]
    input: Option<String>,

    /// Length of a vector of ones, used when --input is absent
    #[arg(short = 'n', long = "length", default_value_t = 8)]
    length: usize,

    /// 0: Hillis-Steele, 1: Blelloch (exclusive), 2: multi-stage block scan
    #[arg(short = 'm', long = "mode", default_value_t = 0,
          value_parser = clap::value_parser!(u8).range(0..=2))]
    mode: u8,

    /// Work-group size for mode 2 [default: device size capped at 256]
    #[arg(long)]
    local_size: Option<usize>,
}

fn run(args: &Args) -> LabResult<()> {
    let input = match &args.input {
        Some(text) => parse_csv(text)?,
        None => vec![1; args.length],
    };
    let mode = ScanMode::from_index(args.mode)?;

    let engine = args.device.open_engine()?;
    let result = engine.run_scan(mode, &input, args.local_size)?;

    println!("A = {}", format_vector(&input, PRINT_LIMIT));
    let label = if mode.is_exclusive() { "exclusive" } else { "inclusive" };
    println!("B ({label}) = {}", format_vector(&result.output, PRINT_LIMIT));
    println!(
        "Kernel execution time (unit: ns): {}",
        result.timeline.phase_ns(Phase::Kernel)
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    cllab::init_logging(args.device.verbose);
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
