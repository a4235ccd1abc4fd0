/// reduce: reductions, histograms and per-group scans on an integer vector.
///
///   reduce                            → scan-add of 6,6,6,9,9,9,9,8,5,3
///   reduce -k hist-2 --bins 5
///   reduce -k reduce-add-4 --input 1,2,3,4,5 --local-size 4
use std::process::ExitCode;

use clap::Parser;

use cllab::cli::DeviceArgs;
use cllab::plan::ReduceKernel;
use cllab::profiling::{Phase, Resolution};
use cllab::vector::{format_vector, parse_csv};
use cllab::LabResult;

const PRINT_LIMIT: usize = 100;

#[derive(Parser, Debug)]
#[command(version, about = "Reduction, histogram and scan kernels on an OpenCL device")]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    /// Comma-separated input vector
    #[arg(long, default_value = "6,6,6,9,9,9,9,8,5,3")]
    input: String,

    /// Work-group size; the input is zero-padded to a multiple of it
    #[arg(long, default_value_t = 10)]
    local_size: usize,

    /// Kernel to run
    #[arg(short = 'k', long = "kernel", value_enum, default_value_t = ReduceKernel::ScanAdd)]
    kernel: ReduceKernel,

    /// Number of histogram bins
    #[arg(long, default_value_t = 10)]
    bins: usize,
}

fn run(args: &Args) -> LabResult<()> {
    let input = parse_csv(&args.input)?;
    let engine = args.device.open_engine()?;
    let result = engine.run_reduce(args.kernel, &input, args.local_size, args.bins)?;

    println!("A = {}", format_vector(&result.input, PRINT_LIMIT));
    println!("B = {}", format_vector(&result.output, PRINT_LIMIT));

    let timeline = &result.timeline;
    println!("Kernel execution time (unit: ns): {}", timeline.phase_ns(Phase::Kernel));
    if let Some(last) = timeline.last_kernel() {
        println!(
            "Detailed breakdown of event (unit: us): {}",
            last.info.breakdown(Resolution::Us)
        );
    }
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
