/// vector_ops: element-wise integer vector arithmetic on an OpenCL device.
///
///   vector_ops            → C = A + B on 10 elements
///   vector_ops -f 2 -n 1000000
///                         → C = A * B, then C = C + B, timings only
use std::process::ExitCode;

use clap::Parser;

use cllab::cli::DeviceArgs;
use cllab::profiling::{Phase, Resolution};
use cllab::reference::VectorFunction;
use cllab::vector::{arithmetic_operands, format_vector};
use cllab::LabResult;

/// Vectors longer than this are not printed.
const PRINT_LIMIT: usize = 100;

#[derive(Parser, Debug)]
#[command(version, about = "Element-wise vector arithmetic on an OpenCL device")]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    /// 0: C = A + B, 1: C = A * B, 2: C = A * B then C = C + B, 3: C = A * B + B
    #[arg(short = 'f', long = "function", default_value_t = 0,
          value_parser = clap::value_parser!(u32).range(0..=3))]
    function: u32,

    /// Vector length; A[i] = i, B[i] = i % 3
    #[arg(short = 'n', long = "length", default_value_t = 10)]
    length: usize,
}

fn run(args: &Args) -> LabResult<()> {
    let function = VectorFunction::from_index(args.function)?;
    let engine = args.device.open_engine()?;

    println!("{}", function.formula());

    let (a, b) = arithmetic_operands(args.length);
    let result = engine.run_vector_function(function, &a, &b)?;
    let timeline = &result.timeline;

    if args.length <= PRINT_LIMIT {
        println!("A = {}", format_vector(&a, PRINT_LIMIT));
        println!("B = {}", format_vector(&b, PRINT_LIMIT));
        println!("C = {}", format_vector(&result.c, PRINT_LIMIT));
        println!();
    }

    let upload_a = timeline.step_ns("A").unwrap_or(0);
    let upload_b = timeline.step_ns("B").unwrap_or(0);
    let download_c = timeline.phase_ns(Phase::Download);
    let kernel = timeline.phase_ns(Phase::Kernel);

    println!(
        "Total memory transfer time (unit: ns): {}",
        upload_a + upload_b + download_c
    );
    println!("Upload time for input vectors (unit: ns): A {upload_a}, B {upload_b}");
    println!("Download time for the output vector C (unit: ns): {download_c}");
    println!();
    println!("Kernel execution time (unit: ns): {kernel}");
    if let Some(last) = timeline.last_kernel() {
        println!(
            "Detailed breakdown of event (unit: us): {}",
            last.info.breakdown(Resolution::Us)
        );
    }
    println!();
    println!("Overall operation time (unit: ns): {}", timeline.total_ns());
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
