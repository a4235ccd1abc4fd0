/// histeq: histogram equalisation of 8-bit and 16-bit PPM images.
///
///   histeq                            → equalise images/test.ppm
///   histeq -f mdr16 -m 2 --compare out/mdr16_cmp.ppm
use std::process::ExitCode;

use clap::Parser;

use cllab::cli::{DeviceArgs, ImageArgs};
use cllab::image::{save_comparison, PlanarImage};
use cllab::plan::HistEqMode;
use cllab::vector::format_vector;
use cllab::LabResult;

#[derive(Parser, Debug)]
#[command(version, about = "Histogram equalisation on an OpenCL device")]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    #[command(flatten)]
    image: ImageArgs,

    /// 0: basic (global atomics), 1: local-memory histogram, 2: optimised scan
    #[arg(short = 'm', long = "mode", default_value_t = 2,
          value_parser = clap::value_parser!(u8).range(0..=2))]
    mode: u8,

    /// Print H, CH and LUT
    #[arg(long)]
    print_histograms: bool,
}

fn run(args: &Args) -> LabResult<()> {
    let input = PlanarImage::load(&args.image.input_path())?;
    let mode = HistEqMode::from_index(args.mode)?;

    let engine = args.device.open_engine()?;
    let result = engine.run_histeq(&input, mode)?;
    log::info!(
        "{}-bit image, {} bins, histogram {:?}, cumulative {:?}",
        input.depth().bits(),
        input.depth().bin_count(),
        result.plan.histogram,
        result.plan.cumulative
    );

    if args.print_histograms {
        let eq = &result.equalisation;
        println!("H = {}", format_vector(&eq.histogram, eq.histogram.len()));
        println!("CH = {}", format_vector(&eq.cumulative, eq.cumulative.len()));
        println!("LUT = {}", format_vector(&eq.lut, eq.lut.len()));
    }

    println!("{}", result.timeline);

    let written = result.image.save(&args.image.output_path("equalised"))?;
    println!("Output image: {}", written.display());

    if let Some(path) = &args.image.compare {
        save_comparison(&input, &result.image, path)?;
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
