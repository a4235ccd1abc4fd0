/// image_filter: per-pixel and 3x3 neighbourhood filters on a PPM image.
///
///   image_filter                      → gaussian convolution of images/test.ppm
///   image_filter -k invert -f test_large --compare out/cmp.ppm
use std::process::ExitCode;

use clap::Parser;

use cllab::cli::{DeviceArgs, ImageArgs};
use cllab::image::{save_comparison, BitDepth, PlanarImage};
use cllab::plan::{ImageKernel, Mask};
use cllab::profiling::Phase;
use cllab::LabResult;

#[derive(Parser, Debug)]
#[command(version, about = "Image filters on an OpenCL device")]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    #[command(flatten)]
    image: ImageArgs,

    /// Filter kernel to run
    #[arg(short = 'k', long = "kernel", value_enum, default_value_t = ImageKernel::ConvolutionNd)]
    kernel: ImageKernel,

    /// Mask used by convolution-nd
    #[arg(long, value_enum, default_value_t = Mask::Gaussian)]
    mask: Mask,
}

fn run(args: &Args) -> LabResult<()> {
    let input = PlanarImage::load(&args.image.input_path())?;
    if input.depth() == BitDepth::Sixteen {
        log::warn!("16-bit input, filtering the high byte of every sample");
    }
    args.kernel.check_channels(input.channels())?;

    let engine = args.device.open_engine()?;
    let result = engine.run_image_filter(&input, args.kernel, args.mask)?;

    let timeline = &result.timeline;
    println!("Kernel execution time: {} ns", timeline.phase_ns(Phase::Kernel));
    println!(
        "Memory transfer time: {} ns",
        timeline.phase_ns(Phase::Upload) + timeline.phase_ns(Phase::Download)
    );

    let written = result
        .image
        .save(&args.image.output_path(args.kernel.kernel_name()))?;
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
