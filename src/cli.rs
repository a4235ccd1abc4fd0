//! Command-line arguments shared by the binaries.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args};

/// Device selection and kernel location, common to every program.
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Platform index
    #[arg(short = 'p', long = "platform", default_value_t = 0)]
    pub platform: usize,

    /// Device index on the selected platform
    #[arg(short = 'd', long = "device", default_value_t = 0)]
    pub device: usize,

    /// List all platforms and devices, then run on the selected device
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// Directory holding the .cl kernel sources
    #[arg(long, env = "CLLAB_KERNELS_DIR", default_value = "kernels")]
    pub kernels_dir: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl DeviceArgs {
    #[cfg(feature = "opencl")]
    pub fn selection(&self) -> crate::opencl::DeviceSelection {
        crate::opencl::DeviceSelection {
            platform: self.platform,
            device: self.device,
        }
    }

    /// Print the device listing when asked, then open the selected device
    /// and report it.
    #[cfg(feature = "opencl")]
    pub fn open_engine(&self) -> crate::LabResult<crate::opencl::OpenClEngine> {
        if self.list {
            println!("{}", crate::opencl::list_platforms_devices()?);
        }
        let engine = crate::opencl::OpenClEngine::new(self.selection(), &self.kernels_dir)?;
        println!(
            "Running on {}, {}",
            engine.platform_name(),
            engine.device_name()
        );
        Ok(engine)
    }
}

/// Input/output image location for the image programs.
#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
    /// Input image file stem; reads <images-dir>/<STEM>.ppm (8-bit or 16-bit PPM)
    #[arg(short = 'f', long = "file", default_value = "test")]
    pub file: String,

    /// Directory holding input images
    #[arg(long, env = "CLLAB_IMAGES_DIR", default_value = "images")]
    pub images_dir: PathBuf,

    /// Output image path [default: <images-dir>/<STEM>_<program>.ppm]
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Also write input and output side by side to this .ppm/.pgm path
    #[arg(long, value_parser = pnm_path)]
    pub compare: Option<PathBuf>,
}

impl ImageArgs {
    pub fn input_path(&self) -> PathBuf {
        crate::image::image_path(&self.images_dir, &self.file)
    }

    /// Explicit `--output`, or `<images-dir>/<stem>_<suffix>.ppm`.
    pub fn output_path(&self, suffix: &str) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            default_output(&self.images_dir, &self.file, suffix)
        })
    }
}

fn pnm_path(arg: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(arg);
    crate::image::check_pnm_path(&path).map_err(|e| e.to_string())?;
    Ok(path)
}

fn default_output(dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{stem}_{suffix}.ppm"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        device: DeviceArgs,
        #[command(flatten)]
        image: ImageArgs,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::parse_from(["prog"]);
        assert_eq!(cli.device.platform, 0);
        assert_eq!(cli.device.device, 0);
        assert!(!cli.device.list);
        assert_eq!(cli.device.verbose, 0);
        assert_eq!(cli.image.file, "test");
        assert_eq!(cli.image.input_path(), PathBuf::from("images/test.ppm"));
        assert_eq!(
            cli.image.output_path("equalised"),
            PathBuf::from("images/test_equalised.ppm")
        );
    }

    #[test]
    fn test_short_flags() {
        let cli = TestCli::parse_from([
            "prog", "-p", "1", "-d", "2", "-l", "-f", "mdr16", "-vv", "-o", "out/x.ppm",
        ]);
        assert_eq!(cli.device.platform, 1);
        assert_eq!(cli.device.device, 2);
        assert!(cli.device.list);
        assert_eq!(cli.device.verbose, 2);
        assert_eq!(cli.image.file, "mdr16");
        assert_eq!(cli.image.output_path("eq"), PathBuf::from("out/x.ppm"));
    }

    #[test]
    fn test_compare_path_must_be_pnm() {
        let cli = TestCli::parse_from(["prog", "--compare", "out/cmp.ppm"]);
        assert_eq!(cli.image.compare, Some(PathBuf::from("out/cmp.ppm")));
        let err = TestCli::try_parse_from(["prog", "--compare", "out/cmp.png"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_help_is_a_display_error() {
        let err = TestCli::try_parse_from(["prog", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
