//! Kernel selection and launch shapes.
//!
//! Everything here is decided on the host before any device work happens:
//! which kernel variant runs, how buffers are padded, how many local
//! scratch buffers a kernel takes and which build options a kernel file
//! needs. The `opencl` module only executes these decisions.

use clap::ValueEnum;

use crate::error::{LabError, LabResult};
use crate::image::BitDepth;
use crate::vector::group_count;

/// Image filter kernels from `filter.cl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageKernel {
    Identity,
    #[value(name = "filter-r")]
    FilterR,
    Invert,
    #[value(name = "rgb2grey")]
    Rgb2Grey,
    #[value(name = "identity-nd")]
    IdentityNd,
    #[value(name = "avg-filter-nd")]
    AvgFilterNd,
    #[value(name = "convolution-nd")]
    ConvolutionNd,
}

impl ImageKernel {
    pub fn kernel_name(self) -> &'static str {
        match self {
            ImageKernel::Identity => "identity",
            ImageKernel::FilterR => "filter_r",
            ImageKernel::Invert => "invert",
            ImageKernel::Rgb2Grey => "rgb2grey",
            ImageKernel::IdentityNd => "identity_nd",
            ImageKernel::AvgFilterNd => "avg_filter_nd",
            ImageKernel::ConvolutionNd => "convolution_nd",
        }
    }

    /// N-D kernels launch over `(width, height, channels)`, the rest over
    /// the flat sample count.
    pub fn is_nd(self) -> bool {
        matches!(
            self,
            ImageKernel::IdentityNd | ImageKernel::AvgFilterNd | ImageKernel::ConvolutionNd
        )
    }

    pub fn needs_rgb(self) -> bool {
        matches!(self, ImageKernel::FilterR | ImageKernel::Rgb2Grey)
    }

    /// Check the kernel can run on an image with `channels` channels.
    pub fn check_channels(self, channels: usize) -> LabResult<()> {
        if self.needs_rgb() && channels != 3 {
            return Err(LabError::invalid(format!(
                "kernel {} needs an RGB image, input has {channels} channel(s)",
                self.kernel_name()
            )));
        }
        Ok(())
    }
}

/// 3x3 convolution masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mask {
    /// 1-2-1 Gaussian, normalised by 16
    #[default]
    Gaussian,
    /// Uniform 1/9
    Box,
    Sharpen,
}

impl Mask {
    /// Row-major coefficients, `mask[dx + dy * 3]`.
    pub fn coefficients(self) -> [f32; 9] {
        match self {
            Mask::Gaussian => [
                1.0 / 16.0,
                2.0 / 16.0,
                1.0 / 16.0,
                2.0 / 16.0,
                4.0 / 16.0,
                2.0 / 16.0,
                1.0 / 16.0,
                2.0 / 16.0,
                1.0 / 16.0,
            ],
            Mask::Box => [1.0 / 9.0; 9],
            Mask::Sharpen => [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0],
        }
    }
}

/// Reduction, histogram and scan kernels from `reduce.cl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReduceKernel {
    #[value(name = "reduce-add-1")]
    ReduceAdd1,
    #[value(name = "reduce-add-2")]
    ReduceAdd2,
    #[value(name = "reduce-add-3")]
    ReduceAdd3,
    #[value(name = "reduce-add-4")]
    ReduceAdd4,
    #[value(name = "reduce-add-5")]
    ReduceAdd5,
    #[value(name = "hist-1")]
    Hist1,
    #[value(name = "hist-2")]
    Hist2,
    #[value(name = "scan-add")]
    ScanAdd,
}

impl ReduceKernel {
    pub fn kernel_name(self) -> &'static str {
        match self {
            ReduceKernel::ReduceAdd1 => "reduce_add_1",
            ReduceKernel::ReduceAdd2 => "reduce_add_2",
            ReduceKernel::ReduceAdd3 => "reduce_add_3",
            ReduceKernel::ReduceAdd4 => "reduce_add_4",
            ReduceKernel::ReduceAdd5 => "reduce_add_5",
            ReduceKernel::Hist1 => "hist_1",
            ReduceKernel::Hist2 => "hist_2",
            ReduceKernel::ScanAdd => "scan_add",
        }
    }

    pub fn is_histogram(self) -> bool {
        matches!(self, ReduceKernel::Hist1 | ReduceKernel::Hist2)
    }

    /// Zero is not neutral for a histogram, so only the others are padded.
    pub fn needs_padding(self) -> bool {
        !self.is_histogram()
    }

    /// Histograms launch without a fixed work-group size.
    pub fn uses_local_size(self) -> bool {
        !self.is_histogram()
    }

    /// Number of `local int` scratch buffers bound after `A` and `B`.
    pub fn local_buffers(self) -> usize {
        match self {
            ReduceKernel::ReduceAdd3 | ReduceKernel::ReduceAdd4 | ReduceKernel::ReduceAdd5 => 1,
            ReduceKernel::ScanAdd => 2,
            _ => 0,
        }
    }

    pub fn binds_bin_count(self) -> bool {
        self == ReduceKernel::Hist2
    }

    pub fn output_len(self, input_len: usize, bins: usize) -> usize {
        if self.is_histogram() {
            bins
        } else {
            input_len
        }
    }
}

/// Prefix-sum strategy of the `scan` program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Inclusive, global memory, one work-group
    HillisSteele,
    /// Exclusive, global memory, one work-group, power-of-two length
    Blelloch,
    /// Inclusive, any length, block sums scanned recursively
    BlockScan,
}

impl ScanMode {
    pub fn from_index(index: u8) -> LabResult<Self> {
        match index {
            0 => Ok(ScanMode::HillisSteele),
            1 => Ok(ScanMode::Blelloch),
            2 => Ok(ScanMode::BlockScan),
            _ => Err(LabError::invalid(format!("unknown scan mode {index}"))),
        }
    }

    pub fn is_exclusive(self) -> bool {
        self == ScanMode::Blelloch
    }

    /// Single-group modes must fit one work-group.
    pub fn check_length(self, len: usize, max_work_group_size: usize) -> LabResult<()> {
        if self != ScanMode::BlockScan && len > max_work_group_size {
            return Err(LabError::invalid(format!(
                "{len} elements exceed the device work-group size of {max_work_group_size}; \
                 use mode 2 for longer vectors"
            )));
        }
        Ok(())
    }
}

/// `true` when a ping-pong Hillis-Steele scan of `len` elements leaves its
/// result in the second buffer (an odd pass count).
pub fn hillis_steele_result_in_second(len: usize) -> bool {
    crate::vector::hillis_steele_passes(len) % 2 == 1
}

/// Lengths scanned at each level of a multi-stage block scan.
///
/// Level 0 is the input. Each further level holds the block totals of the
/// one before, until a level fits a single work-group.
pub fn block_scan_levels(len: usize, local_size: usize) -> Vec<usize> {
    let mut levels = vec![len];
    let mut n = len;
    while n > local_size.max(1) {
        n = group_count(n, local_size);
        levels.push(n);
    }
    levels
}

pub fn scan_build_options(unsigned: bool) -> &'static str {
    if unsigned {
        "-DSCAN_T=uint"
    } else {
        "-DSCAN_T=int"
    }
}

/// Optimisation tier of the equalisation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistEqMode {
    Basic,
    Local,
    Optimised,
}

impl HistEqMode {
    pub fn from_index(index: u8) -> LabResult<Self> {
        match index {
            0 => Ok(HistEqMode::Basic),
            1 => Ok(HistEqMode::Local),
            2 => Ok(HistEqMode::Optimised),
            _ => Err(LabError::invalid(format!("unknown histogram mode {index}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramStage {
    /// One global atomic per sample
    Global,
    /// Work-group histogram in local memory, merged at the end
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CumulativeStage {
    /// Every bin sums its own prefix
    Gather,
    /// One global Hillis-Steele launch per stride
    HillisSteele,
    /// Multi-stage block scan
    BlockScan,
}

/// Kernels chosen for one equalisation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistEqPlan {
    pub histogram: HistogramStage,
    pub cumulative: CumulativeStage,
    /// Set when a local histogram was asked for but the bins don't fit
    /// local memory.
    pub fell_back: bool,
}

impl HistEqPlan {
    pub fn new(mode: HistEqMode, depth: BitDepth) -> Self {
        let wants_local = mode != HistEqMode::Basic;
        let local_fits = depth == BitDepth::Eight;
        let histogram = if wants_local && local_fits {
            HistogramStage::Local
        } else {
            HistogramStage::Global
        };
        let cumulative = match mode {
            HistEqMode::Basic => CumulativeStage::Gather,
            HistEqMode::Local => CumulativeStage::HillisSteele,
            HistEqMode::Optimised => CumulativeStage::BlockScan,
        };
        HistEqPlan {
            histogram,
            cumulative,
            fell_back: wants_local && !local_fits,
        }
    }
}

/// `-DPIXEL=... -DBIN_COUNT=...` for `histeq.cl`.
pub fn histeq_build_options(depth: BitDepth) -> String {
    let pixel = match depth {
        BitDepth::Eight => "uchar",
        BitDepth::Sixteen => "ushort",
    };
    format!("-DPIXEL={pixel} -DBIN_COUNT={}", depth.bin_count())
}
