//! CPU reference implementations of every kernel the programs launch.
//!
//! The device pipelines are validated against these functions. Float
//! arithmetic follows the kernels operation for operation (`f32`, same
//! summation order) so results agree exactly except where a device is free
//! to contract multiply-adds.

use crate::error::{LabError, LabResult};

/// Element-wise arithmetic on two integer vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFunction {
    /// `C = A + B`
    Add,
    /// `C = A * B`
    Mult,
    /// `C = A * B`, then `C = C + B` as a second launch
    MultThenAdd,
    /// `C = A * B + B` in one launch
    MultAdd,
}

impl VectorFunction {
    /// Map the numeric `-f` selector.
    pub fn from_index(index: u32) -> LabResult<Self> {
        match index {
            0 => Ok(VectorFunction::Add),
            1 => Ok(VectorFunction::Mult),
            2 => Ok(VectorFunction::MultThenAdd),
            3 => Ok(VectorFunction::MultAdd),
            _ => Err(LabError::invalid(format!("unknown vector function {index}"))),
        }
    }

    pub fn formula(self) -> &'static str {
        match self {
            VectorFunction::Add => "C = A + B",
            VectorFunction::Mult => "C = A * B",
            VectorFunction::MultThenAdd => "C = A * B, C = C + B",
            VectorFunction::MultAdd => "C = A * B + B",
        }
    }

    /// Kernel names launched, in order.
    pub fn kernels(self) -> &'static [&'static str] {
        match self {
            VectorFunction::Add => &["add"],
            VectorFunction::Mult => &["mult"],
            VectorFunction::MultThenAdd => &["mult", "add"],
            VectorFunction::MultAdd => &["multadd"],
        }
    }
}

pub fn vector_function(f: VectorFunction, a: &[i32], b: &[i32]) -> Vec<i32> {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| match f {
            VectorFunction::Add => x.wrapping_add(y),
            VectorFunction::Mult => x.wrapping_mul(y),
            VectorFunction::MultThenAdd | VectorFunction::MultAdd => {
                x.wrapping_mul(y).wrapping_add(y)
            }
        })
        .collect()
}

/// Histogram with one bin per sample value. Values past the last bin are
/// ignored.
pub fn histogram(samples: &[u16], bins: usize) -> Vec<u32> {
    let mut h = vec![0u32; bins];
    for &s in samples {
        if let Some(bin) = h.get_mut(s as usize) {
            *bin += 1;
        }
    }
    h
}

/// Histogram of integer values where anything past the last bin lands in
/// the last bin.
pub fn histogram_clamped(values: &[i32], bins: usize) -> Vec<i32> {
    let mut h = vec![0i32; bins];
    if bins == 0 {
        return h;
    }
    for &v in values {
        let bin = (v.max(0) as usize).min(bins - 1);
        h[bin] += 1;
    }
    h
}

/// Inclusive prefix sum.
pub fn inclusive_scan<T>(data: &[T]) -> Vec<T>
where
    T: Copy + Default + std::ops::Add<Output = T>,
{
    let mut acc = T::default();
    data.iter()
        .map(|&v| {
            acc = acc + v;
            acc
        })
        .collect()
}

/// Exclusive prefix sum.
pub fn exclusive_scan<T>(data: &[T]) -> Vec<T>
where
    T: Copy + Default + std::ops::Add<Output = T>,
{
    let mut acc = T::default();
    data.iter()
        .map(|&v| {
            let out = acc;
            acc = acc + v;
            out
        })
        .collect()
}

/// Inclusive prefix sum restarted at each block of `block` elements.
pub fn blockwise_inclusive_scan(data: &[i32], block: usize) -> Vec<i32> {
    data.chunks(block.max(1))
        .flat_map(inclusive_scan)
        .collect()
}

/// Sum of each block of `block` elements.
pub fn block_sums(data: &[i32], block: usize) -> Vec<i32> {
    data.chunks(block.max(1)).map(|c| c.iter().sum()).collect()
}

/// `(bins - 1) / total` as used to normalise a cumulative histogram.
pub fn lut_scale(bins: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        (bins - 1) as f32 / total as f32
    }
}

/// Normalise a cumulative histogram into a look-up table.
pub fn lut(cumulative: &[u32], scale: f32) -> Vec<u32> {
    let max = cumulative.len().saturating_sub(1) as u32;
    cumulative
        .iter()
        .map(|&c| ((c as f32 * scale) as u32).min(max))
        .collect()
}

/// Map every sample through the look-up table.
pub fn remap(samples: &[u16], lut: &[u32]) -> Vec<u16> {
    samples.iter().map(|&s| lut[s as usize] as u16).collect()
}

/// Everything the equalisation pipeline produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equalisation {
    pub histogram: Vec<u32>,
    pub cumulative: Vec<u32>,
    pub lut: Vec<u32>,
    pub output: Vec<u16>,
}

/// Histogram equalisation of `samples` with `bins` intensity levels.
pub fn equalise(samples: &[u16], bins: usize) -> Equalisation {
    let histogram = histogram(samples, bins);
    let cumulative = inclusive_scan(&histogram);
    let lut = lut(&cumulative, lut_scale(bins, samples.len()));
    let output = remap(samples, &lut);
    Equalisation {
        histogram,
        cumulative,
        lut,
        output,
    }
}

/// 3x3 neighbourhood filters over a planar image.
pub mod filter {
    use crate::plan::{ImageKernel, Mask};

    /// Copy pixels, zeroing every channel but red.
    pub fn filter_r(samples: &[u8]) -> Vec<u8> {
        let plane = samples.len() / 3;
        samples
            .iter()
            .enumerate()
            .map(|(i, &v)| if i < plane { v } else { 0 })
            .collect()
    }

    pub fn invert(samples: &[u8]) -> Vec<u8> {
        samples.iter().map(|&v| 255 - v).collect()
    }

    /// BT.709 luma written to every channel of a planar RGB image.
    pub fn rgb2grey(samples: &[u8]) -> Vec<u8> {
        let plane = samples.len() / 3;
        (0..samples.len())
            .map(|id| {
                let x = id % plane;
                let r = samples[x] as f32;
                let g = samples[x + plane] as f32;
                let b = samples[x + 2 * plane] as f32;
                (0.2126f32 * r + 0.7152f32 * g + 0.0722f32 * b) as u8
            })
            .collect()
    }

    /// Run the CPU version of `kernel` on a planar image.
    pub fn apply(
        kernel: ImageKernel,
        samples: &[u8],
        width: usize,
        height: usize,
        mask: Mask,
    ) -> Vec<u8> {
        match kernel {
            ImageKernel::Identity | ImageKernel::IdentityNd => samples.to_vec(),
            ImageKernel::FilterR => filter_r(samples),
            ImageKernel::Invert => invert(samples),
            ImageKernel::Rgb2Grey => rgb2grey(samples),
            ImageKernel::AvgFilterNd => average(samples, width, height),
            ImageKernel::ConvolutionNd => convolve(samples, width, height, &mask.coefficients()),
        }
    }

    /// 3x3 box average. Border pixels are copied unchanged.
    pub fn average(samples: &[u8], width: usize, height: usize) -> Vec<u8> {
        neighbourhood(samples, width, height, |window| {
            (window.iter().map(|&v| v as u32).sum::<u32>() / 9) as u8
        })
    }

    /// 3x3 convolution with a row-major `mask`. Border pixels are copied.
    pub fn convolve(samples: &[u8], width: usize, height: usize, mask: &[f32; 9]) -> Vec<u8> {
        neighbourhood(samples, width, height, |window| {
            // window is column-major (x outer, y inner) like the kernel loop
            let mut acc = 0.0f32;
            for (k, &v) in window.iter().enumerate() {
                let (dx, dy) = (k / 3, k % 3);
                acc += v as f32 * mask[dx + dy * 3];
            }
            acc as u8
        })
    }

    fn neighbourhood<F>(samples: &[u8], width: usize, height: usize, f: F) -> Vec<u8>
    where
        F: Fn(&[u8; 9]) -> u8,
    {
        let plane = width * height;
        let mut out = samples.to_vec();
        if width < 3 || height < 3 {
            return out;
        }
        for c in 0..samples.len() / plane {
            for y in 1..height - 1 {
                for x in 1..width - 1 {
                    let mut window = [0u8; 9];
                    for dx in 0..3 {
                        for dy in 0..3 {
                            window[dx * 3 + dy] =
                                samples[(x + dx - 1) + (y + dy - 1) * width + c * plane];
                        }
                    }
                    out[x + y * width + c * plane] = f(&window);
                }
            }
        }
        out
    }
}
