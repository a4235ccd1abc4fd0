//! Image loading and saving for the image programs.
//!
//! Images are held planar (every sample of channel 0, then channel 1, ...)
//! because the kernels address `x + y * width + c * width * height`.
//! Samples are stored as `u16` whatever the source depth; the bit depth is
//! decided from the data, not from the file header.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageBuffer, Luma, Rgb, RgbImage};

use crate::error::{LabError, LabResult};

/// Largest width shown at native size in a comparison view.
const MAX_VIEW_WIDTH: u32 = 1024;
/// Largest height shown at native size in a comparison view.
const MAX_VIEW_HEIGHT: u32 = 768;

/// Sample depth of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    /// 8-bit when every sample fits in a byte.
    pub fn detect(samples: &[u16]) -> Self {
        match samples.iter().copied().max() {
            Some(max) if max > u8::MAX as u16 => BitDepth::Sixteen,
            _ => BitDepth::Eight,
        }
    }

    /// Histogram bin count: 256 or 65536.
    pub fn bin_count(self) -> usize {
        match self {
            BitDepth::Eight => 256,
            BitDepth::Sixteen => 65536,
        }
    }

    pub fn max_value(self) -> u32 {
        self.bin_count() as u32 - 1
    }

    pub fn bits(self) -> u32 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }
}

/// Scale factor that keeps a view inside 1024x768.
///
/// Wide images are fitted to 1000 pixels across, tall ones to 750 down.
pub fn display_scale(width: u32, height: u32) -> f32 {
    if width > MAX_VIEW_WIDTH {
        1000.0 / width as f32
    } else if height > MAX_VIEW_HEIGHT {
        750.0 / height as f32
    } else {
        1.0
    }
}

/// `<dir>/<stem>.ppm`.
pub fn image_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.ppm"))
}

/// Only PPM and PGM files can be written.
pub fn check_pnm_path(path: &Path) -> LabResult<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ppm" | "pgm") => Ok(()),
        _ => Err(LabError::invalid(format!(
            "{} is not a .ppm or .pgm path",
            path.display()
        ))),
    }
}

/// A planar image with 1 or 3 channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarImage {
    width: u32,
    height: u32,
    channels: usize,
    depth: BitDepth,
    samples: Vec<u16>,
}

impl PlanarImage {
    /// Build from planar samples. The bit depth is detected from the data.
    pub fn from_planar(
        width: u32,
        height: u32,
        channels: usize,
        samples: Vec<u16>,
    ) -> LabResult<Self> {
        if channels != 1 && channels != 3 {
            return Err(LabError::invalid(format!(
                "unsupported channel count {channels}"
            )));
        }
        let expected = width as usize * height as usize * channels;
        if samples.len() != expected {
            return Err(LabError::invalid(format!(
                "expected {expected} samples for {width}x{height}x{channels}, got {}",
                samples.len()
            )));
        }
        let depth = BitDepth::detect(&samples);
        Ok(Self {
            width,
            height,
            channels,
            depth,
            samples,
        })
    }

    /// Build from interleaved samples (`RGBRGB...` or grey).
    pub fn from_interleaved(
        width: u32,
        height: u32,
        channels: usize,
        interleaved: &[u16],
    ) -> LabResult<Self> {
        let plane = width as usize * height as usize;
        if channels == 0 || interleaved.len() != plane * channels {
            return Err(LabError::invalid(format!(
                "interleaved buffer of {} samples does not match {width}x{height}x{channels}",
                interleaved.len()
            )));
        }
        let mut samples = vec![0u16; interleaved.len()];
        for (i, px) in interleaved.chunks_exact(channels).enumerate() {
            for (c, &v) in px.iter().enumerate() {
                samples[c * plane + i] = v;
            }
        }
        Self::from_planar(width, height, channels, samples)
    }

    /// Read a PPM/PGM file. 8-bit and 16-bit files are accepted.
    pub fn load(path: &Path) -> LabResult<Self> {
        if !path.exists() {
            return Err(LabError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "image file not found"),
            ));
        }
        let dynamic = image::open(path)?;
        let (width, height) = dynamic.dimensions();
        let (channels, interleaved): (usize, Vec<u16>) = match dynamic {
            DynamicImage::ImageLuma8(buf) => (1, widen(buf.into_raw())),
            DynamicImage::ImageLuma16(buf) => (1, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (3, widen(buf.into_raw())),
            DynamicImage::ImageRgb16(buf) => (3, buf.into_raw()),
            other @ (DynamicImage::ImageLumaA16(_) | DynamicImage::ImageRgba16(_)) => {
                (3, other.to_rgb16().into_raw())
            }
            other => (3, widen(other.to_rgb8().into_raw())),
        };
        let image = Self::from_interleaved(width, height, channels, &interleaved)?;
        log::info!(
            "loaded {} ({}x{}, {} channel(s), {}-bit)",
            path.display(),
            width,
            height,
            channels,
            image.depth.bits()
        );
        Ok(image)
    }

    /// Write as PPM (3 channels) or PGM (1 channel) at the image's bit depth.
    ///
    /// A greyscale image asked to go to a `.ppm` path is written next to it
    /// as `.pgm`. Returns the path actually written.
    pub fn save(&self, path: &Path) -> LabResult<PathBuf> {
        let path = if self.channels == 1 && path.extension().is_some_and(|e| e == "ppm") {
            path.with_extension("pgm")
        } else {
            path.to_path_buf()
        };
        let path = path.as_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LabError::io(parent, e))?;
        }
        let raw = self.to_interleaved();
        let invalid = || LabError::invalid("sample buffer does not match image dimensions");
        match (self.depth, self.channels) {
            (BitDepth::Eight, 1) => {
                ImageBuffer::<Luma<u8>, _>::from_raw(self.width, self.height, narrow(&raw))
                    .ok_or_else(invalid)?
                    .save(path)?
            }
            (BitDepth::Eight, _) => {
                ImageBuffer::<Rgb<u8>, _>::from_raw(self.width, self.height, narrow(&raw))
                    .ok_or_else(invalid)?
                    .save(path)?
            }
            // the pnm encoder only takes 8-bit buffers
            (BitDepth::Sixteen, 1) => write_pnm16(path, "P5", self.width, self.height, &raw)?,
            (BitDepth::Sixteen, _) => write_pnm16(path, "P6", self.width, self.height, &raw)?,
        }
        log::info!("wrote {}", path.display());
        Ok(path.to_path_buf())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn depth(&self) -> BitDepth {
        self.depth
    }

    /// Number of samples (width * height * channels).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Planar samples.
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Planar samples narrowed to bytes. 16-bit images keep their top byte.
    pub fn samples_u8(&self) -> Vec<u8> {
        match self.depth {
            BitDepth::Eight => narrow(&self.samples),
            BitDepth::Sixteen => self.samples.iter().map(|&v| (v >> 8) as u8).collect(),
        }
    }

    /// Same geometry, new planar samples. The bit depth is kept from `self`
    /// so an equalised dark 16-bit image is still written as 16-bit.
    pub fn with_samples(&self, samples: Vec<u16>) -> LabResult<Self> {
        let mut out = Self::from_planar(self.width, self.height, self.channels, samples)?;
        if self.depth == BitDepth::Sixteen {
            out.depth = BitDepth::Sixteen;
        }
        Ok(out)
    }

    /// Same geometry, 8-bit planar samples.
    pub fn with_samples_u8(&self, samples: &[u8]) -> LabResult<Self> {
        let mut out = Self::from_planar(self.width, self.height, self.channels, widen_slice(samples))?;
        out.depth = BitDepth::Eight;
        Ok(out)
    }

    /// Samples in interleaved order.
    pub fn to_interleaved(&self) -> Vec<u16> {
        let plane = self.width as usize * self.height as usize;
        let mut out = Vec::with_capacity(self.samples.len());
        for i in 0..plane {
            for c in 0..self.channels {
                out.push(self.samples[c * plane + i]);
            }
        }
        out
    }

    /// 8-bit RGB view used for comparisons. Grey is replicated across
    /// channels, 16-bit samples keep their top byte.
    pub fn to_rgb8(&self) -> RgbImage {
        let plane = self.width as usize * self.height as usize;
        let shift = self.depth.bits() - 8;
        let mut raw = Vec::with_capacity(plane * 3);
        for i in 0..plane {
            for c in 0..3 {
                let channel = if self.channels == 1 { 0 } else { c };
                raw.push((self.samples[channel * plane + i] >> shift) as u8);
            }
        }
        RgbImage::from_raw(self.width, self.height, raw)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

/// Input and output side by side, each resized by the display scale.
pub fn side_by_side(input: &PlanarImage, output: &PlanarImage) -> RgbImage {
    let scale = display_scale(input.width(), input.height());
    let w = ((input.width() as f32 * scale) as u32).max(1);
    let h = ((input.height() as f32 * scale) as u32).max(1);

    let left = imageops::resize(&input.to_rgb8(), w, h, FilterType::Triangle);
    let right = imageops::resize(&output.to_rgb8(), w, h, FilterType::Triangle);

    let mut canvas = RgbImage::new(w * 2, h);
    imageops::replace(&mut canvas, &left, 0, 0);
    imageops::replace(&mut canvas, &right, w as i64, 0);
    canvas
}

/// Save the side-by-side comparison of `input` and `output` as PPM.
pub fn save_comparison(input: &PlanarImage, output: &PlanarImage, path: &Path) -> LabResult<()> {
    check_pnm_path(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LabError::io(parent, e))?;
    }
    side_by_side(input, output).save(path)?;
    log::info!("wrote comparison {}", path.display());
    Ok(())
}

/// Binary PNM with maxval 65535, samples big-endian.
fn write_pnm16(path: &Path, magic: &str, width: u32, height: u32, raw: &[u16]) -> LabResult<()> {
    let file = std::fs::File::create(path).map_err(|e| LabError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let mut body = Vec::with_capacity(raw.len() * 2);
    for &v in raw {
        body.extend_from_slice(&v.to_be_bytes());
    }
    write!(out, "{magic}\n{width} {height}\n65535\n")
        .and_then(|_| out.write_all(&body))
        .and_then(|_| out.flush())
        .map_err(|e| LabError::io(path, e))
}

fn widen(raw: Vec<u8>) -> Vec<u16> {
    widen_slice(&raw)
}

fn widen_slice(raw: &[u8]) -> Vec<u16> {
    raw.iter().map(|&v| u16::from(v)).collect()
}

fn narrow(samples: &[u16]) -> Vec<u8> {
    samples.iter().map(|&v| v.min(u8::MAX as u16) as u8).collect()
}
