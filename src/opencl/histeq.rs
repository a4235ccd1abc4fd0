//! Histogram equalisation pipeline.
//!
//! ```text
//! image ──▶ histogram ──▶ cumulative ──▶ lut ──▶ remap ──▶ output
//!              H              CH          LUT
//! ```
//!
//! The histogram and cumulative stages each have more than one kernel; a
//! [`HistEqPlan`] picks them from the mode and the image bit depth.

use super::*;

use crate::image::{BitDepth, PlanarImage};
use crate::plan::{
    histeq_build_options, scan_build_options, CumulativeStage, HistEqMode, HistEqPlan,
    HistogramStage,
};
use crate::reference::{lut_scale, Equalisation};
use crate::vector::group_count;

/// Sample types the kernels are built for.
///
/// `histeq.cl` is compiled with the matching `-DPIXEL` type.
pub trait Pixel: Copy + Default + 'static {
    fn from_sample(sample: u16) -> Self;
    fn to_sample(self) -> u16;
}

impl Pixel for u8 {
    fn from_sample(sample: u16) -> Self {
        sample.min(u8::MAX as u16) as u8
    }

    fn to_sample(self) -> u16 {
        u16::from(self)
    }
}

impl Pixel for u16 {
    fn from_sample(sample: u16) -> Self {
        sample
    }

    fn to_sample(self) -> u16 {
        self
    }
}

/// Output of [`OpenClEngine::run_histeq`].
#[derive(Debug, Clone)]
pub struct EqualisationResult {
    pub plan: HistEqPlan,
    /// H, CH, LUT and the remapped samples.
    pub equalisation: Equalisation,
    /// The equalised image, same geometry and depth as the input.
    pub image: PlanarImage,
    pub timeline: Timeline,
}

impl OpenClEngine {
    /// Equalise `image` with the kernels chosen for `mode`.
    pub fn run_histeq(&self, image: &PlanarImage, mode: HistEqMode) -> LabResult<EqualisationResult> {
        if image.is_empty() {
            return Err(LabError::invalid("image has no samples"));
        }
        let depth = image.depth();
        let plan = HistEqPlan::new(mode, depth);
        if plan.fell_back {
            log::warn!(
                "{} bins don't fit local memory, using the global histogram",
                depth.bin_count()
            );
        }

        let (equalisation, timeline) = match depth {
            BitDepth::Eight => self.equalise::<u8>(image.samples(), depth, plan)?,
            BitDepth::Sixteen => self.equalise::<u16>(image.samples(), depth, plan)?,
        };
        let image = image.with_samples(equalisation.output.clone())?;
        Ok(EqualisationResult {
            plan,
            equalisation,
            image,
            timeline,
        })
    }

    fn equalise<P: Pixel>(
        &self,
        samples: &[u16],
        depth: BitDepth,
        plan: HistEqPlan,
    ) -> LabResult<(Equalisation, Timeline)> {
        let bins = depth.bin_count();
        let n = samples.len();
        let pixels: Vec<P> = samples.iter().map(|&s| P::from_sample(s)).collect();

        let program = self.build_program("histeq.cl", &histeq_build_options(depth))?;
        let local_size = self.default_local_size();
        let n_arg = n as cl_uint;

        let mut events = EventLog::new();
        let mut image_buf = self.read_only_buffer::<P>(n)?;
        let mut hist_buf = self.read_write_buffer::<cl_uint>(bins)?;
        let mut cum_buf = self.read_write_buffer::<cl_uint>(bins)?;
        let mut lut_buf = self.read_write_buffer::<cl_uint>(bins)?;
        let output_buf = self.write_only_buffer::<P>(n)?;

        events.record("image", Phase::Upload, self.upload(&mut image_buf, &pixels)?);
        events.record("H fill", Phase::Upload, self.fill_zero(&mut hist_buf, bins)?);
        events.record("CH fill", Phase::Upload, self.fill_zero(&mut cum_buf, bins)?);
        events.record("LUT fill", Phase::Upload, self.fill_zero(&mut lut_buf, bins)?);

        // 1. histogram
        let event = match plan.histogram {
            HistogramStage::Global => {
                let kernel = self.kernel(&program, "histogram_global")?;
                unsafe {
                    ExecuteKernel::new(&kernel)
                        .set_arg(&image_buf)
                        .set_arg(&hist_buf)
                        .set_arg(&n_arg)
                        .set_global_work_size(n)
                        .enqueue_nd_range(&self.queue)?
                }
            }
            HistogramStage::Local => {
                let kernel = self.kernel(&program, "histogram_local")?;
                unsafe {
                    ExecuteKernel::new(&kernel)
                        .set_arg(&image_buf)
                        .set_arg(&hist_buf)
                        .set_arg_local_buffer(bins * std::mem::size_of::<cl_uint>())
                        .set_arg(&n_arg)
                        .set_global_work_size(group_count(n, local_size) * local_size)
                        .set_local_work_size(local_size)
                        .enqueue_nd_range(&self.queue)?
                }
            }
        };
        events.record("histogram", Phase::Kernel, event);

        // 2. cumulative histogram
        match plan.cumulative {
            CumulativeStage::Gather => {
                let kernel = self.kernel(&program, "cumulative_gather")?;
                let bins_arg = bins as cl_uint;
                let event = unsafe {
                    ExecuteKernel::new(&kernel)
                        .set_arg(&hist_buf)
                        .set_arg(&cum_buf)
                        .set_arg(&bins_arg)
                        .set_global_work_size(bins)
                        .enqueue_nd_range(&self.queue)?
                };
                events.record("cumulative_gather", Phase::Kernel, event);
            }
            CumulativeStage::HillisSteele => {
                let scan = self.build_program("scan.cl", scan_build_options(true))?;
                self.hillis_steele_passes::<cl_uint>(&scan, &hist_buf, &cum_buf, bins, &mut events)?;
            }
            CumulativeStage::BlockScan => {
                let scan = self.build_program("scan.cl", scan_build_options(true))?;
                self.block_scan::<cl_uint>(&scan, &hist_buf, &cum_buf, bins, local_size, 0, &mut events)?;
            }
        }

        // 3. look-up table
        let scale: cl_float = lut_scale(bins, n);
        let kernel = self.kernel(&program, "lut")?;
        let event = unsafe {
            ExecuteKernel::new(&kernel)
                .set_arg(&cum_buf)
                .set_arg(&lut_buf)
                .set_arg(&scale)
                .set_global_work_size(bins)
                .enqueue_nd_range(&self.queue)?
        };
        events.record("lut", Phase::Kernel, event);

        // 4. remap
        let kernel = self.kernel(&program, "remap")?;
        let event = unsafe {
            ExecuteKernel::new(&kernel)
                .set_arg(&image_buf)
                .set_arg(&lut_buf)
                .set_arg(&output_buf)
                .set_arg(&n_arg)
                .set_global_work_size(n)
                .enqueue_nd_range(&self.queue)?
        };
        events.record("remap", Phase::Kernel, event);

        let mut histogram = vec![0u32; bins];
        let mut cumulative = vec![0u32; bins];
        let mut lut = vec![0u32; bins];
        let mut output = vec![P::default(); n];
        events.record("H", Phase::Download, self.download(&hist_buf, &mut histogram)?);
        events.record("CH", Phase::Download, self.download(&cum_buf, &mut cumulative)?);
        events.record("LUT", Phase::Download, self.download(&lut_buf, &mut lut)?);
        events.record("image", Phase::Download, self.download(&output_buf, &mut output)?);

        let timeline = events.into_timeline(&self.queue)?;
        timeline.log_steps(crate::profiling::Resolution::Us);

        let equalisation = Equalisation {
            histogram,
            cumulative,
            lut,
            output: output.into_iter().map(Pixel::to_sample).collect(),
        };
        Ok((equalisation, timeline))
    }
}
