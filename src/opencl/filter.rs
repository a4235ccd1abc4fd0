//! Per-pixel and neighbourhood image filters.

use super::*;

use crate::image::PlanarImage;
use crate::plan::{ImageKernel, Mask};

/// Output of [`OpenClEngine::run_image_filter`].
#[derive(Debug, Clone)]
pub struct FilterResult {
    pub image: PlanarImage,
    pub timeline: Timeline,
}

impl OpenClEngine {
    /// Apply one `filter.cl` kernel to an image, 8 bits per sample.
    ///
    /// 16-bit images are reduced to their high byte first.
    pub fn run_image_filter(
        &self,
        image: &PlanarImage,
        kernel: ImageKernel,
        mask: Mask,
    ) -> LabResult<FilterResult> {
        kernel.check_channels(image.channels())?;
        let input = image.samples_u8();
        let len = input.len();

        let program = self.build_program("filter.cl", "")?;
        let cl_kernel = self.kernel(&program, kernel.kernel_name())?;

        let mut events = EventLog::new();
        let mut buffer_a = self.read_only_buffer::<u8>(len)?;
        let buffer_b = self.write_only_buffer::<u8>(len)?;
        events.record("image", Phase::Upload, self.upload(&mut buffer_a, &input)?);

        let event = if kernel.is_nd() {
            let sizes = [
                image.width() as usize,
                image.height() as usize,
                image.channels(),
            ];
            if kernel == ImageKernel::ConvolutionNd {
                let coefficients: Vec<cl_float> = mask.coefficients().to_vec();
                let mut buffer_mask = self.read_only_buffer::<cl_float>(coefficients.len())?;
                events.record("mask", Phase::Upload, self.upload(&mut buffer_mask, &coefficients)?);
                unsafe {
                    ExecuteKernel::new(&cl_kernel)
                        .set_arg(&buffer_a)
                        .set_arg(&buffer_b)
                        .set_arg(&buffer_mask)
                        .set_global_work_sizes(&sizes)
                        .enqueue_nd_range(&self.queue)?
                }
            } else {
                unsafe {
                    ExecuteKernel::new(&cl_kernel)
                        .set_arg(&buffer_a)
                        .set_arg(&buffer_b)
                        .set_global_work_sizes(&sizes)
                        .enqueue_nd_range(&self.queue)?
                }
            }
        } else {
            unsafe {
                ExecuteKernel::new(&cl_kernel)
                    .set_arg(&buffer_a)
                    .set_arg(&buffer_b)
                    .set_global_work_size(len)
                    .enqueue_nd_range(&self.queue)?
            }
        };
        events.record(kernel.kernel_name(), Phase::Kernel, event);

        let mut output = vec![0u8; len];
        events.record("image", Phase::Download, self.download(&buffer_b, &mut output)?);

        let timeline = events.into_timeline(&self.queue)?;
        timeline.log_steps(crate::profiling::Resolution::Us);
        Ok(FilterResult {
            image: image.with_samples_u8(&output)?,
            timeline,
        })
    }
}
