//! Reduction, histogram and per-group scan kernels on `int` vectors.

use super::*;

use crate::plan::ReduceKernel;
use crate::vector::pad_to_multiple;

/// Output of [`OpenClEngine::run_reduce`].
#[derive(Debug, Clone)]
pub struct ReduceResult {
    /// The input as uploaded, padded when the kernel needs it.
    pub input: Vec<i32>,
    pub output: Vec<i32>,
    pub timeline: Timeline,
}

impl OpenClEngine {
    /// Launch one `reduce.cl` kernel over `input`.
    ///
    /// Reductions and scans pad the input with zeros to a multiple of
    /// `local_size`. Histograms use `bins` output bins and run unpadded.
    pub fn run_reduce(
        &self,
        kernel: ReduceKernel,
        input: &[i32],
        local_size: usize,
        bins: usize,
    ) -> LabResult<ReduceResult> {
        if input.is_empty() {
            return Err(LabError::invalid("input vector is empty"));
        }
        if kernel.uses_local_size() && (local_size == 0 || local_size > self.max_work_group_size) {
            return Err(LabError::invalid(format!(
                "local size {local_size} must be between 1 and {}",
                self.max_work_group_size
            )));
        }
        if kernel.is_histogram() && bins == 0 {
            return Err(LabError::invalid("histogram needs at least one bin"));
        }
        // hist_1 indexes the bins directly
        if kernel == ReduceKernel::Hist1 && input.iter().any(|&v| v < 0 || v as usize >= bins) {
            return Err(LabError::invalid(format!(
                "hist-1 needs every value in 0..{bins}; use hist-2 to clamp"
            )));
        }

        let mut padded = input.to_vec();
        if kernel.needs_padding() {
            pad_to_multiple(&mut padded, local_size, 0);
        }
        let len = padded.len();
        let output_len = kernel.output_len(len, bins);
        log::debug!(
            "{}: {} elements ({} padded), output {output_len}",
            kernel.kernel_name(),
            input.len(),
            len
        );

        let program = self.build_program("reduce.cl", "")?;
        let cl_kernel = self.kernel(&program, kernel.kernel_name())?;

        let mut events = EventLog::new();
        let mut buffer_a = self.read_only_buffer::<cl_int>(len)?;
        let mut buffer_b = self.read_write_buffer::<cl_int>(output_len)?;
        events.record("A", Phase::Upload, self.upload(&mut buffer_a, &padded)?);
        events.record("B fill", Phase::Upload, self.fill_zero(&mut buffer_b, output_len)?);

        let local_bytes = local_size * std::mem::size_of::<cl_int>();
        let nr_bins = bins as cl_int;
        let event = unsafe {
            let mut exec = ExecuteKernel::new(&cl_kernel);
            exec.set_arg(&buffer_a).set_arg(&buffer_b);
            for _ in 0..kernel.local_buffers() {
                exec.set_arg_local_buffer(local_bytes);
            }
            if kernel.binds_bin_count() {
                exec.set_arg(&nr_bins);
            }
            exec.set_global_work_size(len);
            if kernel.uses_local_size() {
                exec.set_local_work_size(local_size);
            }
            exec.enqueue_nd_range(&self.queue)?
        };
        events.record(kernel.kernel_name(), Phase::Kernel, event);

        let mut output = vec![0; output_len];
        events.record("B", Phase::Download, self.download(&buffer_b, &mut output)?);

        let timeline = events.into_timeline(&self.queue)?;
        timeline.log_steps(crate::profiling::Resolution::Us);
        Ok(ReduceResult {
            input: padded,
            output,
            timeline,
        })
    }
}
