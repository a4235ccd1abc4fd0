//! Prefix sums on the device.
//!
//! The single-group scans (Hillis-Steele, Blelloch) run in one launch. The
//! multi-stage block scan handles any length:
//!
//! ```text
//! level 0   [ block 0 | block 1 | block 2 | ... ]  scan_block
//!                 │         │         │
//! level 1   [  s0   ,   s1   ,   s2   , ... ]      scanned recursively
//!                           │         │
//! level 0   [ block 0 | +s0     | +s0+s1  | ... ]  add_block_offsets
//! ```

use super::*;

use crate::plan::{block_scan_levels, scan_build_options, ScanMode};
use crate::vector::{group_count, hillis_steele_passes, pad_to_power_of_two};

/// Output of [`OpenClEngine::run_scan`].
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Scan of the input, same length as the input.
    pub output: Vec<i32>,
    pub timeline: Timeline,
}

impl OpenClEngine {
    /// Prefix sum of `input` with the chosen strategy.
    ///
    /// `local_size` only applies to [`ScanMode::BlockScan`]; `None` picks
    /// [`OpenClEngine::default_local_size`].
    pub fn run_scan(
        &self,
        mode: ScanMode,
        input: &[i32],
        local_size: Option<usize>,
    ) -> LabResult<ScanResult> {
        if input.is_empty() {
            return Ok(ScanResult {
                output: Vec::new(),
                timeline: Timeline::new(),
            });
        }

        let mut data = input.to_vec();
        if mode == ScanMode::Blelloch {
            pad_to_power_of_two(&mut data, 0);
        }
        mode.check_length(data.len(), self.max_work_group_size)?;
        let len = data.len();

        let program = self.build_program("scan.cl", scan_build_options(false))?;
        let mut events = EventLog::new();
        let mut buffer_a = self.read_write_buffer::<cl_int>(len)?;
        events.record("A", Phase::Upload, self.upload(&mut buffer_a, &data)?);

        let mut output = vec![0; len];
        match mode {
            ScanMode::HillisSteele => {
                let mut buffer_b = self.read_write_buffer::<cl_int>(len)?;
                events.record("B fill", Phase::Upload, self.fill_zero(&mut buffer_b, len)?);
                let kernel = self.kernel(&program, "scan_hs")?;
                let event = unsafe {
                    ExecuteKernel::new(&kernel)
                        .set_arg(&buffer_a)
                        .set_arg(&buffer_b)
                        .set_global_work_size(len)
                        .set_local_work_size(len)
                        .enqueue_nd_range(&self.queue)?
                };
                events.record("scan_hs", Phase::Kernel, event);

                let result = if crate::plan::hillis_steele_result_in_second(len) {
                    &buffer_b
                } else {
                    &buffer_a
                };
                events.record("result", Phase::Download, self.download(result, &mut output)?);
            }
            ScanMode::Blelloch => {
                let kernel = self.kernel(&program, "scan_bl")?;
                let event = unsafe {
                    ExecuteKernel::new(&kernel)
                        .set_arg(&buffer_a)
                        .set_global_work_size(len)
                        .set_local_work_size(len)
                        .enqueue_nd_range(&self.queue)?
                };
                events.record("scan_bl", Phase::Kernel, event);
                events.record("result", Phase::Download, self.download(&buffer_a, &mut output)?);
            }
            ScanMode::BlockScan => {
                let local = local_size.unwrap_or_else(|| self.default_local_size());
                self.check_scan_local_size(local)?;
                log::debug!("block scan levels {:?}", block_scan_levels(len, local));
                self.block_scan::<cl_int>(&program, &buffer_a, &buffer_a, len, local, 0, &mut events)?;
                events.record("result", Phase::Download, self.download(&buffer_a, &mut output)?);
            }
        }

        output.truncate(input.len());
        let timeline = events.into_timeline(&self.queue)?;
        timeline.log_steps(crate::profiling::Resolution::Us);
        Ok(ScanResult { output, timeline })
    }

    /// Block scans rely on `local_size` being a power of two that fits the
    /// device.
    pub(crate) fn check_scan_local_size(&self, local_size: usize) -> LabResult<()> {
        if !local_size.is_power_of_two() || local_size > self.max_work_group_size {
            return Err(LabError::invalid(format!(
                "local size {local_size} must be a power of two no larger than {}",
                self.max_work_group_size
            )));
        }
        Ok(())
    }

    /// Inclusive scan of the first `len` elements of `input` into `output`.
    /// The two may be the same buffer.
    ///
    /// `program` must be `scan.cl` built for the element type `T`. Each level
    /// allocates its own block-sum buffer; OpenCL keeps a released buffer
    /// alive until the commands using it have finished.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn block_scan<T>(
        &self,
        program: &Program,
        input: &Buffer<T>,
        output: &Buffer<T>,
        len: usize,
        local_size: usize,
        level: usize,
        events: &mut EventLog,
    ) -> LabResult<()> {
        let groups = group_count(len, local_size);
        let global = groups * local_size;
        let block_sums = self.read_write_buffer::<T>(groups)?;
        let local_bytes = local_size * std::mem::size_of::<T>();
        let n = len as cl_uint;

        let scan_block = self.kernel(program, "scan_block")?;
        let event = unsafe {
            ExecuteKernel::new(&scan_block)
                .set_arg(input)
                .set_arg(output)
                .set_arg(&block_sums)
                .set_arg_local_buffer(local_bytes)
                .set_arg_local_buffer(local_bytes)
                .set_arg(&n)
                .set_global_work_size(global)
                .set_local_work_size(local_size)
                .enqueue_nd_range(&self.queue)?
        };
        events.record(format!("scan_block L{level}"), Phase::Kernel, event);

        if groups > 1 {
            self.block_scan::<T>(
                program,
                &block_sums,
                &block_sums,
                groups,
                local_size,
                level + 1,
                events,
            )?;

            let add_offsets = self.kernel(program, "add_block_offsets")?;
            let event = unsafe {
                ExecuteKernel::new(&add_offsets)
                    .set_arg(output)
                    .set_arg(&block_sums)
                    .set_arg(&n)
                    .set_global_work_size(global)
                    .set_local_work_size(local_size)
                    .enqueue_nd_range(&self.queue)?
            };
            events.record(format!("add_block_offsets L{level}"), Phase::Kernel, event);
        }
        Ok(())
    }

    /// Inclusive scan of `src` into `dst` with one global Hillis-Steele
    /// launch per stride.
    ///
    /// Intermediate passes alternate between `dst` and a scratch buffer,
    /// ordered so the last pass writes `dst`. `src` is left untouched.
    pub(crate) fn hillis_steele_passes<T>(
        &self,
        program: &Program,
        src: &Buffer<T>,
        dst: &Buffer<T>,
        len: usize,
        events: &mut EventLog,
    ) -> LabResult<()> {
        let passes = hillis_steele_passes(len);
        let scratch = self.read_write_buffer::<T>(len)?;
        let step = self.kernel(program, "scan_hs_step")?;
        let n = len as cl_uint;

        if passes == 0 {
            // a single element is its own scan: one pass with a stride past it
            let stride: cl_uint = 1;
            let event = unsafe {
                ExecuteKernel::new(&step)
                    .set_arg(src)
                    .set_arg(dst)
                    .set_arg(&stride)
                    .set_arg(&n)
                    .set_global_work_size(len)
                    .enqueue_nd_range(&self.queue)?
            };
            events.record("scan_hs_step 1", Phase::Kernel, event);
            return Ok(());
        }

        let mut input = src;
        for pass in 0..passes {
            let output = if (passes - 1 - pass) % 2 == 0 {
                dst
            } else {
                &scratch
            };
            let stride: cl_uint = 1 << pass;
            let event = unsafe {
                ExecuteKernel::new(&step)
                    .set_arg(input)
                    .set_arg(output)
                    .set_arg(&stride)
                    .set_arg(&n)
                    .set_global_work_size(len)
                    .enqueue_nd_range(&self.queue)?
            };
            events.record(format!("scan_hs_step {stride}"), Phase::Kernel, event);
            input = output;
        }
        Ok(())
    }
}
