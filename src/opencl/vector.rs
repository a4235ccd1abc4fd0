//! Element-wise vector arithmetic.

use super::*;

use crate::reference::VectorFunction;

/// Output of [`OpenClEngine::run_vector_function`].
#[derive(Debug, Clone)]
pub struct VectorResult {
    pub c: Vec<i32>,
    pub timeline: Timeline,
}

impl OpenClEngine {
    /// Compute `C` from `A` and `B` with the kernels of `function`.
    ///
    /// `A` and `B` must have the same length. `mult then add` runs two
    /// launches over the same output buffer.
    pub fn run_vector_function(
        &self,
        function: VectorFunction,
        a: &[i32],
        b: &[i32],
    ) -> LabResult<VectorResult> {
        if a.len() != b.len() {
            return Err(LabError::invalid(format!(
                "vector lengths differ: A has {}, B has {}",
                a.len(),
                b.len()
            )));
        }
        if a.is_empty() {
            return Ok(VectorResult {
                c: Vec::new(),
                timeline: Timeline::new(),
            });
        }

        let program = self.build_program("vector.cl", "")?;
        let len = a.len();

        let mut buffer_a = self.read_only_buffer::<cl_int>(len)?;
        let mut buffer_b = self.read_only_buffer::<cl_int>(len)?;
        // read-write: `mult then add` reads C back in its second launch
        let buffer_c = self.read_write_buffer::<cl_int>(len)?;

        let mut events = EventLog::new();
        events.record("A", Phase::Upload, self.upload(&mut buffer_a, a)?);
        events.record("B", Phase::Upload, self.upload(&mut buffer_b, b)?);

        for &name in function.kernels() {
            let kernel = self.kernel(&program, name)?;
            // The second launch of `mult then add` reads the first's output.
            let lhs = if name == "add" && function == VectorFunction::MultThenAdd {
                &buffer_c
            } else {
                &buffer_a
            };
            let event = unsafe {
                ExecuteKernel::new(&kernel)
                    .set_arg(lhs)
                    .set_arg(&buffer_b)
                    .set_arg(&buffer_c)
                    .set_global_work_size(len)
                    .enqueue_nd_range(&self.queue)?
            };
            events.record(name, Phase::Kernel, event);
        }

        let mut c = vec![0; len];
        events.record("C", Phase::Download, self.download(&buffer_c, &mut c)?);

        let timeline = events.into_timeline(&self.queue)?;
        timeline.log_steps(crate::profiling::Resolution::Us);
        Ok(VectorResult { c, timeline })
    }
}
