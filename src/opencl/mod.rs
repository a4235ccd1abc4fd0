//! OpenCL host engine.
//!
//! Every program follows the same steps: select a platform/device pair,
//! create a context and a profiling command queue, build a kernel file read
//! from the kernels directory, allocate buffers, enqueue a fixed sequence of
//! launches and read the results back.
//!
//! ```text
//! ┌──────────────┐  upload   ┌──────────────────┐  download  ┌─────────────┐
//! │  Host (CPU)  │──────────▶│  OpenCL device   │───────────▶│ Host (CPU)  │
//! │  image/vec   │           │  fixed pipeline  │            │ print/save  │
//! └──────────────┘           └──────────────────┘            └─────────────┘
//! ```
//!
//! The pipelines live in the submodules, each as an `impl OpenClEngine`
//! block.

use std::fs;
use std::path::{Path, PathBuf};
use std::ptr;

use opencl3::command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE};
use opencl3::context::Context;
use opencl3::device::{Device, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_CPU, CL_DEVICE_TYPE_GPU};
use opencl3::event::Event;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY};
use opencl3::platform::{get_platforms, Platform};
use opencl3::program::Program;
use opencl3::types::{cl_device_type, cl_float, cl_int, cl_mem_flags, cl_uint, CL_BLOCKING};

use crate::error::{LabError, LabResult};
use crate::profiling::{Phase, ProfilingInfo, Timeline};

pub mod filter;
pub mod histeq;
pub mod reduce;
pub mod scan;
pub mod vector;

/// `CL_BUILD_ERROR`, reported when the driver cannot tell us the status.
const BUILD_STATUS_ERROR: cl_int = -2;

/// Which platform and device to run on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceSelection {
    pub platform: usize,
    pub device: usize,
}

fn device_type_name(dev_type: cl_device_type) -> &'static str {
    if dev_type & CL_DEVICE_TYPE_GPU != 0 {
        "GPU"
    } else if dev_type & CL_DEVICE_TYPE_CPU != 0 {
        "CPU"
    } else {
        "other"
    }
}

/// Describe every platform and its devices, one line each.
pub fn list_platforms_devices() -> LabResult<String> {
    let platforms = get_platforms()?;
    let mut out = format!("Found {} platform(s):", platforms.len());
    for (p, platform) in platforms.iter().enumerate() {
        out.push_str(&format!(
            "\nPlatform {p}, {}, version: {}, vendor: {}",
            platform.name().unwrap_or_default().trim(),
            platform.version().unwrap_or_default().trim(),
            platform.vendor().unwrap_or_default().trim()
        ));
        let ids = platform.get_devices(CL_DEVICE_TYPE_ALL).unwrap_or_default();
        for (d, id) in ids.into_iter().enumerate() {
            let dev = Device::new(id);
            out.push_str(&format!(
                "\n  Device {d}, {}, {}, version: {}, compute units: {}, max work-group size: {}",
                dev.name().unwrap_or_default().trim(),
                device_type_name(dev.dev_type().unwrap_or(0)),
                dev.version().unwrap_or_default().trim(),
                dev.max_compute_units().unwrap_or(0),
                dev.max_work_group_size().unwrap_or(0)
            ));
        }
    }
    Ok(out)
}

/// Return the number of OpenCL devices across all platforms.
///
/// Returns 0 when no OpenCL runtime is installed.
pub fn device_count() -> usize {
    get_platforms()
        .map(|platforms| {
            platforms
                .iter()
                .map(|p| p.get_devices(CL_DEVICE_TYPE_ALL).map(|d| d.len()).unwrap_or(0))
                .sum()
        })
        .unwrap_or(0)
}

/// Read the four profiling timestamps of a completed event.
pub fn profiling_info(event: &Event) -> LabResult<ProfilingInfo> {
    Ok(ProfilingInfo {
        queued: event.profiling_command_queued()?,
        submitted: event.profiling_command_submit()?,
        started: event.profiling_command_start()?,
        ended: event.profiling_command_end()?,
    })
}

/// Events recorded during a pipeline, resolved into a [`Timeline`] once the
/// queue has drained.
#[derive(Default)]
pub(crate) struct EventLog {
    entries: Vec<(String, Phase, Event)>,
}

impl EventLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, label: impl Into<String>, phase: Phase, event: Event) {
        self.entries.push((label.into(), phase, event));
    }

    /// Wait for the queue and read profiling data for every event.
    pub(crate) fn into_timeline(self, queue: &CommandQueue) -> LabResult<Timeline> {
        queue.finish()?;
        let mut timeline = Timeline::new();
        for (label, phase, event) in &self.entries {
            timeline.push(label.clone(), *phase, profiling_info(event)?);
        }
        Ok(timeline)
    }
}

/// OpenCL compute engine.
///
/// Owns the selected device, its context and a profiling-enabled in-order
/// queue. Kernel files are read from `kernels_dir` when a pipeline builds
/// its program.
pub struct OpenClEngine {
    device: Device,
    context: Context,
    queue: CommandQueue,
    platform_name: String,
    device_name: String,
    max_work_group_size: usize,
    kernels_dir: PathBuf,
}

impl std::fmt::Debug for OpenClEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenClEngine")
            .field("platform_name", &self.platform_name)
            .field("device_name", &self.device_name)
            .field("max_work_group_size", &self.max_work_group_size)
            .field("kernels_dir", &self.kernels_dir)
            .finish_non_exhaustive()
    }
}

impl OpenClEngine {
    /// Create an engine on the given platform/device pair.
    pub fn new(selection: DeviceSelection, kernels_dir: impl Into<PathBuf>) -> LabResult<Self> {
        let platforms = get_platforms()?;
        let platform: &Platform = platforms
            .get(selection.platform)
            .ok_or(LabError::PlatformNotFound(selection.platform))?;
        let ids = platform.get_devices(CL_DEVICE_TYPE_ALL)?;
        let id = *ids.get(selection.device).ok_or(LabError::DeviceNotFound {
            platform: selection.platform,
            device: selection.device,
        })?;

        let device = Device::new(id);
        let context = Context::from_device(&device)?;
        // The 1.2 entry point keeps older drivers working.
        #[allow(deprecated)]
        let queue = CommandQueue::create_default(&context, CL_QUEUE_PROFILING_ENABLE)?;

        let platform_name = platform.name().unwrap_or_default().trim().to_string();
        let device_name = device.name().unwrap_or_default().trim().to_string();
        let max_work_group_size = device.max_work_group_size().unwrap_or(1);

        log::debug!(
            "context ready on {platform_name} / {device_name} (max work-group size {max_work_group_size})"
        );

        Ok(OpenClEngine {
            device,
            context,
            queue,
            platform_name,
            device_name,
            max_work_group_size,
            kernels_dir: kernels_dir.into(),
        })
    }

    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn max_work_group_size(&self) -> usize {
        self.max_work_group_size
    }

    pub fn kernels_dir(&self) -> &Path {
        &self.kernels_dir
    }

    /// Work-group size used when the caller doesn't pick one.
    pub fn default_local_size(&self) -> usize {
        crate::vector::default_local_size(self.max_work_group_size)
    }

    /// Read `file` from the kernels directory and build it.
    ///
    /// On a build failure the status, options and log are reported at error
    /// level before the error is returned.
    pub fn build_program(&self, file: &str, options: &str) -> LabResult<Program> {
        let path = self.kernels_dir.join(file);
        let source = fs::read_to_string(&path).map_err(|e| LabError::io(&path, e))?;

        #[allow(unused_mut)]
        let mut program = Program::create_from_source(&self.context, &source)?;
        if let Err(err) = program.build(self.context.devices(), options) {
            let id = self.device.id();
            let status = program.get_build_status(id).unwrap_or(BUILD_STATUS_ERROR);
            let build_options = program.get_build_options(id).unwrap_or_default();
            let build_log = program.get_build_log(id).unwrap_or_default();
            log::error!("Build Status: {status}");
            log::error!("Build Options:\t{build_options}");
            log::error!("Build Log:\t{build_log}");
            log::debug!("build of {} failed with {err}", path.display());
            return Err(LabError::Build {
                kernel_file: path.display().to_string(),
                status,
                options: build_options,
                log: build_log,
            });
        }
        log::debug!("built {} with options \"{options}\"", path.display());
        Ok(program)
    }

    pub(crate) fn kernel(&self, program: &Program, name: &str) -> LabResult<Kernel> {
        Ok(Kernel::create(program, name)?)
    }

    /// Allocate a device buffer of `len` elements (at least one).
    pub(crate) fn create_buffer<T>(&self, flags: cl_mem_flags, len: usize) -> LabResult<Buffer<T>> {
        let buffer = unsafe { Buffer::<T>::create(&self.context, flags, len.max(1), ptr::null_mut())? };
        Ok(buffer)
    }

    pub(crate) fn read_only_buffer<T>(&self, len: usize) -> LabResult<Buffer<T>> {
        self.create_buffer(CL_MEM_READ_ONLY, len)
    }

    pub(crate) fn write_only_buffer<T>(&self, len: usize) -> LabResult<Buffer<T>> {
        self.create_buffer(CL_MEM_WRITE_ONLY, len)
    }

    pub(crate) fn read_write_buffer<T>(&self, len: usize) -> LabResult<Buffer<T>> {
        self.create_buffer(CL_MEM_READ_WRITE, len)
    }

    /// Blocking host-to-device copy.
    pub(crate) fn upload<T>(&self, buffer: &mut Buffer<T>, data: &[T]) -> LabResult<Event> {
        let event = unsafe {
            self.queue
                .enqueue_write_buffer(buffer, CL_BLOCKING, 0, data, &[])?
        };
        Ok(event)
    }

    /// Zero the first `len` elements of a buffer.
    pub(crate) fn fill_zero<T: Copy + Default>(
        &self,
        buffer: &mut Buffer<T>,
        len: usize,
    ) -> LabResult<Event> {
        let pattern = [T::default()];
        let bytes = len.max(1) * std::mem::size_of::<T>();
        let event = unsafe {
            self.queue
                .enqueue_fill_buffer(buffer, &pattern, 0, bytes, &[])?
        };
        Ok(event)
    }

    /// Blocking device-to-host copy of `out.len()` elements.
    pub(crate) fn download<T>(&self, buffer: &Buffer<T>, out: &mut [T]) -> LabResult<Event> {
        let event = unsafe {
            self.queue
                .enqueue_read_buffer(buffer, CL_BLOCKING, 0, out, &[])?
        };
        Ok(event)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
