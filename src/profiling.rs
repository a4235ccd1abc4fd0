//! Profiling arithmetic for OpenCL commands.
//!
//! Device timestamps are nanoseconds. A command's life is split into the
//! time it sat in the queue, the time between submission and start, and the
//! execution time itself.

use std::fmt;

/// Unit used when printing profiling figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Ns,
    Us,
    Ms,
    S,
}

impl Resolution {
    fn divisor(self) -> u64 {
        match self {
            Resolution::Ns => 1,
            Resolution::Us => 1_000,
            Resolution::Ms => 1_000_000,
            Resolution::S => 1_000_000_000,
        }
    }

    /// Convert a nanosecond count to this unit, truncating.
    pub fn convert(self, ns: u64) -> u64 {
        ns / self.divisor()
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Resolution::Ns => "ns",
            Resolution::Us => "us",
            Resolution::Ms => "ms",
            Resolution::S => "s",
        }
    }
}

/// The four profiling timestamps of a completed command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfilingInfo {
    pub queued: u64,
    pub submitted: u64,
    pub started: u64,
    pub ended: u64,
}

impl ProfilingInfo {
    /// Execution time (end - start) in nanoseconds.
    pub fn elapsed_ns(&self) -> u64 {
        self.ended.saturating_sub(self.started)
    }

    /// Queue-to-end time in nanoseconds.
    pub fn total_ns(&self) -> u64 {
        self.ended.saturating_sub(self.queued)
    }

    /// `Queued X, Submitted Y, Executed Z, Total W [unit]`.
    pub fn breakdown(&self, resolution: Resolution) -> String {
        format!(
            "Queued {}, Submitted {}, Executed {}, Total {} [{}]",
            resolution.convert(self.submitted.saturating_sub(self.queued)),
            resolution.convert(self.started.saturating_sub(self.submitted)),
            resolution.convert(self.elapsed_ns()),
            resolution.convert(self.total_ns()),
            resolution.suffix()
        )
    }
}

/// Which part of a pipeline a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Upload,
    Kernel,
    Download,
}

/// A named, profiled command.
#[derive(Debug, Clone)]
pub struct Step {
    pub label: String,
    pub phase: Phase,
    pub info: ProfilingInfo,
}

/// Ordered record of every profiled command of one program run.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    steps: Vec<Step>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, phase: Phase, info: ProfilingInfo) {
        self.steps.push(Step {
            label: label.into(),
            phase,
            info,
        });
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Sum of execution times of every step in `phase`, in nanoseconds.
    pub fn phase_ns(&self, phase: Phase) -> u64 {
        self.steps
            .iter()
            .filter(|s| s.phase == phase)
            .map(|s| s.info.elapsed_ns())
            .sum()
    }

    pub fn total_ns(&self) -> u64 {
        self.steps.iter().map(|s| s.info.elapsed_ns()).sum()
    }

    /// Execution time of the first step carrying `label`.
    pub fn step_ns(&self, label: &str) -> Option<u64> {
        self.steps
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.info.elapsed_ns())
    }

    /// The last kernel launch, if any.
    pub fn last_kernel(&self) -> Option<&Step> {
        self.steps.iter().rev().find(|s| s.phase == Phase::Kernel)
    }

    /// Log every step at debug level with its detailed breakdown.
    pub fn log_steps(&self, resolution: Resolution) {
        for step in &self.steps {
            log::debug!(
                "{:?} {}: {}",
                step.phase,
                step.label,
                step.info.breakdown(resolution)
            );
        }
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let upload = self.phase_ns(Phase::Upload);
        let kernel = self.phase_ns(Phase::Kernel);
        let download = self.phase_ns(Phase::Download);
        writeln!(f, "Memory upload time: {upload} ns")?;
        writeln!(f, "Kernel execution time: {kernel} ns")?;
        writeln!(f, "Memory download time: {download} ns")?;
        writeln!(f, "Memory transfer time: {} ns", upload + download)?;
        write!(f, "Program execution time: {} ns", upload + kernel + download)
    }
}
