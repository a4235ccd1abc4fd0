//! Error type shared by the library and every binary.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout cllab.
pub type LabResult<T> = Result<T, LabError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LabError {
    /// An OpenCL call failed. The wrapped error carries the numeric code.
    #[cfg(feature = "opencl")]
    #[error("OpenCL error {}: {0}", cl_code(.0))]
    OpenCl(#[from] opencl3::error_codes::ClError),

    /// Kernel source failed to compile.
    #[error("failed to build {kernel_file} (status {status}, options \"{options}\")")]
    Build {
        kernel_file: String,
        status: i32,
        options: String,
        log: String,
    },

    /// Image decode or encode failure.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("platform {0} not found")]
    PlatformNotFound(usize),

    #[error("device {device} not found on platform {platform}")]
    DeviceNotFound { platform: usize, device: usize },

    /// Host-side validation of user input failed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(feature = "opencl")]
fn cl_code(err: &opencl3::error_codes::ClError) -> i32 {
    err.0
}

impl LabError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
