pub mod cli;
pub mod error;
pub mod image;
pub mod plan;
pub mod profiling;
pub mod reference;
pub mod vector;

#[cfg(feature = "opencl")]
pub mod opencl;

pub use error::{LabError, LabResult};

/// Initialise the `env_logger` backend.
///
/// `RUST_LOG` takes precedence. Without it the level is derived from the
/// number of `-v` flags: info, then debug, then trace.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
