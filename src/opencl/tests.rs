use super::*;

use crate::image::{BitDepth, PlanarImage};
use crate::plan::{HistEqMode, ImageKernel, Mask, ReduceKernel, ScanMode};
use crate::reference::{self, VectorFunction};

fn kernels_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("kernels")
}

/// Engine on the first device, or `None` when there isn't one.
fn engine() -> Option<OpenClEngine> {
    if device_count() == 0 {
        return None;
    }
    match OpenClEngine::new(DeviceSelection::default(), kernels_dir()) {
        Ok(engine) => Some(engine),
        Err(LabError::OpenCl(_)) => None,
        Err(e) => panic!("Unexpected error: {:?}", e),
    }
}

/// Deterministic pseudo-random values in `0..modulus`.
fn lcg(len: usize, modulus: u32, seed: u32) -> Vec<u32> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) % modulus
        })
        .collect()
}

fn rgb_image(width: u32, height: u32, max: u32, seed: u32) -> PlanarImage {
    let len = (width * height * 3) as usize;
    let samples = lcg(len, max + 1, seed).into_iter().map(|v| v as u16).collect();
    PlanarImage::from_planar(width, height, 3, samples).unwrap()
}

fn assert_close(actual: &[u8], expected: &[u8], tolerance: u8) {
    assert_eq!(actual.len(), expected.len());
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        assert!(a.abs_diff(e) <= tolerance, "sample {i}: got {a}, expected {e}");
    }
}

#[test]
fn test_device_count_does_not_panic() {
    let count = device_count();
    let _ = count;
}

#[test]
fn test_engine_creation() {
    let Some(engine) = engine() else { return };
    assert!(!engine.device_name().is_empty());
    assert!(engine.max_work_group_size() > 0);
    assert!(engine.default_local_size().is_power_of_two());
    assert!(engine.default_local_size() <= 256);
}

#[test]
fn test_list_platforms_devices() {
    if device_count() == 0 {
        return;
    }
    let listing = list_platforms_devices().unwrap();
    assert!(listing.starts_with("Found "));
    assert!(listing.contains("Platform 0"));
    assert!(listing.contains("Device 0"));
}

#[test]
fn test_bad_platform_index() {
    if device_count() == 0 {
        return;
    }
    let selection = DeviceSelection {
        platform: 999,
        device: 0,
    };
    match OpenClEngine::new(selection, kernels_dir()) {
        Err(LabError::PlatformNotFound(999)) => {}
        other => panic!("expected PlatformNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_bad_device_index() {
    if device_count() == 0 {
        return;
    }
    let selection = DeviceSelection {
        platform: 0,
        device: 999,
    };
    match OpenClEngine::new(selection, kernels_dir()) {
        Err(LabError::DeviceNotFound { device: 999, .. }) => {}
        other => panic!("expected DeviceNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_kernel_file() {
    let Some(engine) = engine() else { return };
    match engine.build_program("no_such_file.cl", "") {
        Err(LabError::Io { path, .. }) => assert!(path.ends_with("no_such_file.cl")),
        other => panic!("expected Io error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_build_failure_reports_log() {
    if device_count() == 0 {
        return;
    }
    let dir = std::env::temp_dir().join(format!("cllab-build-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("broken.cl"), "kernel void broken(global int* A { A[0] = ; }").unwrap();

    let engine = OpenClEngine::new(DeviceSelection::default(), &dir).unwrap();
    match engine.build_program("broken.cl", "-DFOO=1") {
        Err(LabError::Build {
            kernel_file,
            status,
            ..
        }) => {
            assert!(kernel_file.ends_with("broken.cl"));
            assert_ne!(status, 0);
        }
        other => panic!("expected Build error, got {:?}", other.map(|_| ())),
    }
    let _ = fs::remove_dir_all(&dir);
}

// vector_ops

#[test]
fn test_gpu_vector_functions_match_reference() {
    let Some(engine) = engine() else { return };
    let (a, b) = crate::vector::arithmetic_operands(1000);
    for index in 0..4 {
        let function = VectorFunction::from_index(index).unwrap();
        let result = engine.run_vector_function(function, &a, &b).unwrap();
        assert_eq!(
            result.c,
            reference::vector_function(function, &a, &b),
            "{}",
            function.formula()
        );
        let kernels = result
            .timeline
            .steps()
            .iter()
            .filter(|s| s.phase == Phase::Kernel)
            .count();
        assert_eq!(kernels, function.kernels().len());
    }
}

#[test]
fn test_gpu_vector_default_operands() {
    let Some(engine) = engine() else { return };
    let (a, b) = crate::vector::arithmetic_operands(10);
    let result = engine
        .run_vector_function(VectorFunction::Add, &a, &b)
        .unwrap();
    assert_eq!(result.c, vec![0, 2, 4, 3, 5, 7, 6, 8, 10, 9]);
    assert_eq!(result.timeline.steps().len(), 4);
}

#[test]
fn test_gpu_vector_length_mismatch() {
    let Some(engine) = engine() else { return };
    let err = engine
        .run_vector_function(VectorFunction::Add, &[1, 2, 3], &[1, 2])
        .unwrap_err();
    assert!(matches!(err, LabError::InvalidInput(_)));
}

// image_filter

#[test]
fn test_gpu_image_filters_match_reference() {
    let Some(engine) = engine() else { return };
    let image = rgb_image(17, 11, 255, 7);
    let input = image.samples_u8();
    for kernel in [
        ImageKernel::Identity,
        ImageKernel::FilterR,
        ImageKernel::Invert,
        ImageKernel::Rgb2Grey,
        ImageKernel::IdentityNd,
        ImageKernel::AvgFilterNd,
        ImageKernel::ConvolutionNd,
    ] {
        let result = engine.run_image_filter(&image, kernel, Mask::Gaussian).unwrap();
        let expected = reference::filter::apply(kernel, &input, 17, 11, Mask::Gaussian);
        // float kernels may round the last bit differently
        let tolerance = if matches!(kernel, ImageKernel::Rgb2Grey | ImageKernel::ConvolutionNd) {
            1
        } else {
            0
        };
        assert_close(&result.image.samples_u8(), &expected, tolerance);
        assert_eq!(result.image.width(), 17);
        assert_eq!(result.image.channels(), 3);
    }
}

#[test]
fn test_gpu_convolution_masks() {
    let Some(engine) = engine() else { return };
    let image = rgb_image(9, 9, 255, 3);
    let input = image.samples_u8();
    for mask in [Mask::Gaussian, Mask::Box, Mask::Sharpen] {
        let result = engine
            .run_image_filter(&image, ImageKernel::ConvolutionNd, mask)
            .unwrap();
        let expected = reference::filter::apply(ImageKernel::ConvolutionNd, &input, 9, 9, mask);
        assert_close(&result.image.samples_u8(), &expected, 1);
    }
}

#[test]
fn test_gpu_filter_r_rejects_grey() {
    let Some(engine) = engine() else { return };
    let grey = PlanarImage::from_planar(4, 4, 1, vec![10; 16]).unwrap();
    let err = engine
        .run_image_filter(&grey, ImageKernel::FilterR, Mask::Gaussian)
        .unwrap_err();
    assert!(matches!(err, LabError::InvalidInput(_)));
}

#[test]
fn test_gpu_filter_reduces_sixteen_bit_input() {
    let Some(engine) = engine() else { return };
    let image = PlanarImage::from_planar(2, 2, 1, vec![0x1234, 0xff00, 0x0100, 0x8080]).unwrap();
    let result = engine
        .run_image_filter(&image, ImageKernel::Identity, Mask::Gaussian)
        .unwrap();
    assert_eq!(result.image.samples_u8(), vec![0x12, 0xff, 0x01, 0x80]);
    assert_eq!(result.image.depth(), BitDepth::Eight);
}

// reduce

const DEFAULT_INPUT: [i32; 10] = [6, 6, 6, 9, 9, 9, 9, 8, 5, 3];

#[test]
fn test_gpu_reduce_single_group_sums() {
    let Some(engine) = engine() else { return };
    if engine.max_work_group_size() < 10 {
        return;
    }
    for kernel in [
        ReduceKernel::ReduceAdd1,
        ReduceKernel::ReduceAdd2,
        ReduceKernel::ReduceAdd3,
        ReduceKernel::ReduceAdd4,
        ReduceKernel::ReduceAdd5,
    ] {
        let result = engine.run_reduce(kernel, &DEFAULT_INPUT, 10, 10).unwrap();
        assert_eq!(result.output[0], 70, "{}", kernel.kernel_name());
        assert_eq!(result.output.len(), 10);
    }
}

#[test]
fn test_gpu_reduce_across_groups() {
    let Some(engine) = engine() else { return };
    let local = engine.default_local_size().min(64);
    let input: Vec<i32> = lcg(1000, 100, 11).into_iter().map(|v| v as i32).collect();
    let total: i32 = input.iter().sum();

    for kernel in [ReduceKernel::ReduceAdd4, ReduceKernel::ReduceAdd5] {
        let result = engine.run_reduce(kernel, &input, local, 10).unwrap();
        assert_eq!(result.output[0], total, "{}", kernel.kernel_name());
        assert_eq!(result.input.len() % local, 0);
    }

    // reduce_add_3 leaves each group's sum at the group's first element
    let result = engine
        .run_reduce(ReduceKernel::ReduceAdd3, &input, local, 10)
        .unwrap();
    let sums = reference::block_sums(&result.input, local);
    for (group, sum) in sums.iter().enumerate() {
        assert_eq!(result.output[group * local], *sum);
    }
}

#[test]
fn test_gpu_histograms() {
    let Some(engine) = engine() else { return };
    let result = engine
        .run_reduce(ReduceKernel::Hist1, &DEFAULT_INPUT, 10, 10)
        .unwrap();
    assert_eq!(result.output, reference::histogram_clamped(&DEFAULT_INPUT, 10));
    assert_eq!(result.input.len(), DEFAULT_INPUT.len());

    let result = engine
        .run_reduce(ReduceKernel::Hist2, &DEFAULT_INPUT, 10, 7)
        .unwrap();
    assert_eq!(result.output, vec![0, 0, 0, 1, 0, 1, 8]);
}

#[test]
fn test_gpu_hist_1_rejects_out_of_range() {
    let Some(engine) = engine() else { return };
    let err = engine
        .run_reduce(ReduceKernel::Hist1, &DEFAULT_INPUT, 10, 5)
        .unwrap_err();
    assert!(matches!(err, LabError::InvalidInput(_)));
}

#[test]
fn test_gpu_scan_add_is_per_group() {
    let Some(engine) = engine() else { return };
    if engine.max_work_group_size() < 10 {
        return;
    }
    let input = vec![1; 23];
    let result = engine
        .run_reduce(ReduceKernel::ScanAdd, &input, 10, 10)
        .unwrap();
    assert_eq!(result.input.len(), 30);
    assert_eq!(result.output, reference::blockwise_inclusive_scan(&result.input, 10));
}

// scan

#[test]
fn test_gpu_hillis_steele_scan() {
    let Some(engine) = engine() else { return };
    for len in [1, 4, 5, 8, 13] {
        let input = vec![1; len];
        let result = engine.run_scan(ScanMode::HillisSteele, &input, None).unwrap();
        assert_eq!(result.output, reference::inclusive_scan(&input), "len {len}");
    }
}

#[test]
fn test_gpu_blelloch_scan_pads() {
    let Some(engine) = engine() else { return };
    let input = vec![3, 1, 7, 0, 4, 1];
    let result = engine.run_scan(ScanMode::Blelloch, &input, None).unwrap();
    assert_eq!(result.output, vec![0, 3, 4, 11, 11, 15]);
}

#[test]
fn test_gpu_block_scan_large() {
    let Some(engine) = engine() else { return };
    let input: Vec<i32> = lcg(100_000, 50, 5).into_iter().map(|v| v as i32).collect();
    let result = engine.run_scan(ScanMode::BlockScan, &input, Some(64)).unwrap();
    assert_eq!(result.output, reference::inclusive_scan(&input));
    // 100000 -> 1563 -> 25 -> one launch of each per level
    let launches = result
        .timeline
        .steps()
        .iter()
        .filter(|s| s.phase == Phase::Kernel)
        .count();
    assert_eq!(launches, 5);
}

#[test]
fn test_gpu_block_scan_default_local_size() {
    let Some(engine) = engine() else { return };
    let input = vec![1; 5000];
    let result = engine.run_scan(ScanMode::BlockScan, &input, None).unwrap();
    assert_eq!(result.output, reference::inclusive_scan(&input));
}

#[test]
fn test_gpu_single_group_scan_rejects_long_input() {
    let Some(engine) = engine() else { return };
    let input = vec![1; engine.max_work_group_size() + 1];
    let err = engine
        .run_scan(ScanMode::HillisSteele, &input, None)
        .unwrap_err();
    assert!(err.to_string().contains("mode 2"));
}

#[test]
fn test_gpu_block_scan_rejects_odd_local_size() {
    let Some(engine) = engine() else { return };
    let err = engine
        .run_scan(ScanMode::BlockScan, &[1, 2, 3], Some(10))
        .unwrap_err();
    assert!(matches!(err, LabError::InvalidInput(_)));
}

// histeq

#[test]
fn test_gpu_histeq_eight_bit_all_modes() {
    let Some(engine) = engine() else { return };
    // narrow range so equalisation has something to do
    let samples: Vec<u16> = lcg(64 * 48 * 3, 60, 21)
        .into_iter()
        .map(|v| 90 + v as u16)
        .collect();
    let image = PlanarImage::from_planar(64, 48, 3, samples).unwrap();
    let expected = reference::equalise(image.samples(), 256);

    for index in 0..3 {
        let mode = HistEqMode::from_index(index).unwrap();
        let result = engine.run_histeq(&image, mode).unwrap();
        assert!(!result.plan.fell_back);
        assert_eq!(result.equalisation, expected, "mode {index}");
        assert_eq!(result.image.depth(), BitDepth::Eight);
        assert_eq!(result.image.samples(), expected.output.as_slice());
    }
}

#[test]
fn test_gpu_histeq_sixteen_bit() {
    let Some(engine) = engine() else { return };
    let samples: Vec<u16> = lcg(40 * 30, 20_000, 9)
        .into_iter()
        .map(|v| 1_000 + v as u16)
        .collect();
    let image = PlanarImage::from_planar(40, 30, 1, samples).unwrap();
    assert_eq!(image.depth(), BitDepth::Sixteen);
    let expected = reference::equalise(image.samples(), 65536);

    for mode in [HistEqMode::Local, HistEqMode::Optimised] {
        let result = engine.run_histeq(&image, mode).unwrap();
        assert!(result.plan.fell_back);
        assert_eq!(result.equalisation, expected, "{mode:?}");
        assert_eq!(result.image.depth(), BitDepth::Sixteen);
    }
}

#[test]
fn test_gpu_histeq_timeline() {
    let Some(engine) = engine() else { return };
    let image = rgb_image(32, 32, 255, 1);
    let result = engine.run_histeq(&image, HistEqMode::Basic).unwrap();
    let timeline = &result.timeline;

    let labels: Vec<&str> = timeline
        .steps()
        .iter()
        .filter(|s| s.phase == Phase::Kernel)
        .map(|s| s.label.as_str())
        .collect();
    assert_eq!(labels, ["histogram", "cumulative_gather", "lut", "remap"]);
    assert_eq!(
        timeline.total_ns(),
        timeline.phase_ns(Phase::Upload)
            + timeline.phase_ns(Phase::Kernel)
            + timeline.phase_ns(Phase::Download)
    );
    assert_eq!(timeline.last_kernel().map(|s| s.label.as_str()), Some("remap"));
}
