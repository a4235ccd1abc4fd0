//! Histogram equalisation and scan benchmarks.
//!
//! CPU reference equalisation and scans at a few image sizes, plus the
//! device pipeline in every mode when built with `--features opencl`.
//!
//! All groups enforce warm_up_time(2s) + measurement_time(5s) + sample_size(10)
//! to keep total runtime bounded.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use cllab::image::PlanarImage;

/// Image sides, square RGB.
const SIDES: &[u32] = &[64, 256, 1024];

/// Apply standard timeout caps to a benchmark group.
fn cap(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(10);
}

/// Low-contrast test image: values in `lo..lo + span`.
fn test_image(side: u32, lo: u16, span: u32) -> PlanarImage {
    let len = (side * side * 3) as usize;
    let mut state = 0x2545_f491u32;
    let samples = (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            lo + (state % span) as u16
        })
        .collect();
    match PlanarImage::from_planar(side, side, 3, samples) {
        Ok(image) => image,
        Err(e) => panic!("test image: {e}"),
    }
}

fn bench_reference_equalise(c: &mut Criterion) {
    let mut group = c.benchmark_group("equalise_cpu");
    cap(&mut group);
    for &side in SIDES {
        let eight = test_image(side, 80, 80);
        let sixteen = test_image(side, 20_000, 20_000);
        group.throughput(Throughput::Elements(eight.len() as u64));

        group.bench_with_input(BenchmarkId::new("8bit", side), &eight, |b, img| {
            b.iter(|| cllab::reference::equalise(img.samples(), 256));
        });
        group.bench_with_input(BenchmarkId::new("16bit", side), &sixteen, |b, img| {
            b.iter(|| cllab::reference::equalise(img.samples(), 65536));
        });
    }
    group.finish();
}

fn bench_reference_scans(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_cpu");
    cap(&mut group);
    for &len in &[256usize, 65536, 1 << 20] {
        let data: Vec<u32> = (0..len as u32).map(|i| i % 7).collect();
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("inclusive", len), &data, |b, data| {
            b.iter(|| cllab::reference::inclusive_scan(data));
        });
    }
    group.finish();
}

#[cfg(feature = "opencl")]
fn bench_equalise_gpu(c: &mut Criterion) {
    use cllab::opencl::{device_count, DeviceSelection, OpenClEngine};
    use cllab::plan::HistEqMode;
    use std::path::Path;

    if device_count() == 0 {
        eprintln!("equalise: no OpenCL device, skipping GPU benchmarks");
        return;
    }
    let kernels = Path::new(env!("CARGO_MANIFEST_DIR")).join("kernels");
    let engine = match OpenClEngine::new(DeviceSelection::default(), kernels) {
        Ok(e) => std::sync::Arc::new(e),
        Err(_) => {
            eprintln!("equalise: no OpenCL device, skipping GPU benchmarks");
            return;
        }
    };

    eprintln!("equalise: GPU device: {}", engine.device_name());

    let mut group = c.benchmark_group("equalise_gpu");
    cap(&mut group);
    for &side in SIDES {
        let image = test_image(side, 80, 80);
        group.throughput(Throughput::Elements(image.len() as u64));

        for (name, mode) in [
            ("basic", HistEqMode::Basic),
            ("local", HistEqMode::Local),
            ("optimised", HistEqMode::Optimised),
        ] {
            let eng = engine.clone();
            group.bench_with_input(BenchmarkId::new(name, side), &image, move |b, img| {
                b.iter(|| eng.run_histeq(img, mode).unwrap());
            });
        }
    }
    group.finish();
}

#[cfg(not(feature = "opencl"))]
fn bench_equalise_gpu(_c: &mut Criterion) {}

criterion_group!(
    benches,
    bench_reference_equalise,
    bench_reference_scans,
    bench_equalise_gpu
);
criterion_main!(benches);
