use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cutout_studio::{
    BackgroundMode, CutoutProcessor, MaskRefiner, PrecomputedMaskSegmenter, ProcessingOptions,
    ProcessorConfig, RefinePolicy,
};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use std::io::Cursor;

const WIDTH: u32 = 1024;
const HEIGHT: u32 = 768;

/// Textured photo with an elliptical product in the middle
fn synthetic_scene() -> (Vec<u8>, GrayImage) {
    let (cx, cy) = (WIDTH as f32 / 2.0, HEIGHT as f32 / 2.0);
    let inside = |x: u32, y: u32| {
        let dx = (x as f32 - cx) / 220.0;
        let dy = (y as f32 - cy) / 300.0;
        dx * dx + dy * dy <= 1.0
    };

    let image = RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        if inside(x, y) {
            Rgb([(x % 200) as u8 + 30, 90, (y % 120) as u8 + 60])
        } else {
            Rgb([238, 236, 232])
        }
    });
    let mask = GrayImage::from_fn(WIDTH, HEIGHT, |x, y| {
        Luma([if inside(x, y) { 255 } else { 0 }])
    });

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode benchmark scene");
    (bytes, mask)
}

fn benchmark_full_pipeline(c: &mut Criterion) {
    let (bytes, mask) = synthetic_scene();
    let processor = CutoutProcessor::new(
        ProcessorConfig::default(),
        Box::new(PrecomputedMaskSegmenter::new(mask)),
    );

    let mut group = c.benchmark_group("full_pipeline");
    group.sample_size(10);

    for background in [BackgroundMode::Transparent, BackgroundMode::White] {
        let options = ProcessingOptions::default()
            .with_canvas_size(1024)
            .with_background(background);
        group.bench_with_input(
            BenchmarkId::from_parameter(background),
            &options,
            |b, options| {
                b.iter(|| {
                    processor
                        .process_bytes(black_box(&bytes), options, Some("bench.png"))
                        .expect("pipeline run")
                });
            },
        );
    }

    group.finish();
}

fn benchmark_refinement(c: &mut Criterion) {
    let (_, mask) = synthetic_scene();
    let refiner = MaskRefiner::new();

    let mut group = c.benchmark_group("mask_refinement");
    group.sample_size(20);

    group.bench_function("morphological", |b| {
        b.iter(|| refiner.refine(black_box(&mask), RefinePolicy::Morphological))
    });
    group.bench_function("direct_alpha", |b| {
        b.iter(|| refiner.refine(black_box(&mask), RefinePolicy::DirectAlpha))
    });

    group.finish();
}

criterion_group!(pipeline_benches, benchmark_full_pipeline, benchmark_refinement);
criterion_main!(pipeline_benches);
