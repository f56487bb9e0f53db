use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use iiif_image::engine::{apply, resample, ProcessorConfig, RenderContext};
use iiif_image::geometry::{ReductionFactor, Size};
use iiif_image::iiif::{v3, OperationListContext};
use iiif_image::info::Orientation;
use iiif_image::ops::ScaleFilter;
use image::{DynamicImage, RgbImage};
use std::hint::black_box;

fn create_test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn bench_resample(c: &mut Criterion) {
    let img = create_test_image(1024, 768);
    let mut group = c.benchmark_group("resample 1024x768 -> 256x192");
    for filter in [
        ScaleFilter::Box,
        ScaleFilter::Triangle,
        ScaleFilter::CatmullRom,
        ScaleFilter::Lanczos3,
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(filter), &filter, |b, f| {
            b.iter(|| resample(black_box(&img), 256, 192, *f, false))
        });
    }
    group.bench_function("lanczos3 linear", |b| {
        b.iter(|| resample(black_box(&img), 256, 192, ScaleFilter::Lanczos3, true))
    });
    group.finish();
}

fn bench_request(c: &mut Criterion) {
    let img = create_test_image(1024, 768);
    let config = ProcessorConfig::default();
    let ctx = RenderContext {
        full_size: Size::new(1024.0, 768.0),
        orientation: Orientation::Rotate0,
        reduction_factor: ReductionFactor(0),
        config: &config,
    };
    let mut group = c.benchmark_group("request");
    for uri in [
        "img/full/max/0/default.jpg",
        "img/pct:25,25,50,50/256,/0/default.jpg",
        "img/full/400,/90/gray.jpg",
        "img/square/200,/22.5/bitonal.png",
    ] {
        let list = v3::Parameters::from_uri(uri)
            .and_then(|p| p.to_operation_list(&OperationListContext::default()))
            .unwrap();
        group.bench_function(uri, |b| b.iter(|| apply(black_box(&img), &list, &ctx)));
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse v3 uri", |b| {
        b.iter(|| v3::Parameters::from_uri(black_box("img;2/pct:10,10,80,80/^!400,300/!90/gray.webp")))
    });
}

criterion_group!(benches, bench_resample, bench_request, bench_parse);
criterion_main!(benches);
