#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use iiif_image::engine::{apply, ProcessorConfig, RenderContext};
use iiif_image::geometry::{ReductionFactor, Size};
use iiif_image::info::Orientation;
use iiif_image::ops::{
    ColorTransform, Crop, MetaIdentifier, Operation, OperationList, Rotate, Scale, ScaleMode,
    Sharpen, Transpose, ValidationPolicy,
};
use image::{DynamicImage, RgbaImage};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct OperationSeed {
    kind: u8,
    a: u16,
    b: u16,
    c: u16,
    d: u16,
}

fn build_image(data: &[u8]) -> DynamicImage {
    let width = data.first().copied().unwrap_or(0) as u32 % 64 + 1;
    let height = data.get(1).copied().unwrap_or(0) as u32 % 64 + 1;
    let buffer: Vec<u8> = (0..(width * height * 4) as usize)
        .map(|i| data[i % data.len()])
        .collect();
    RgbaImage::from_raw(width, height, buffer)
        .map(DynamicImage::ImageRgba8)
        .unwrap_or_else(|| DynamicImage::ImageRgba8(RgbaImage::new(1, 1)))
}

fn seed_to_op(seed: &OperationSeed) -> Option<Operation> {
    let dim = |v: u16| (v % 128 + 1) as u32;
    Some(match seed.kind % 8 {
        0 => Operation::Crop(
            Crop::by_pixels(
                (seed.a % 80) as f64,
                (seed.b % 80) as f64,
                dim(seed.c) as f64,
                dim(seed.d) as f64,
            )
            .ok()?,
        ),
        1 => Operation::Crop(Crop::ToSquare),
        2 => Operation::Scale(
            Scale::by_pixels(Some(dim(seed.a)), Some(dim(seed.b)), ScaleMode::AspectFitInside)
                .ok()?,
        ),
        3 => Operation::Scale(Scale::by_percent((seed.a % 300 + 1) as f64 / 100.0).ok()?),
        4 => Operation::Rotate(Rotate::new((seed.a % 360) as f64 + seed.b as f64 / 65536.0).ok()?),
        5 => Operation::Transpose(if seed.a % 2 == 0 {
            Transpose::Horizontal
        } else {
            Transpose::Vertical
        }),
        6 => Operation::ColorTransform(if seed.a % 2 == 0 {
            ColorTransform::Gray
        } else {
            ColorTransform::Bitonal
        }),
        _ => Operation::Sharpen(Sharpen::new((seed.a % 100) as f64 / 50.0).ok()?),
    })
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let mut unstructured = Unstructured::new(data);
    let seeds: Vec<OperationSeed> = match Vec::arbitrary(&mut unstructured) {
        Ok(v) => v,
        Err(_) => return,
    };

    let img = build_image(data);
    let full = Size::new(img.width() as f64, img.height() as f64);
    let mut list = OperationList::new(MetaIdentifier::new("fuzz"));
    for seed in seeds.iter().take(16) {
        if let Some(op) = seed_to_op(seed) {
            // duplicates of singletons are rejected; that is fine here
            let _ = list.add(op);
        }
    }
    if list.validate(full, &ValidationPolicy::permissive()).is_err() {
        return;
    }
    let config = ProcessorConfig::default();
    let ctx = RenderContext {
        full_size: full,
        orientation: Orientation::Rotate0,
        reduction_factor: ReductionFactor(0),
        config: &config,
    };
    let _ = apply(&img, &list, &ctx);
});
