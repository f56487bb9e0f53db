#![no_main]

use iiif_image::engine::{SourceDecoder, StandardDecoder};
use iiif_image::geometry::ReductionFactor;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let Ok(mut decoder) = StandardDecoder::from_bytes(data.to_vec()) else {
        return;
    };
    let _ = decoder.size(0);
    let _ = decoder.orientation();
    let _ = decoder.decode(0, ReductionFactor(0));
});
