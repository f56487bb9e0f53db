#![no_main]

//! Orientation lookup on arbitrary containers.

use iiif_image::info::Orientation;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = Orientation::read_from(data);
});
