#![no_main]

//! ICC extraction from JPEG, PNG and WebP containers.

use iiif_image::engine::extract_icc_profile;
use libfuzzer_sys::fuzz_target;

const PREFIXES: [&[u8]; 3] = [
    &[0xFF, 0xD8],
    &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
    b"RIFF\0\0\0\0WEBP",
];

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let _ = extract_icc_profile(data);
    for prefix in PREFIXES {
        let mut framed = prefix.to_vec();
        framed.extend_from_slice(data);
        let _ = extract_icc_profile(&framed);
    }
});
