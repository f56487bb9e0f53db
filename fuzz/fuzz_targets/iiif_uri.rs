#![no_main]

use iiif_image::geometry::Size;
use iiif_image::iiif::{v2, v3, OperationListContext};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(uri) = std::str::from_utf8(data) else {
        return;
    };
    let ctx = OperationListContext::default().with_max_pixels(1_000_000);
    let full = Size::new(640.0, 480.0);
    if let Ok(params) = v3::Parameters::from_uri(uri) {
        let _ = params.to_canonical_string(full, ";");
        if let Ok(list) = params.to_operation_list(&ctx) {
            let _ = list.validate(full, &Default::default());
            let _ = list.to_string();
        }
    }
    if let Ok(params) = v2::Parameters::from_uri(uri) {
        let _ = params.to_canonical_string(full, ";");
        let _ = params.to_operation_list(&ctx);
    }
});
