#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let output = ihex::load_from_bytes(data.as_bytes(), &ihex::LoadOptions::default());

    let _ = std::hint::black_box(output);
});
