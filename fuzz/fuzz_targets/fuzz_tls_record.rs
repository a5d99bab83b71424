#![no_main]
use libfuzzer_sys::fuzz_target;
use mantis_tls::record::RecordLayer;

fuzz_target!(|data: &[u8]| {
    let mut layer = RecordLayer::new();
    let mut rest = data;
    while let Ok(Some((_, _, consumed))) = layer.open_record(rest) {
        rest = &rest[consumed..];
    }
});
