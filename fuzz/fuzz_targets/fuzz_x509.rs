#![no_main]
use libfuzzer_sys::fuzz_target;
use mantis_pki::x509::Certificate;

fuzz_target!(|data: &[u8]| {
    if let Ok(cert) = Certificate::from_der(data) {
        let _ = cert.verify_signature(&cert);
        let _ = cert.is_ca();
    }
});
