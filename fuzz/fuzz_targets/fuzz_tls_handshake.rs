#![no_main]
use libfuzzer_sys::fuzz_target;
use mantis_tls::handshake::codec::{Certificate13, ClientHello, ServerHello};
use mantis_tls::handshake::fragment::HandshakeReassembler;

fuzz_target!(|data: &[u8]| {
    let mut reasm = HandshakeReassembler::new();
    reasm.push(data);
    while let Ok(Some((_, msg))) = reasm.next_message() {
        let body = &msg[4..];
        let _ = ClientHello::decode(body);
        let _ = ServerHello::decode(body);
        let _ = Certificate13::decode(body);
    }
});
