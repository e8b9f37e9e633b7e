// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use dzmq::protocol::{decode_datagram, DiscoveryHeader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Header-only parser
    let _ = DiscoveryHeader::decode(data);

    // Full datagram parser; anything it accepts must encode back
    if let Ok(message) = decode_datagram(data) {
        let encoded = message.encode().expect("decoded message re-encodes");
        let again = decode_datagram(&encoded).expect("re-encoded message decodes");
        assert_eq!(again, message);
    }
});
