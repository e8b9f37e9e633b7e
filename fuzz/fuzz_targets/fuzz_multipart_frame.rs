// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use dzmq::transport::frame_codec::{decode_multipart, FrameCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Multipart body parser
    let _ = decode_multipart(data);

    // Length-prefixed stream decoder, capped well below the input space
    let mut codec = FrameCodec::new(64 * 1024);
    let mut reader = data;
    while let Ok(Some(body)) = codec.decode(&mut reader) {
        let _ = decode_multipart(&body);
    }
});
