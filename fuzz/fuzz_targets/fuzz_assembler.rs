#![no_main]

use bia_rs::{decode_response, FrameAssembler};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the chunk size so splits vary between runs
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(split).max(1);

    let mut assembler = FrameAssembler::new();
    for piece in rest.chunks(chunk) {
        for frame in assembler.push(piece) {
            assert!(frame.len() >= 4);
            let _ = decode_response(&frame);
        }
    }
});
