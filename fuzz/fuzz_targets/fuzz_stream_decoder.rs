#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use motor_audio::decoder::{DecoderRegistry, Preload, StreamDecoder};

fuzz_target!(|data: &[u8]| {
    let registry = DecoderRegistry::with_defaults();
    let Ok(mut decoder) = StreamDecoder::open(&registry, Box::new(Cursor::new(data.to_vec())))
    else {
        return;
    };

    // Decode at most a few seconds, rewinding once halfway.
    for round in 0..64 {
        if round == 32 {
            decoder.rewind();
        }
        match decoder.preload_samples(8_000) {
            Preload::EndOfStream => break,
            Preload::Full => decoder.flush(),
            Preload::Decoded(_) => {}
        }
        assert!(decoder.staged() <= decoder.capacity());
    }
});
