//! Shared fixtures: WAV files generated in memory and a frame loop.

#![allow(dead_code)]

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use motor_audio::{AudioConfig, AudioEngine, MemoryAssets, SoftwareBackend};

pub const RATE: u32 = 44_100;
pub const FPS: u32 = 60;
pub const FRAME: usize = (RATE / FPS) as usize;

/// A 16-bit sine-ish WAV of `seconds` at [`RATE`]. Every sample is nonzero.
pub fn wav(channels: u16, seconds: f32) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let frames = (RATE as f32 * seconds) as usize;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let value = 1000 + (i % 200) as i16 * 40;
            for _ in 0..channels {
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn assets() -> MemoryAssets {
    let mut assets = MemoryAssets::new();
    assets.insert("music/one.wav", wav(1, 1.0));
    assets.insert("music/five.wav", wav(1, 5.0));
    assets.insert("music/ten.wav", wav(1, 10.0));
    assets.insert("music/stereo.wav", wav(2, 2.0));
    assets.insert("sfx/blip.wav", wav(1, 0.25));
    assets.insert("broken.ogg", b"OggS this is not an ogg stream".to_vec());
    assets
}

pub fn engine() -> AudioEngine<SoftwareBackend> {
    AudioEngine::with_assets(SoftwareBackend::new(RATE), AudioConfig::default(), assets())
}

/// Render one frame of audio and run the pump, like a game loop would.
pub fn step(engine: &mut AudioEngine<SoftwareBackend>) -> motor_audio::PumpReport {
    engine.backend_mut().advance(FRAME);
    engine.update_streams()
}
