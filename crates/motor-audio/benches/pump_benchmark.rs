use std::io::Cursor;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use hound::{SampleFormat, WavSpec, WavWriter};
use motor_audio::{AudioConfig, AudioEngine, MemoryAssets, SoftwareBackend, Source};

const RATE: u32 = 44_100;
const FRAME: usize = (RATE / 60) as usize;

fn wav(channels: u16, seconds: u32) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..(RATE * seconds) as usize * channels as usize {
            writer.write_sample((i % 4000) as i16 - 2000).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn looping_engine(streams: usize) -> AudioEngine<SoftwareBackend> {
    let mut assets = MemoryAssets::new();
    assets.insert("music/loop.wav", wav(2, 2));
    let mut engine =
        AudioEngine::with_assets(SoftwareBackend::new(RATE), AudioConfig::default(), assets);
    for _ in 0..streams {
        let source = Source::Stream(engine.load_stream("music/loop.wav").unwrap());
        engine.set_looping(source, true).unwrap();
        engine.play(source).unwrap();
    }
    engine
}

fn pump_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("pump");

    for streams in [1, 8] {
        group.bench_function(format!("frame_{streams}_looping_streams"), |b| {
            let mut engine = looping_engine(streams);
            b.iter(|| {
                engine.backend_mut().advance(FRAME);
                black_box(engine.update_streams());
            });
        });
    }

    group.finish();
}

fn mixer_benchmark(c: &mut Criterion) {
    c.bench_function("render_frame_8_streams", |b| {
        let mut engine = looping_engine(8);
        let mut out = vec![0.0f32; FRAME * 2];
        b.iter(|| {
            engine.backend_mut().render(black_box(&mut out));
            engine.update_streams();
        });
    });
}

criterion_group!(benches, pump_benchmark, mixer_benchmark);
criterion_main!(benches);
