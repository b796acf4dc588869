//! Whole-engine playback scenarios on the software mixer.

mod common;

use common::{FPS, FRAME, RATE, engine, step};
use motor_audio::backend::{AudioBackend, VoiceState};
use motor_audio::source::STREAM_BUFFER_COUNT;
use motor_audio::{Source, SourceKind, SourceState, StreamId};

fn queued(engine: &motor_audio::AudioEngine<motor_audio::SoftwareBackend>, id: StreamId) -> usize {
    let voice = engine.stream(id).unwrap().common().voice();
    engine.backend().buffers_queued(voice)
}

#[test]
fn test_stream_drains_and_retires() {
    let mut engine = engine();
    let id = engine.load_stream("music/five.wav").unwrap();
    let source = Source::from(id);
    engine.play(source).unwrap();

    let mut retired_at = None;
    for frame in 0..8 * FPS {
        let report = step(&mut engine);
        assert!(queued(&engine, id) <= STREAM_BUFFER_COUNT);
        assert_eq!(report.restarted, 0);
        if report.retired > 0 {
            retired_at = Some(frame);
            break;
        }
    }

    let retired_at = retired_at.expect("stream never finished");
    assert!(retired_at >= 5 * FPS, "retired too early at frame {retired_at}");
    assert_eq!(engine.playing_stream_count(), 0);
    assert_eq!(engine.state(source).unwrap(), SourceState::Stopped);
}

#[test]
fn test_looping_stream_never_retires() {
    let mut engine = engine();
    let id = engine.load_stream("music/one.wav").unwrap();
    engine.set_looping(id.into(), true).unwrap();
    engine.play(id.into()).unwrap();

    let mut wraps = 0;
    let mut last = engine.stream(id).unwrap().decoder().decode_position();
    for _ in 0..3 * FPS {
        let report = step(&mut engine);
        assert_eq!(report.retired, 0);
        let position = engine.stream(id).unwrap().decoder().decode_position();
        if position < last {
            wraps += 1;
        }
        last = position;
    }

    assert!(wraps >= 2, "only wrapped {wraps} times");
    assert!(engine.is_playing(id.into()).unwrap());
    assert!(engine.is_registered(id));
}

#[test]
fn test_short_looping_stream_plays_without_gaps() {
    let mut engine = engine();
    let id = engine.load_stream("music/one.wav").unwrap();
    engine.set_looping(id.into(), true).unwrap();
    engine.play(id.into()).unwrap();
    assert_eq!(engine.stream(id).unwrap().primed_buffers(), STREAM_BUFFER_COUNT);

    let mut out = vec![0.0f32; FRAME * 2];
    for frame in 0..3 * FPS {
        engine.backend_mut().render(&mut out);
        let report = engine.update_streams();
        assert_eq!(report.restarted, 0, "voice ran dry at frame {frame}");
        assert!(out.iter().all(|&s| s != 0.0), "silence in frame {frame}");
        assert_eq!(queued(&engine, id), STREAM_BUFFER_COUNT);
    }
}

#[test]
fn test_clone_is_independent() {
    let mut engine = engine();
    let original = engine.load_stream("music/ten.wav").unwrap();
    let Source::Stream(clone) = engine.clone_source(original.into()).unwrap() else {
        panic!("stream clone must be a stream");
    };
    let armed = engine.stream(clone).unwrap().decoder().decode_position();

    engine.play(original.into()).unwrap();
    for _ in 0..FPS {
        step(&mut engine);
    }
    assert!(engine.is_stopped(clone.into()).unwrap());
    assert!(!engine.is_registered(clone));
    assert_eq!(engine.stream(clone).unwrap().decoder().decode_position(), armed);

    engine.play(clone.into()).unwrap();
    engine.stop(original.into()).unwrap();
    for _ in 0..FPS {
        step(&mut engine);
    }
    assert!(engine.is_playing(clone.into()).unwrap());
    assert!(engine.is_registered(clone));
    assert!(engine.is_stopped(original.into()).unwrap());
    assert_eq!(engine.stream(original).unwrap().decoder().decode_position(), armed);
    assert!(engine.stream(clone).unwrap().decoder().decode_position() > armed);
}

#[test]
fn test_starved_stream_is_restarted() {
    let mut engine = engine();
    let id = engine.load_stream("music/ten.wav").unwrap();
    engine.play(id.into()).unwrap();

    // 4.5 seconds without pumping runs the voice past all four buffers.
    engine.backend_mut().advance(RATE as usize * 9 / 2);
    let voice = engine.stream(id).unwrap().common().voice();
    assert_eq!(engine.backend().voice_state(voice), VoiceState::Stopped);

    let report = engine.update_streams();
    assert_eq!(report.restarted, 1);
    assert_eq!(report.retired, 0);
    assert!(report.refilled > 0);
    assert!(engine.is_registered(id));
    assert_eq!(engine.backend().voice_state(voice), VoiceState::Playing);
    assert!(engine.is_playing(id.into()).unwrap());
}

#[test]
fn test_play_twice_is_idempotent() {
    let mut engine = engine();
    let id = engine.load_stream("music/five.wav").unwrap();
    engine.play(id.into()).unwrap();
    step(&mut engine);
    let position = engine.stream(id).unwrap().decoder().decode_position();

    engine.play(id.into()).unwrap();
    assert_eq!(engine.playing_stream_count(), 1);
    assert_eq!(queued(&engine, id), STREAM_BUFFER_COUNT);
    assert_eq!(engine.stream(id).unwrap().decoder().decode_position(), position);
    assert!(engine.is_playing(id.into()).unwrap());
}

#[test]
fn test_stop_then_play_matches_fresh_load() {
    let mut engine = engine();
    let fresh = engine.load_stream("music/ten.wav").unwrap();
    let used = engine.load_stream("music/ten.wav").unwrap();

    engine.play(used.into()).unwrap();
    for _ in 0..90 {
        step(&mut engine);
    }
    engine.stop(used.into()).unwrap();

    let (a, b) = (engine.stream(fresh).unwrap(), engine.stream(used).unwrap());
    assert_eq!(a.decoder().decode_position(), b.decoder().decode_position());
    assert_eq!(a.decoder().staged(), b.decoder().staged());
    assert_eq!(a.primed_buffers(), b.primed_buffers());
    assert_eq!(queued(&engine, used), 0);

    engine.play(fresh.into()).unwrap();
    engine.play(used.into()).unwrap();
    assert_eq!(queued(&engine, fresh), queued(&engine, used));
    assert_eq!(engine.playing_stream_count(), 2);
}

#[test]
fn test_rewind_while_paused_stays_paused() {
    let mut engine = engine();
    let id = engine.load_stream("music/ten.wav").unwrap();
    let armed = engine.stream(id).unwrap().decoder().decode_position();
    engine.play(id.into()).unwrap();
    for _ in 0..30 {
        step(&mut engine);
    }
    engine.pause(id.into()).unwrap();
    engine.rewind(id.into()).unwrap();

    assert!(engine.is_paused(id.into()).unwrap());
    assert!(engine.is_registered(id));
    assert_eq!(engine.stream(id).unwrap().decoder().decode_position(), armed);

    let mut out = vec![0.0f32; FRAME * 2];
    for _ in 0..10 {
        engine.backend_mut().render(&mut out);
        engine.update_streams();
        assert!(out.iter().all(|&s| s == 0.0));
    }
    assert!(engine.is_paused(id.into()).unwrap());

    engine.resume(id.into()).unwrap();
    engine.backend_mut().render(&mut out);
    assert!(out.iter().any(|&s| s != 0.0));
    assert!(engine.is_playing(id.into()).unwrap());
}

#[test]
fn test_drained_stream_plays_again() {
    let mut engine = engine();
    let id = engine.load_stream("music/one.wav").unwrap();
    engine.play(id.into()).unwrap();
    for _ in 0..3 * FPS {
        step(&mut engine);
    }
    assert!(engine.is_stopped(id.into()).unwrap());
    assert_eq!(engine.playing_stream_count(), 0);

    engine.play(id.into()).unwrap();
    let mut out = vec![0.0f32; FRAME * 2];
    engine.backend_mut().render(&mut out);
    assert!(out.iter().any(|&s| s != 0.0));
}

#[test]
fn test_static_source_plays_and_ends() {
    let mut engine = engine();
    let sfx = engine.new_source("sfx/blip.wav", SourceKind::Static).unwrap();
    engine.play(sfx).unwrap();

    let mut out = vec![0.0f32; FRAME * 2];
    engine.backend_mut().render(&mut out);
    assert!(out.iter().any(|&s| s != 0.0));

    engine.backend_mut().advance(RATE as usize);
    assert!(engine.is_stopped(sfx).unwrap());

    engine.play(sfx).unwrap();
    assert!(engine.is_playing(sfx).unwrap());
}

#[test]
fn test_static_looping_keeps_playing() {
    let mut engine = engine();
    let sfx = engine.new_source("sfx/blip.wav", SourceKind::Static).unwrap();
    engine.set_looping(sfx, true).unwrap();
    engine.play(sfx).unwrap();
    engine.backend_mut().advance(RATE as usize * 2);
    assert!(engine.is_playing(sfx).unwrap());
    assert!(engine.is_looping(sfx).unwrap());
}

#[test]
fn test_static_clone_shares_buffer() {
    let mut engine = engine();
    let sfx = engine.new_source("sfx/blip.wav", SourceKind::Static).unwrap();
    let buffers = engine.backend().buffer_count();
    let clone = engine.clone_source(sfx).unwrap();
    assert_eq!(engine.backend().buffer_count(), buffers);

    engine.free(sfx).unwrap();
    assert_eq!(engine.backend().buffer_count(), buffers);
    engine.play(clone).unwrap();
    assert!(engine.is_playing(clone).unwrap());

    engine.free(clone).unwrap();
    assert_eq!(engine.backend().buffer_count(), buffers - 1);
}

#[test]
fn test_master_volume_silences_output() {
    let mut engine = engine();
    let id = engine.load_stream("music/stereo.wav").unwrap();
    engine.play(id.into()).unwrap();
    engine.set_master_volume(4.0);
    assert_eq!(engine.master_volume(), 1.0);

    engine.set_master_volume(0.0);
    let mut out = vec![1.0f32; FRAME * 2];
    engine.backend_mut().render(&mut out);
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn test_load_failure_leaks_nothing() {
    let mut engine = engine();
    assert!(engine.new_source("broken.ogg", SourceKind::Stream).is_err());
    assert!(engine.new_source("broken.ogg", SourceKind::Static).is_err());
    assert!(engine.new_source("missing.wav", SourceKind::Stream).is_err());
    assert_eq!(engine.backend().buffer_count(), 0);
    assert_eq!(engine.backend().voice_count(), 0);
}

#[test]
fn test_free_while_playing_releases_everything() {
    let mut engine = engine();
    let stream = engine.new_source("music/five.wav", SourceKind::Stream).unwrap();
    let sfx = engine.new_source("sfx/blip.wav", SourceKind::Static).unwrap();
    engine.play(stream).unwrap();
    engine.play(sfx).unwrap();
    step(&mut engine);

    engine.free(stream).unwrap();
    engine.free(sfx).unwrap();
    assert_eq!(engine.playing_stream_count(), 0);
    assert_eq!(engine.backend().buffer_count(), 0);
    assert_eq!(engine.backend().voice_count(), 0);
}
