use anyhow::{Result, bail};

use crate::backend::{AudioBackend, VoiceId};

/// Playback state of a source as seen by script code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// State shared by static and stream sources: the voice they play on, the
/// play/pause/stop state and the per-source gain and pitch.
#[derive(Debug)]
pub struct SourceCommon {
    voice: VoiceId,
    state: SourceState,
    volume: f32,
    pitch: f32,
}

impl SourceCommon {
    pub fn new(voice: VoiceId) -> Self {
        Self {
            voice,
            state: SourceState::Stopped,
            volume: 1.0,
            pitch: 1.0,
        }
    }

    pub fn voice(&self) -> VoiceId {
        self.voice
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SourceState) {
        self.state = state;
    }

    pub fn is_playing(&self) -> bool {
        self.state == SourceState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == SourceState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state == SourceState::Stopped
    }

    /// Start the voice, or continue it when paused.
    ///
    /// Callers decide whether a start is due; the voice itself ignores a
    /// play while it is already playing.
    pub fn play<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        backend.play(self.voice);
        self.state = SourceState::Playing;
    }

    pub fn pause<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.is_playing() {
            backend.pause(self.voice);
            self.state = SourceState::Paused;
        }
    }

    pub fn resume<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.is_paused() {
            backend.play(self.voice);
            self.state = SourceState::Playing;
        }
    }

    pub fn stop<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        backend.stop(self.voice);
        self.state = SourceState::Stopped;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set the voice gain. Negative values are treated as silence.
    pub fn set_volume<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, volume: f32) {
        self.volume = if volume.is_nan() { 0.0 } else { volume.max(0.0) };
        backend.set_gain(self.voice, self.volume);
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Set the playback rate multiplier. Must be positive and finite.
    pub fn set_pitch<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        pitch: f32,
    ) -> Result<()> {
        if !(pitch.is_finite() && pitch > 0.0) {
            bail!("Pitch must be a positive number, got {pitch}");
        }
        self.pitch = pitch;
        backend.set_pitch(self.voice, pitch);
        Ok(())
    }
}
