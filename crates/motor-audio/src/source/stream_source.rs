//! Streamed sources.
//!
//! A stream keeps [`STREAM_BUFFER_COUNT`] backend buffers cycling through its
//! voice. The pump refills buffers the voice has finished with; looping is
//! done here by rewinding the decoder, never by the voice.

use anyhow::{Result, bail};

use super::StreamId;
use super::common::{SourceCommon, SourceState};
use crate::backend::{AudioBackend, BufferId, VoiceState};
use crate::decoder::{Preload, StreamDecoder};
use crate::registry::PlaybackRegistry;

/// Buffers per stream.
pub const STREAM_BUFFER_COUNT: usize = 4;

/// What one pump step did to a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// Still playing (or paused) normally.
    Running,
    /// The voice had stopped with buffers still queued and was restarted.
    Restarted,
    /// The stream played out. It is now stopped and ready to play again.
    Drained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpStep {
    pub status: PumpStatus,
    /// Buffers refilled and requeued.
    pub refilled: usize,
}

pub struct StreamSource {
    id: StreamId,
    common: SourceCommon,
    buffers: [BufferId; STREAM_BUFFER_COUNT],
    /// Leading entries of `buffers` that hold audio after the last (re)arm.
    primed: usize,
    /// False after a drain until the next play re-fills the buffers.
    armed: bool,
    decoder: StreamDecoder,
    looping: bool,
    file: String,
    initial_preload: usize,
}

impl StreamSource {
    /// Allocate a voice and buffers for `decoder` and fill the buffers.
    ///
    /// On failure every backend object created here is released again.
    pub fn new<B: AudioBackend + ?Sized>(
        backend: &mut B,
        id: StreamId,
        file: &str,
        decoder: StreamDecoder,
        initial_preload: usize,
    ) -> Result<Self> {
        let voice = backend.create_voice()?;
        let buffers = match backend.gen_buffers(STREAM_BUFFER_COUNT) {
            Ok(buffers) => buffers,
            Err(e) => {
                backend.delete_voice(voice);
                return Err(e);
            }
        };
        let buffers: [BufferId; STREAM_BUFFER_COUNT] = match buffers.try_into() {
            Ok(buffers) => buffers,
            Err(partial) => {
                backend.delete_buffers(&partial);
                backend.delete_voice(voice);
                bail!("Backend did not allocate {STREAM_BUFFER_COUNT} stream buffers");
            }
        };

        let mut source = Self {
            id,
            common: SourceCommon::new(voice),
            buffers,
            primed: 0,
            armed: false,
            decoder,
            looping: false,
            file: file.to_string(),
            initial_preload,
        };
        source.initial_preload(backend);
        log::debug!(
            "Loaded stream {file}: {} ch, {} Hz, {} buffer(s) primed",
            source.decoder.channels(),
            source.decoder.sample_rate(),
            source.primed
        );
        Ok(source)
    }

    fn initial_preload<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        self.primed = 0;
        self.fill_slots(backend);
        self.armed = true;
    }

    /// Fill the buffers after the primed ones. A looping stream wraps to
    /// keep going; buffers left without audio are emptied so they never
    /// replay stale samples.
    fn fill_slots<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        while self.primed < STREAM_BUFFER_COUNT {
            let buffer = self.buffers[self.primed];
            self.decoder.preload_samples(self.initial_preload);
            let mut uploaded = self.decoder.upload_preloaded_samples(backend, buffer);
            if uploaded == 0 && self.wrap_at_end() {
                self.decoder.preload_samples(self.initial_preload);
                uploaded = self.decoder.upload_preloaded_samples(backend, buffer);
            }
            if uploaded == 0 {
                break;
            }
            self.primed += 1;
        }

        for &buffer in &self.buffers[self.primed..] {
            if let Err(e) = backend.buffer_data(buffer, self.decoder.format(), &[]) {
                log::warn!("Failed to clear stream buffer for {}: {e:#}", self.file);
            }
        }
    }

    /// Rewind a looping stream that has run out. Returns true if it did.
    fn wrap_at_end(&mut self) -> bool {
        if self.looping && self.decoder.at_end() {
            log::trace!("Stream {} looped", self.file);
            self.decoder.rewind();
            true
        } else {
            false
        }
    }

    /// Back to the state right after loading: decoder at the start, staging
    /// empty, buffers refilled.
    fn rearm<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        self.decoder.rewind();
        self.decoder.flush();
        self.initial_preload(backend);
    }

    /// Queue every buffer and hand the stream to the pump. Empty buffers are
    /// finished at once and picked up by the next pump.
    fn prepare_to_play<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        registry: &mut PlaybackRegistry,
    ) {
        if !self.armed {
            self.rearm(backend);
        } else if self.looping && self.primed < STREAM_BUFFER_COUNT {
            self.fill_slots(backend);
        }
        backend.queue_buffers(self.common.voice(), &self.buffers);
        registry.insert(self.id);
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn common(&self) -> &SourceCommon {
        &self.common
    }

    pub fn common_mut(&mut self) -> &mut SourceCommon {
        &mut self.common
    }

    pub fn decoder(&self) -> &StreamDecoder {
        &self.decoder
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn buffers(&self) -> &[BufferId; STREAM_BUFFER_COUNT] {
        &self.buffers
    }

    /// Buffers that received audio in the last (re)arm.
    pub fn primed_buffers(&self) -> usize {
        self.primed
    }

    /// False once the stream drained, until `play` or `rewind` refill it.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn play<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        registry: &mut PlaybackRegistry,
    ) {
        match self.common.state() {
            SourceState::Playing => return,
            SourceState::Paused => {}
            SourceState::Stopped => {
                log::debug!("Playing stream {}", self.file);
                self.prepare_to_play(backend, registry);
            }
        }
        self.common.play(backend);
    }

    /// Stop and rewind to the start of the stream.
    pub fn stop<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        registry: &mut PlaybackRegistry,
    ) {
        if self.common.is_stopped() {
            return;
        }
        log::debug!("Stopping stream {}", self.file);
        self.stop_without_rewind(backend, registry);
        self.rearm(backend);
    }

    /// Detach from the pump and empty the voice queue, leaving the decoder
    /// where it is.
    fn stop_without_rewind<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        registry: &mut PlaybackRegistry,
    ) {
        if self.common.is_stopped() {
            return;
        }
        registry.remove(self.id);
        self.common.stop(backend);
        let voice = self.common.voice();
        while backend.unqueue_buffer(voice).is_some() {}
    }

    pub fn pause<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        self.common.pause(backend);
    }

    pub fn resume<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        self.common.resume(backend);
    }

    /// Restart from the first frame. A playing stream keeps playing; any
    /// other stream ends up paused at the start, queued and registered.
    pub fn rewind<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        registry: &mut PlaybackRegistry,
    ) {
        let was_playing = self.common.is_playing();
        self.stop(backend, registry);
        if was_playing {
            self.play(backend, registry);
        } else {
            self.prepare_to_play(backend, registry);
            self.common.set_state(SourceState::Paused);
        }
    }

    /// Service the stream for one frame: decode ahead, refill finished
    /// buffers and check the voice.
    pub fn pump<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, preload: usize) -> PumpStep {
        if self.decoder.preload_samples(preload) == Preload::EndOfStream {
            self.wrap_at_end();
        }

        let voice = self.common.voice();
        let processed = backend.buffers_processed(voice);
        let mut refilled = 0;
        for _ in 0..processed {
            let Some(buffer) = backend.unqueue_buffer(voice) else {
                break;
            };
            let mut uploaded = self.decoder.upload_preloaded_samples(backend, buffer);
            if uploaded == 0 && self.wrap_at_end() {
                // The stream ended inside the emergency preload; wrapping
                // now keeps the buffer in rotation at the loop seam.
                uploaded = self.decoder.upload_preloaded_samples(backend, buffer);
            }
            if uploaded > 0 {
                backend.queue_buffers(voice, &[buffer]);
                refilled += 1;
            }
        }

        let status = if backend.voice_state(voice) != VoiceState::Stopped {
            PumpStatus::Running
        } else if backend.buffers_queued(voice) == 0 {
            // Refilling decodes a full set of buffers, so it waits for the
            // next play instead of stretching this frame.
            self.common.set_state(SourceState::Stopped);
            self.armed = false;
            PumpStatus::Drained
        } else if self.common.is_playing() {
            log::warn!(
                "Stream {} stopped with {} buffer(s) queued, restarting",
                self.file,
                backend.buffers_queued(voice)
            );
            backend.play(voice);
            PumpStatus::Restarted
        } else {
            PumpStatus::Running
        };

        PumpStep { status, refilled }
    }

    /// Stop without rewinding and release every backend object.
    pub fn free<B: AudioBackend + ?Sized>(
        mut self,
        backend: &mut B,
        registry: &mut PlaybackRegistry,
    ) {
        self.stop_without_rewind(backend, registry);
        let voice = self.common.voice();
        backend.delete_buffers(&self.buffers);
        backend.delete_voice(voice);
        log::debug!("Freed stream {}", self.file);
    }
}
