//! Hardware voice abstraction.
//!
//! The engine never talks to an audio API directly. It drives buffers and
//! voices through [`AudioBackend`], which follows the OpenAL object model:
//! buffers hold decoded PCM, voices play a queue of buffers.

mod software;

pub use software::SoftwareBackend;

use anyhow::Result;

/// Handle for a backend sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Handle for a backend voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

/// Playback state reported by a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Layout of the interleaved 16-bit samples stored in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFormat {
    /// 1 (mono) or 2 (stereo).
    pub channels: u16,
    pub sample_rate: u32,
}

impl BufferFormat {
    pub const fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }
}

/// Abstraction over buffer-queue audio backends.
/// Implementations: SoftwareBackend (in-process mixer), MockBackend (testing).
///
/// Queue semantics follow OpenAL: the queued count includes buffers that
/// have already been processed, stopping a voice marks every queued buffer
/// processed, and only processed buffers can be unqueued.
pub trait AudioBackend {
    fn gen_buffers(&mut self, count: usize) -> Result<Vec<BufferId>>;
    fn delete_buffers(&mut self, buffers: &[BufferId]);

    /// Replace the contents of `buffer` with interleaved samples.
    fn buffer_data(
        &mut self,
        buffer: BufferId,
        format: BufferFormat,
        samples: &[i16],
    ) -> Result<()>;

    fn create_voice(&mut self) -> Result<VoiceId>;
    fn delete_voice(&mut self, voice: VoiceId);

    /// Attach a single buffer to the voice, replacing its queue.
    /// `None` detaches everything.
    fn set_voice_buffer(&mut self, voice: VoiceId, buffer: Option<BufferId>);

    fn queue_buffers(&mut self, voice: VoiceId, buffers: &[BufferId]);

    /// Remove the oldest processed buffer from the queue.
    fn unqueue_buffer(&mut self, voice: VoiceId) -> Option<BufferId>;

    fn buffers_processed(&self, voice: VoiceId) -> usize;
    fn buffers_queued(&self, voice: VoiceId) -> usize;
    fn voice_state(&self, voice: VoiceId) -> VoiceState;

    /// Start a stopped voice from its first queued buffer, or resume a
    /// paused one. Playing a voice that is already playing has no effect.
    fn play(&mut self, voice: VoiceId);
    fn pause(&mut self, voice: VoiceId);
    fn stop(&mut self, voice: VoiceId);

    /// Return to the start of the queue, leaving the voice stopped.
    fn rewind(&mut self, voice: VoiceId);

    fn set_gain(&mut self, voice: VoiceId, gain: f32);
    fn set_pitch(&mut self, voice: VoiceId, pitch: f32);

    /// Loop the whole queue. Only static sources use this.
    fn set_looping(&mut self, voice: VoiceId, looping: bool);
    fn is_looping(&self, voice: VoiceId) -> bool;

    /// Gain applied to everything the backend outputs.
    fn set_listener_gain(&mut self, gain: f32);
}
