//! In-process backend with OpenAL queue semantics and a stereo mixer.

use std::collections::{HashMap, VecDeque};

use anyhow::{Result, bail};

use super::{AudioBackend, BufferFormat, BufferId, VoiceId, VoiceState};

/// Output channel count of [`SoftwareBackend::render`].
pub const OUTPUT_CHANNELS: usize = 2;

#[derive(Debug, Clone)]
struct Buffer {
    format: BufferFormat,
    samples: Vec<i16>,
}

impl Buffer {
    fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    /// Stereo frame at `index`; mono is copied to both sides.
    fn frame(&self, index: usize) -> (f32, f32) {
        let scale = 1.0 / i16::MAX as f32;
        match self.format.channels {
            1 => {
                let s = self.samples[index] as f32 * scale;
                (s, s)
            }
            _ => {
                let base = index * self.format.channels as usize;
                (
                    self.samples[base] as f32 * scale,
                    self.samples[base + 1] as f32 * scale,
                )
            }
        }
    }
}

#[derive(Debug)]
struct Voice {
    /// Queued buffers; the first `processed` entries have finished playing.
    queue: VecDeque<BufferId>,
    processed: usize,
    /// Fractional frame position inside the current buffer.
    cursor: f64,
    state: VoiceState,
    gain: f32,
    pitch: f32,
    looping: bool,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            processed: 0,
            cursor: 0.0,
            state: VoiceState::Stopped,
            gain: 1.0,
            pitch: 1.0,
            looping: false,
        }
    }
}

/// Software implementation of [`AudioBackend`].
///
/// Time only moves when [`render`](Self::render) or
/// [`advance`](Self::advance) is called, which makes playback fully
/// deterministic: a frame loop renders one frame's worth of output and then
/// runs the stream pump.
pub struct SoftwareBackend {
    output_rate: u32,
    listener_gain: f32,
    buffers: HashMap<u64, Buffer>,
    voices: HashMap<u64, Voice>,
    next_id: u64,
    scratch: Vec<f32>,
}

impl SoftwareBackend {
    pub fn new(output_rate: u32) -> Self {
        Self {
            output_rate: output_rate.max(1),
            listener_gain: 1.0,
            buffers: HashMap::new(),
            voices: HashMap::new(),
            next_id: 1,
            scratch: Vec::new(),
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn listener_gain(&self) -> f32 {
        self.listener_gain
    }

    /// Number of live buffers, for leak checks.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live voices, for leak checks.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Mix every playing voice into `out` (interleaved stereo), replacing
    /// its previous contents. Returns the number of frames rendered.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        let frames = out.len() / OUTPUT_CHANNELS;
        let output_rate = self.output_rate as f64;
        let listener_gain = self.listener_gain;

        for voice in self.voices.values_mut() {
            if voice.state != VoiceState::Playing {
                continue;
            }
            let gain = voice.gain * listener_gain;
            for frame in 0..frames {
                let Some((left, right, step)) = next_frame(voice, &self.buffers, output_rate)
                else {
                    break;
                };
                out[frame * OUTPUT_CHANNELS] += left * gain;
                out[frame * OUTPUT_CHANNELS + 1] += right * gain;
                voice.cursor += step;
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
        frames
    }

    /// Render `frames` frames and discard the output.
    pub fn advance(&mut self, frames: usize) {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(frames * OUTPUT_CHANNELS, 0.0);
        self.render(&mut scratch);
        self.scratch = scratch;
    }

    fn voice_mut(&mut self, voice: VoiceId) -> Option<&mut Voice> {
        let found = self.voices.get_mut(&voice.0);
        if found.is_none() {
            log::warn!("Unknown voice {:?}", voice);
        }
        found
    }
}

/// Locate the frame under the voice cursor, moving past finished buffers.
///
/// Returns the stereo frame and the cursor step, or `None` once the voice
/// ran out of queued audio (in which case it is now stopped).
fn next_frame(
    voice: &mut Voice,
    buffers: &HashMap<u64, Buffer>,
    output_rate: f64,
) -> Option<(f32, f32, f64)> {
    let mut wrapped = false;
    loop {
        if voice.processed >= voice.queue.len() {
            // A looping queue restarts once per lookup; a queue holding
            // nothing but empty buffers must not spin forever.
            if voice.looping && !voice.queue.is_empty() && !wrapped {
                voice.processed = 0;
                voice.cursor = 0.0;
                wrapped = true;
                continue;
            }
            voice.state = VoiceState::Stopped;
            voice.cursor = 0.0;
            return None;
        }

        let id = voice.queue[voice.processed];
        let Some(buffer) = buffers.get(&id.0) else {
            voice.processed += 1;
            voice.cursor = 0.0;
            continue;
        };

        let frames = buffer.frames();
        let index = voice.cursor as usize;
        if index >= frames {
            voice.cursor = (voice.cursor - frames as f64).max(0.0);
            voice.processed += 1;
            continue;
        }

        let step = voice.pitch.max(0.0) as f64 * buffer.format.sample_rate as f64 / output_rate;
        let (left, right) = buffer.frame(index);
        return Some((left, right, step));
    }
}

impl AudioBackend for SoftwareBackend {
    fn gen_buffers(&mut self, count: usize) -> Result<Vec<BufferId>> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.alloc_id();
            self.buffers.insert(
                id,
                Buffer {
                    format: BufferFormat::new(1, self.output_rate),
                    samples: Vec::new(),
                },
            );
            ids.push(BufferId(id));
        }
        Ok(ids)
    }

    fn delete_buffers(&mut self, buffers: &[BufferId]) {
        for buffer in buffers {
            self.buffers.remove(&buffer.0);
        }
    }

    fn buffer_data(
        &mut self,
        buffer: BufferId,
        format: BufferFormat,
        samples: &[i16],
    ) -> Result<()> {
        if !(1..=2).contains(&format.channels) {
            bail!("Unsupported channel count: {}", format.channels);
        }
        if format.sample_rate == 0 {
            bail!("Sample rate must be positive");
        }
        let Some(target) = self.buffers.get_mut(&buffer.0) else {
            bail!("Unknown buffer {:?}", buffer);
        };
        target.format = format;
        target.samples.clear();
        target.samples.extend_from_slice(samples);
        Ok(())
    }

    fn create_voice(&mut self) -> Result<VoiceId> {
        let id = self.alloc_id();
        self.voices.insert(id, Voice::default());
        Ok(VoiceId(id))
    }

    fn delete_voice(&mut self, voice: VoiceId) {
        self.voices.remove(&voice.0);
    }

    fn set_voice_buffer(&mut self, voice: VoiceId, buffer: Option<BufferId>) {
        if let Some(v) = self.voice_mut(voice) {
            v.state = VoiceState::Stopped;
            v.queue.clear();
            v.queue.extend(buffer);
            v.processed = 0;
            v.cursor = 0.0;
        }
    }

    fn queue_buffers(&mut self, voice: VoiceId, buffers: &[BufferId]) {
        if let Some(v) = self.voice_mut(voice) {
            v.queue.extend(buffers.iter().copied());
        }
    }

    fn unqueue_buffer(&mut self, voice: VoiceId) -> Option<BufferId> {
        let v = self.voice_mut(voice)?;
        if v.processed == 0 {
            return None;
        }
        v.processed -= 1;
        v.queue.pop_front()
    }

    fn buffers_processed(&self, voice: VoiceId) -> usize {
        self.voices.get(&voice.0).map_or(0, |v| v.processed)
    }

    fn buffers_queued(&self, voice: VoiceId) -> usize {
        self.voices.get(&voice.0).map_or(0, |v| v.queue.len())
    }

    fn voice_state(&self, voice: VoiceId) -> VoiceState {
        self.voices
            .get(&voice.0)
            .map_or(VoiceState::Stopped, |v| v.state)
    }

    fn play(&mut self, voice: VoiceId) {
        if let Some(v) = self.voice_mut(voice) {
            match v.state {
                VoiceState::Playing => {}
                VoiceState::Paused => v.state = VoiceState::Playing,
                VoiceState::Stopped => {
                    v.processed = 0;
                    v.cursor = 0.0;
                    if !v.queue.is_empty() {
                        v.state = VoiceState::Playing;
                    }
                }
            }
        }
    }

    fn pause(&mut self, voice: VoiceId) {
        if let Some(v) = self.voice_mut(voice) {
            if v.state == VoiceState::Playing {
                v.state = VoiceState::Paused;
            }
        }
    }

    fn stop(&mut self, voice: VoiceId) {
        if let Some(v) = self.voice_mut(voice) {
            v.state = VoiceState::Stopped;
            v.processed = v.queue.len();
            v.cursor = 0.0;
        }
    }

    fn rewind(&mut self, voice: VoiceId) {
        if let Some(v) = self.voice_mut(voice) {
            v.state = VoiceState::Stopped;
            v.processed = 0;
            v.cursor = 0.0;
        }
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) {
        if let Some(v) = self.voice_mut(voice) {
            v.gain = gain.max(0.0);
        }
    }

    fn set_pitch(&mut self, voice: VoiceId, pitch: f32) {
        if let Some(v) = self.voice_mut(voice) {
            v.pitch = pitch.max(0.0);
        }
    }

    fn set_looping(&mut self, voice: VoiceId, looping: bool) {
        if let Some(v) = self.voice_mut(voice) {
            v.looping = looping;
        }
    }

    fn is_looping(&self, voice: VoiceId) -> bool {
        self.voices.get(&voice.0).is_some_and(|v| v.looping)
    }

    fn set_listener_gain(&mut self, gain: f32) {
        self.listener_gain = gain;
    }
}
