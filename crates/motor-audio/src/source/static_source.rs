//! Fully decoded sources.
//!
//! The decoded audio lives in one backend buffer that every clone shares.
//! Looping and rewinding are left to the voice.

use std::rc::Rc;

use anyhow::{Context, Result};

use super::common::{SourceCommon, SourceState};
use crate::backend::{AudioBackend, BufferFormat, BufferId, VoiceState};

/// A backend buffer holding a whole decoded file.
#[derive(Debug)]
pub struct StaticBuffer {
    buffer: BufferId,
    format: BufferFormat,
    frames: usize,
}

impl StaticBuffer {
    /// Upload `samples` into a new backend buffer.
    pub fn upload<B: AudioBackend + ?Sized>(
        backend: &mut B,
        format: BufferFormat,
        samples: &[i16],
    ) -> Result<Self> {
        let buffer = backend
            .gen_buffers(1)?
            .first()
            .copied()
            .context("Backend returned no buffer")?;
        if let Err(e) = backend.buffer_data(buffer, format, samples) {
            backend.delete_buffers(&[buffer]);
            return Err(e);
        }
        Ok(Self {
            buffer,
            format,
            frames: samples.len() / format.channels.max(1) as usize,
        })
    }

    pub fn id(&self) -> BufferId {
        self.buffer
    }

    pub fn format(&self) -> BufferFormat {
        self.format
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

pub struct StaticSource {
    common: SourceCommon,
    buffer: Rc<StaticBuffer>,
    file: String,
}

impl StaticSource {
    /// Attach `buffer` to a fresh voice.
    pub fn new<B: AudioBackend + ?Sized>(
        backend: &mut B,
        buffer: Rc<StaticBuffer>,
        file: &str,
    ) -> Result<Self> {
        let voice = backend.create_voice()?;
        backend.set_voice_buffer(voice, Some(buffer.id()));
        Ok(Self {
            common: SourceCommon::new(voice),
            buffer,
            file: file.to_string(),
        })
    }

    pub fn common(&self) -> &SourceCommon {
        &self.common
    }

    pub fn common_mut(&mut self) -> &mut SourceCommon {
        &mut self.common
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn buffer(&self) -> &Rc<StaticBuffer> {
        &self.buffer
    }

    /// Sources sharing this source's buffer, itself included.
    pub fn share_count(&self) -> usize {
        Rc::strong_count(&self.buffer)
    }

    /// Current state. A voice that ran off the end of its buffer reports
    /// stopped even though nobody called `stop`.
    pub fn state<B: AudioBackend + ?Sized>(&self, backend: &B) -> SourceState {
        match self.common.state() {
            SourceState::Playing
                if backend.voice_state(self.common.voice()) == VoiceState::Stopped =>
            {
                SourceState::Stopped
            }
            state => state,
        }
    }

    pub fn play<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.state(backend) != SourceState::Playing {
            self.common.play(backend);
        }
    }

    pub fn stop<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        self.common.stop(backend);
        backend.rewind(self.common.voice());
    }

    pub fn pause<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.state(backend) == SourceState::Playing {
            self.common.pause(backend);
        }
    }

    pub fn resume<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        self.common.resume(backend);
    }

    /// Jump back to the first frame, keeping the current state.
    pub fn rewind<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        let was_playing = self.state(backend) == SourceState::Playing;
        let voice = self.common.voice();
        backend.rewind(voice);
        if was_playing {
            backend.play(voice);
        } else if self.common.state() == SourceState::Playing {
            self.common.set_state(SourceState::Stopped);
        }
    }

    pub fn set_looping<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, looping: bool) {
        backend.set_looping(self.common.voice(), looping);
    }

    pub fn is_looping<B: AudioBackend + ?Sized>(&self, backend: &B) -> bool {
        backend.is_looping(self.common.voice())
    }

    /// New source on its own voice sharing this source's buffer.
    pub fn clone_source<B: AudioBackend + ?Sized>(&self, backend: &mut B) -> Result<Self> {
        Self::new(backend, Rc::clone(&self.buffer), &self.file)
    }

    /// Release the voice. The buffer is deleted when this was its last user.
    pub fn free<B: AudioBackend + ?Sized>(mut self, backend: &mut B) {
        let voice = self.common.voice();
        self.stop(backend);
        backend.set_voice_buffer(voice, None);
        backend.delete_voice(voice);
        if let Some(buffer) = Rc::into_inner(self.buffer) {
            log::debug!("Deleting static buffer for {}", self.file);
            backend.delete_buffers(&[buffer.id()]);
        }
    }
}
