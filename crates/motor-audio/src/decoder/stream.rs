//! Preload/upload staging for streamed playback.
//!
//! Decoding and uploading are split: `preload_samples` decodes into a
//! staging area in small steps (once per frame), `upload_preloaded_samples`
//! moves everything staged into one backend buffer when the voice hands a
//! buffer back.

use anyhow::Result;

use super::{Decoder, DecoderRegistry};
use crate::backend::{AudioBackend, BufferFormat, BufferId};
use crate::filesystem::MediaStream;

/// Outcome of [`StreamDecoder::preload_samples`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preload {
    /// This many interleaved samples were staged (always > 0).
    Decoded(usize),
    /// The staging area has no room left.
    Full,
    /// The stream has nothing more to decode.
    EndOfStream,
}

/// An open stream plus its staging area.
pub struct StreamDecoder {
    codec: Box<dyn Decoder>,
    format: BufferFormat,
    /// Decoded samples waiting for upload.
    staging: Vec<i16>,
    /// Upper bound for `staging.len()`.
    capacity: usize,
    /// Samples the codec produced beyond what the last preload asked for.
    pending: Vec<i16>,
    pending_pos: usize,
    exhausted: bool,
    /// Samples staged since the last rewind.
    position: u64,
}

impl StreamDecoder {
    pub fn new(codec: Box<dyn Decoder>) -> Self {
        let format = codec.format();
        let channels = format.channels.max(1) as usize;
        let capacity = (channels * format.sample_rate as usize).max(channels);
        Self {
            codec,
            format,
            staging: Vec::with_capacity(capacity),
            capacity,
            pending: Vec::new(),
            pending_pos: 0,
            exhausted: false,
            position: 0,
        }
    }

    /// Sniff `stream`, open it with the matching decoder and wrap it.
    pub fn open(registry: &DecoderRegistry, stream: Box<dyn MediaStream>) -> Result<Self> {
        Ok(Self::new(registry.open(stream)?))
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn format(&self) -> BufferFormat {
        self.format
    }

    /// Samples currently staged.
    pub fn staged(&self) -> usize {
        self.staging.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Interleaved samples decoded into staging since the last rewind.
    pub fn decode_position(&self) -> u64 {
        self.position
    }

    pub fn duration_frames(&self) -> Option<u64> {
        self.codec.duration_frames()
    }

    /// True once every sample of the stream has been staged.
    pub fn at_end(&self) -> bool {
        self.exhausted && self.pending_pos >= self.pending.len()
    }

    /// Decode up to `requested` interleaved samples into staging.
    ///
    /// A request larger than the staging capacity grows it. Decode errors
    /// end the stream.
    pub fn preload_samples(&mut self, requested: usize) -> Preload {
        if self.at_end() {
            return Preload::EndOfStream;
        }

        let channels = self.format.channels.max(1) as usize;
        let requested = requested.max(channels);
        if requested > self.capacity {
            self.capacity = requested;
            self.staging.reserve(self.capacity - self.staging.len());
        }

        let space = self.capacity - self.staging.len();
        let target = requested.min(space);
        let target = target - target % channels;
        if target == 0 {
            return Preload::Full;
        }

        let mut produced = 0;
        while produced < target {
            if self.pending_pos >= self.pending.len() {
                self.pending.clear();
                self.pending_pos = 0;
                if self.exhausted || !self.decode_chunk() {
                    break;
                }
                continue;
            }
            let take = (target - produced).min(self.pending.len() - self.pending_pos);
            self.staging
                .extend_from_slice(&self.pending[self.pending_pos..self.pending_pos + take]);
            self.pending_pos += take;
            produced += take;
        }

        self.position += produced as u64;
        if produced == 0 {
            Preload::EndOfStream
        } else {
            Preload::Decoded(produced)
        }
    }

    /// Refill `pending` from the codec. Returns false when the stream ended.
    fn decode_chunk(&mut self) -> bool {
        match self.codec.decode_next(&mut self.pending) {
            Ok(0) => {
                self.exhausted = true;
                false
            }
            Ok(_) => true,
            Err(e) => {
                log::warn!("Audio decode failed, ending stream: {e:#}");
                self.pending.clear();
                self.exhausted = true;
                false
            }
        }
    }

    /// Move all staged samples into `buffer`.
    ///
    /// Runs one synchronous preload first when less than half the staging
    /// capacity is filled and the stream is not over. Returns the number of
    /// samples uploaded; 0 means the buffer received nothing and must not be
    /// queued.
    pub fn upload_preloaded_samples<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        buffer: BufferId,
    ) -> usize {
        if !self.at_end() && self.staging.len() < self.capacity / 2 {
            self.preload_samples(self.capacity / 2);
        }

        if self.staging.is_empty() {
            return 0;
        }

        match backend.buffer_data(buffer, self.format, &self.staging) {
            Ok(()) => {
                let uploaded = self.staging.len();
                self.staging.clear();
                uploaded
            }
            Err(e) => {
                log::warn!("Failed to upload {} samples: {e:#}", self.staging.len());
                0
            }
        }
    }

    /// Seek back to the first frame. Staged samples are kept.
    pub fn rewind(&mut self) {
        self.pending.clear();
        self.pending_pos = 0;
        self.position = 0;
        match self.codec.rewind() {
            Ok(()) => self.exhausted = false,
            Err(e) => {
                log::warn!("Audio rewind failed, ending stream: {e:#}");
                self.exhausted = true;
            }
        }
    }

    /// Drop staged samples without moving the decode position.
    pub fn flush(&mut self) {
        self.staging.clear();
    }
}
