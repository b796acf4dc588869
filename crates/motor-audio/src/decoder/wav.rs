//! RIFF/WAVE decoder using `hound`.

use std::io::BufReader;

use anyhow::{Context, Result, bail};
use hound::{SampleFormat, WavReader};

use super::{Decoder, DecoderFactory, output_channels, push_frames};
use crate::filesystem::MediaStream;

/// Frames read per `decode_next` call.
const CHUNK_FRAMES: usize = 4096;

pub struct WavFactory;

impl DecoderFactory for WavFactory {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn sniff(&self, header: &[u8]) -> bool {
        header.len() >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"WAVE"
    }

    fn open(&self, stream: Box<dyn MediaStream>) -> Result<Box<dyn Decoder>> {
        Ok(Box::new(WavDecoder::new(stream)?))
    }
}

pub struct WavDecoder {
    reader: WavReader<BufReader<Box<dyn MediaStream>>>,
    source_channels: usize,
    channels: u16,
    sample_rate: u32,
    sample_format: SampleFormat,
    bits_per_sample: u16,
    /// Frames left before the end of the data chunk.
    remaining: u32,
    scratch: Vec<i16>,
}

impl WavDecoder {
    pub fn new(stream: Box<dyn MediaStream>) -> Result<Self> {
        let reader =
            WavReader::new(BufReader::new(stream)).context("Failed to parse WAV header")?;
        let spec = reader.spec();
        if spec.channels == 0 {
            bail!("WAV stream has no channels");
        }
        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 1..=32) | (SampleFormat::Float, 32) => {}
            (format, bits) => bail!("Unsupported WAV sample format: {format:?} {bits}-bit"),
        }
        let remaining = reader.duration();
        Ok(Self {
            source_channels: spec.channels as usize,
            channels: output_channels(spec.channels as usize),
            sample_rate: spec.sample_rate,
            sample_format: spec.sample_format,
            bits_per_sample: spec.bits_per_sample,
            remaining,
            reader,
            scratch: Vec::new(),
        })
    }

    fn read_chunk(&mut self, samples: usize) -> Result<()> {
        self.scratch.clear();
        match self.sample_format {
            SampleFormat::Float => {
                for sample in self.reader.samples::<f32>().take(samples) {
                    let sample = sample.context("Failed to read WAV sample")?;
                    self.scratch
                        .push((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
                }
            }
            SampleFormat::Int if self.bits_per_sample <= 16 => {
                let shift = 16 - self.bits_per_sample;
                for sample in self.reader.samples::<i16>().take(samples) {
                    let sample = sample.context("Failed to read WAV sample")?;
                    self.scratch.push(sample << shift);
                }
            }
            SampleFormat::Int => {
                let shift = self.bits_per_sample - 16;
                for sample in self.reader.samples::<i32>().take(samples) {
                    let sample = sample.context("Failed to read WAV sample")?;
                    self.scratch.push((sample >> shift) as i16);
                }
            }
        }
        Ok(())
    }
}

impl Decoder for WavDecoder {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn decode_next(&mut self, out: &mut Vec<i16>) -> Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let frames = (self.remaining as usize).min(CHUNK_FRAMES);
        self.read_chunk(frames * self.source_channels)?;
        let read_frames = self.scratch.len() / self.source_channels;
        if read_frames == 0 {
            self.remaining = 0;
            return Ok(0);
        }
        self.remaining -= read_frames as u32;
        Ok(push_frames(out, &self.scratch, self.source_channels))
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader
            .seek(0)
            .context("Failed to seek WAV stream to start")?;
        self.remaining = self.reader.duration();
        Ok(())
    }

    fn duration_frames(&self) -> Option<u64> {
        Some(self.reader.duration() as u64)
    }
}
