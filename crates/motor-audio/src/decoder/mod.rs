//! Decoder capability.
//!
//! A [`Decoder`] turns a byte stream into interleaved 16-bit PCM, one chunk
//! at a time. [`DecoderFactory`] recognizes a format from the first bytes of
//! a stream and opens decoders for it; [`DecoderRegistry`] picks the factory.
//! [`StreamDecoder`] layers the preload/upload staging protocol used by
//! stream sources on top of any codec.

mod stream;
mod symphonia_codec;
mod vorbis;
mod wav;

pub use self::stream::{Preload, StreamDecoder};
pub use self::symphonia_codec::{SymphoniaDecoder, SymphoniaFactory};
pub use self::vorbis::{VorbisDecoder, VorbisFactory};
pub use self::wav::{WavDecoder, WavFactory};

use std::io::SeekFrom;

use anyhow::{Context, Result, anyhow, bail};

use crate::backend::BufferFormat;
use crate::filesystem::MediaStream;

/// Number of leading bytes handed to [`DecoderFactory::sniff`].
pub const SNIFF_LEN: usize = 16;

/// Largest channel count a decoder hands out. Wider streams keep their
/// first two channels.
pub const MAX_OUTPUT_CHANNELS: u16 = 2;

/// One open, decodable audio stream.
pub trait Decoder {
    /// Output channel count, 1 or 2.
    fn channels(&self) -> u16;

    fn sample_rate(&self) -> u32;

    /// Decode the next chunk of audio, appending whole interleaved frames to
    /// `out`. Returns the number of samples appended; 0 means the stream is
    /// exhausted.
    fn decode_next(&mut self, out: &mut Vec<i16>) -> Result<usize>;

    /// Seek back to the first frame.
    fn rewind(&mut self) -> Result<()>;

    /// Total length in frames, when the container states it.
    fn duration_frames(&self) -> Option<u64> {
        None
    }

    fn format(&self) -> BufferFormat {
        BufferFormat::new(self.channels(), self.sample_rate())
    }
}

/// A codec that can be selected by format sniffing.
pub trait DecoderFactory {
    fn name(&self) -> &'static str;

    /// Whether `header` (up to [`SNIFF_LEN`] bytes) looks like this format.
    fn sniff(&self, header: &[u8]) -> bool;

    fn open(&self, stream: Box<dyn MediaStream>) -> Result<Box<dyn Decoder>>;
}

/// Registered decoders, consulted in registration order.
#[derive(Default)]
pub struct DecoderRegistry {
    factories: Vec<Box<dyn DecoderFactory>>,
}

impl DecoderRegistry {
    /// Registry with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in Ogg Vorbis, WAV and FLAC/MP3 decoders.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(VorbisFactory);
        registry.register(WavFactory);
        registry.register(SymphoniaFactory);
        registry
    }

    pub fn register<F: DecoderFactory + 'static>(&mut self, factory: F) {
        self.factories.push(Box::new(factory));
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    /// Pick the factory for `stream`. The stream is left at its start.
    ///
    /// With a single registered factory no sniffing happens: it is used for
    /// everything.
    pub fn select(&self, stream: &mut dyn MediaStream) -> Result<&dyn DecoderFactory> {
        match self.factories.as_slice() {
            [] => bail!("No audio decoders registered"),
            [only] => return Ok(only.as_ref()),
            _ => {}
        }

        let header = read_header(stream)?;
        self.factories
            .iter()
            .find(|f| f.sniff(&header))
            .map(|f| f.as_ref())
            .ok_or_else(|| anyhow!("Unrecognized audio format"))
    }

    /// Sniff and open `stream` with the matching decoder.
    pub fn open(&self, mut stream: Box<dyn MediaStream>) -> Result<Box<dyn Decoder>> {
        let factory = self.select(stream.as_mut())?;
        log::debug!("Opening audio stream with {} decoder", factory.name());
        factory
            .open(stream)
            .with_context(|| format!("{} decoder rejected the stream", factory.name()))
    }
}

fn read_header(stream: &mut dyn MediaStream) -> Result<Vec<u8>> {
    let mut header = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = stream
            .read(&mut header[filled..])
            .context("Failed to read audio header")?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header.truncate(filled);
    stream
        .seek(SeekFrom::Start(0))
        .context("Audio stream is not seekable")?;
    Ok(header)
}

/// Decode everything `decoder` has left into one sample vector.
pub fn decode_all(decoder: &mut dyn Decoder) -> Result<(BufferFormat, Vec<i16>)> {
    let mut samples = Vec::new();
    while decoder.decode_next(&mut samples)? > 0 {}
    Ok((decoder.format(), samples))
}

/// Output channel count for a stream with `source_channels` channels.
pub(crate) fn output_channels(source_channels: usize) -> u16 {
    if source_channels >= 2 {
        MAX_OUTPUT_CHANNELS
    } else {
        1
    }
}

/// Append interleaved `input` to `out`, keeping at most the first two
/// channels of every frame. Trailing partial frames are dropped.
pub(crate) fn push_frames(out: &mut Vec<i16>, input: &[i16], source_channels: usize) -> usize {
    if source_channels == 0 {
        return 0;
    }
    let keep = output_channels(source_channels) as usize;
    let before = out.len();
    if keep == source_channels {
        let whole = input.len() - input.len() % source_channels;
        out.extend_from_slice(&input[..whole]);
    } else {
        for frame in input.chunks_exact(source_channels) {
            out.extend_from_slice(&frame[..keep]);
        }
    }
    out.len() - before
}
