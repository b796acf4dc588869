//! Ogg Vorbis decoder using `lewton`.

use anyhow::{Context, Result};
use lewton::inside_ogg::OggStreamReader;

use super::{Decoder, DecoderFactory, output_channels, push_frames};
use crate::filesystem::MediaStream;

pub struct VorbisFactory;

impl DecoderFactory for VorbisFactory {
    fn name(&self) -> &'static str {
        "vorbis"
    }

    fn sniff(&self, header: &[u8]) -> bool {
        header.starts_with(b"OggS")
    }

    fn open(&self, stream: Box<dyn MediaStream>) -> Result<Box<dyn Decoder>> {
        Ok(Box::new(VorbisDecoder::new(stream)?))
    }
}

/// Streaming Ogg Vorbis decoder, one Vorbis packet per `decode_next`.
pub struct VorbisDecoder {
    reader: OggStreamReader<Box<dyn MediaStream>>,
    source_channels: usize,
    channels: u16,
    sample_rate: u32,
}

impl VorbisDecoder {
    pub fn new(stream: Box<dyn MediaStream>) -> Result<Self> {
        let reader = OggStreamReader::new(stream).context("Failed to parse OGG stream")?;
        let source_channels = reader.ident_hdr.audio_channels as usize;
        let sample_rate = reader.ident_hdr.audio_sample_rate;
        Ok(Self {
            reader,
            source_channels,
            channels: output_channels(source_channels),
            sample_rate,
        })
    }
}

impl Decoder for VorbisDecoder {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn decode_next(&mut self, out: &mut Vec<i16>) -> Result<usize> {
        // Header and boundary packets decode to nothing; skip them.
        while let Some(packet) = self
            .reader
            .read_dec_packet_itl()
            .context("Failed to decode OGG packet")?
        {
            let appended = push_frames(out, &packet, self.source_channels);
            if appended > 0 {
                return Ok(appended);
            }
        }
        Ok(0)
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader
            .seek_absgp_pg(0)
            .context("Failed to seek OGG stream to start")
    }
}
