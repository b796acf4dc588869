//! FLAC and MP3 decoding through `symphonia`.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use anyhow::{Context, Result, anyhow, bail};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder as CodecDecoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default;

use super::{Decoder, DecoderFactory, output_channels, push_frames};
use crate::filesystem::MediaStream;

pub struct SymphoniaFactory;

impl DecoderFactory for SymphoniaFactory {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    fn sniff(&self, header: &[u8]) -> bool {
        header.starts_with(b"fLaC")
            || header.starts_with(b"ID3")
            || (header.len() >= 2 && header[0] == 0xFF && header[1] & 0xE0 == 0xE0)
    }

    fn open(&self, stream: Box<dyn MediaStream>) -> Result<Box<dyn Decoder>> {
        Ok(Box::new(SymphoniaDecoder::new(stream)?))
    }
}

/// Adapts a [`MediaStream`] to symphonia's source trait.
///
/// The length is measured once up front; the MP3 reader needs it to seek.
struct SymphoniaSource {
    stream: Box<dyn MediaStream>,
    len: Option<u64>,
}

impl SymphoniaSource {
    fn new(mut stream: Box<dyn MediaStream>) -> Self {
        let len = stream_len(stream.as_mut());
        Self { stream, len }
    }
}

/// Total byte length, leaving the read position where it was.
fn stream_len(stream: &mut dyn MediaStream) -> Option<u64> {
    let position = stream.stream_position().ok()?;
    let end = stream.seek(SeekFrom::End(0)).ok()?;
    if let Err(e) = stream.seek(SeekFrom::Start(position)) {
        log::warn!("Failed to restore stream position: {e}");
    }
    Some(end)
}

impl Read for SymphoniaSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Seek for SymphoniaSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.stream.seek(pos)
    }
}

impl MediaSource for SymphoniaSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        self.len
    }
}

pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    codec: Box<dyn CodecDecoder>,
    track_id: u32,
    source_channels: usize,
    channels: u16,
    sample_rate: u32,
    duration: Option<u64>,
    samples: Option<SampleBuffer<i16>>,
}

impl SymphoniaDecoder {
    pub fn new(stream: Box<dyn MediaStream>) -> Result<Self> {
        let source = MediaSourceStream::new(
            Box::new(SymphoniaSource::new(stream)),
            MediaSourceStreamOptions::default(),
        );
        let probed = default::get_probe()
            .format(
                &Hint::new(),
                source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .context("Could not recognize audio format")?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| anyhow!("Audio file has no decodable track"))?;
        let params = &track.codec_params;
        let source_channels = params.channels.map(|c| c.count()).unwrap_or(0);
        if source_channels == 0 {
            bail!("Audio track does not declare its channels");
        }
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| anyhow!("Audio track does not declare its sample rate"))?;
        let track_id = track.id;
        let duration = params.n_frames;

        let codec = default::get_codecs()
            .make(params, &DecoderOptions::default())
            .context("Failed to create a decoder for the audio")?;

        Ok(Self {
            format,
            codec,
            track_id,
            source_channels,
            channels: output_channels(source_channels),
            sample_rate,
            duration,
            samples: None,
        })
    }
}

impl Decoder for SymphoniaDecoder {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn decode_next(&mut self, out: &mut Vec<i16>) -> Result<usize> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(0);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.codec.reset();
                    continue;
                }
                Err(e) => return Err(e).context("Failed to read audio packet"),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.codec.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Skipping undecodable audio packet: {e}");
                    continue;
                }
                Err(e) => return Err(e).context("Failed to decode audio packet"),
            };
            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let needed = decoded.capacity() * spec.channels.count();
            if self.samples.as_ref().is_none_or(|b| b.capacity() < needed) {
                self.samples = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buffer) = self.samples.as_mut() else {
                continue;
            };
            buffer.copy_interleaved_ref(decoded);
            let appended = push_frames(out, buffer.samples(), self.source_channels);
            if appended > 0 {
                return Ok(appended);
            }
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: 0,
                    track_id: self.track_id,
                },
            )
            .context("Failed to seek audio stream to start")?;
        self.codec.reset();
        Ok(())
    }

    fn duration_frames(&self) -> Option<u64> {
        self.duration
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_sniff() {
        let factory = SymphoniaFactory;
        assert!(factory.sniff(b"fLaC\0\0\0\x22"));
        assert!(factory.sniff(b"ID3\x04\0"));
        assert!(factory.sniff(&[0xFF, 0xFB, 0x90, 0x64]));
        assert!(!factory.sniff(b"OggS"));
        assert!(!factory.sniff(b"RIFF"));
        assert!(!factory.sniff(&[0xFF]));
    }

    #[test]
    fn test_source_reports_length_and_keeps_position() {
        let mut cursor = Cursor::new(vec![7u8; 100]);
        cursor.set_position(10);
        let mut source = SymphoniaSource::new(Box::new(cursor));
        assert_eq!(source.byte_len(), Some(100));
        assert!(source.is_seekable());
        assert_eq!(source.stream_position().unwrap(), 10);
    }

    #[test]
    fn test_rejects_garbage() {
        let stream = Box::new(Cursor::new(vec![0u8; 64]));
        assert!(SymphoniaFactory.open(stream).is_err());
    }
}
