//! Audio engine context.
//!
//! [`AudioEngine`] owns the backend, the decoder registry, every source and
//! the set of playing streams. Script-facing operations go through
//! [`Source`] handles; [`AudioEngine::update_streams`] must be called once
//! per frame to keep streams fed.

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};

use crate::backend::AudioBackend;
use crate::config::{AudioConfig, clamp_volume};
use crate::decoder::{DecoderRegistry, StreamDecoder, decode_all};
use crate::filesystem::{AssetSource, DirectorySource};
use crate::registry::{PlaybackRegistry, Sweep};
use crate::source::{
    PumpStatus, Source, SourceKind, SourceState, StaticBuffer, StaticId, StaticSource, StreamId,
    StreamSource,
};

/// Summary of one [`AudioEngine::update_streams`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Streams serviced.
    pub visited: usize,
    /// Buffers refilled and requeued.
    pub refilled: usize,
    /// Voices restarted after running dry with buffers queued.
    pub restarted: usize,
    /// Streams that played out and left the registry.
    pub retired: usize,
}

pub struct AudioEngine<B: AudioBackend> {
    backend: B,
    config: AudioConfig,
    assets: Box<dyn AssetSource>,
    decoders: DecoderRegistry,
    registry: PlaybackRegistry,
    statics: HashMap<StaticId, StaticSource>,
    streams: HashMap<StreamId, StreamSource>,
    next_id: u64,
    master_volume: f32,
}

impl<B: AudioBackend> AudioEngine<B> {
    /// Engine reading assets relative to the working directory.
    pub fn new(backend: B, config: AudioConfig) -> Self {
        Self::with_assets(backend, config, DirectorySource::current_dir())
    }

    pub fn with_assets<A: AssetSource + 'static>(
        backend: B,
        config: AudioConfig,
        assets: A,
    ) -> Self {
        let config = config.sanitized();
        let mut engine = Self {
            backend,
            master_volume: config.master_volume,
            config,
            assets: Box::new(assets),
            decoders: DecoderRegistry::with_defaults(),
            registry: PlaybackRegistry::new(),
            statics: HashMap::new(),
            streams: HashMap::new(),
            next_id: 0,
        };
        engine.backend.set_listener_gain(engine.master_volume);
        engine
    }

    /// Replace the decoder set.
    pub fn with_decoders(mut self, decoders: DecoderRegistry) -> Self {
        self.decoders = decoders;
        self
    }

    pub fn decoders_mut(&mut self) -> &mut DecoderRegistry {
        &mut self.decoders
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Load `file` the way `kind` asks for.
    pub fn new_source(&mut self, file: &str, kind: SourceKind) -> Result<Source> {
        match kind {
            SourceKind::Static => self.load_static(file).map(Source::Static),
            SourceKind::Stream => self.load_stream(file).map(Source::Stream),
        }
    }

    /// Open `file` for streaming. The first seconds are decoded right away.
    pub fn load_stream(&mut self, file: &str) -> Result<StreamId> {
        let data = self.assets.open(file)?;
        let decoder = StreamDecoder::open(&self.decoders, data)
            .with_context(|| format!("Failed to decode audio file: {file}"))?;
        let id = StreamId(self.alloc_id());
        let source = StreamSource::new(
            &mut self.backend,
            id,
            file,
            decoder,
            self.config.initial_preload_samples,
        )
        .with_context(|| format!("Failed to load stream: {file}"))?;
        self.streams.insert(id, source);
        Ok(id)
    }

    /// Decode all of `file` into a single buffer.
    pub fn load_static(&mut self, file: &str) -> Result<StaticId> {
        let data = self.assets.open(file)?;
        let mut codec = self
            .decoders
            .open(data)
            .with_context(|| format!("Failed to decode audio file: {file}"))?;
        let (format, samples) = decode_all(codec.as_mut())
            .with_context(|| format!("Failed to decode audio file: {file}"))?;
        let buffer = StaticBuffer::upload(&mut self.backend, format, &samples)
            .with_context(|| format!("Failed to upload audio file: {file}"))?;
        let buffer_id = buffer.id();
        let source = match StaticSource::new(&mut self.backend, Rc::new(buffer), file) {
            Ok(source) => source,
            Err(e) => {
                self.backend.delete_buffers(&[buffer_id]);
                return Err(e.context(format!("Failed to load static source: {file}")));
            }
        };
        log::debug!(
            "Loaded static {file}: {} ch, {} Hz, {} frames",
            format.channels,
            format.sample_rate,
            samples.len() / format.channels.max(1) as usize
        );
        let id = StaticId(self.alloc_id());
        self.statics.insert(id, source);
        Ok(id)
    }

    pub fn play(&mut self, source: Source) -> Result<()> {
        match source {
            Source::Static(id) => static_entry(&mut self.statics, id)?.play(&mut self.backend),
            Source::Stream(id) => {
                stream_entry(&mut self.streams, id)?.play(&mut self.backend, &mut self.registry)
            }
        }
        Ok(())
    }

    pub fn stop(&mut self, source: Source) -> Result<()> {
        match source {
            Source::Static(id) => static_entry(&mut self.statics, id)?.stop(&mut self.backend),
            Source::Stream(id) => {
                stream_entry(&mut self.streams, id)?.stop(&mut self.backend, &mut self.registry)
            }
        }
        Ok(())
    }

    pub fn pause(&mut self, source: Source) -> Result<()> {
        match source {
            Source::Static(id) => static_entry(&mut self.statics, id)?.pause(&mut self.backend),
            Source::Stream(id) => stream_entry(&mut self.streams, id)?.pause(&mut self.backend),
        }
        Ok(())
    }

    pub fn resume(&mut self, source: Source) -> Result<()> {
        match source {
            Source::Static(id) => static_entry(&mut self.statics, id)?.resume(&mut self.backend),
            Source::Stream(id) => stream_entry(&mut self.streams, id)?.resume(&mut self.backend),
        }
        Ok(())
    }

    pub fn rewind(&mut self, source: Source) -> Result<()> {
        match source {
            Source::Static(id) => static_entry(&mut self.statics, id)?.rewind(&mut self.backend),
            Source::Stream(id) => {
                stream_entry(&mut self.streams, id)?.rewind(&mut self.backend, &mut self.registry)
            }
        }
        Ok(())
    }

    pub fn set_looping(&mut self, source: Source, looping: bool) -> Result<()> {
        match source {
            Source::Static(id) => {
                static_entry(&mut self.statics, id)?.set_looping(&mut self.backend, looping)
            }
            Source::Stream(id) => stream_entry(&mut self.streams, id)?.set_looping(looping),
        }
        Ok(())
    }

    pub fn is_looping(&self, source: Source) -> Result<bool> {
        Ok(match source {
            Source::Static(id) => self.static_ref(id)?.is_looping(&self.backend),
            Source::Stream(id) => self.stream_ref(id)?.is_looping(),
        })
    }

    pub fn set_volume(&mut self, source: Source, volume: f32) -> Result<()> {
        match source {
            Source::Static(id) => static_entry(&mut self.statics, id)?
                .common_mut()
                .set_volume(&mut self.backend, volume),
            Source::Stream(id) => stream_entry(&mut self.streams, id)?
                .common_mut()
                .set_volume(&mut self.backend, volume),
        }
        Ok(())
    }

    pub fn volume(&self, source: Source) -> Result<f32> {
        Ok(match source {
            Source::Static(id) => self.static_ref(id)?.common().volume(),
            Source::Stream(id) => self.stream_ref(id)?.common().volume(),
        })
    }

    pub fn set_pitch(&mut self, source: Source, pitch: f32) -> Result<()> {
        match source {
            Source::Static(id) => static_entry(&mut self.statics, id)?
                .common_mut()
                .set_pitch(&mut self.backend, pitch),
            Source::Stream(id) => stream_entry(&mut self.streams, id)?
                .common_mut()
                .set_pitch(&mut self.backend, pitch),
        }
    }

    pub fn pitch(&self, source: Source) -> Result<f32> {
        Ok(match source {
            Source::Static(id) => self.static_ref(id)?.common().pitch(),
            Source::Stream(id) => self.stream_ref(id)?.common().pitch(),
        })
    }

    pub fn state(&self, source: Source) -> Result<SourceState> {
        Ok(match source {
            Source::Static(id) => self.static_ref(id)?.state(&self.backend),
            Source::Stream(id) => self.stream_ref(id)?.common().state(),
        })
    }

    pub fn is_playing(&self, source: Source) -> Result<bool> {
        Ok(self.state(source)? == SourceState::Playing)
    }

    pub fn is_paused(&self, source: Source) -> Result<bool> {
        Ok(self.state(source)? == SourceState::Paused)
    }

    pub fn is_stopped(&self, source: Source) -> Result<bool> {
        Ok(self.state(source)? == SourceState::Stopped)
    }

    pub fn is_static(&self, source: Source) -> Result<bool> {
        self.state(source)?;
        Ok(source.is_static())
    }

    /// A new, independent source for the same audio. Static clones share
    /// the decoded buffer; stream clones reopen the file.
    pub fn clone_source(&mut self, source: Source) -> Result<Source> {
        match source {
            Source::Static(id) => {
                let clone = static_entry(&mut self.statics, id)?.clone_source(&mut self.backend)?;
                let id = StaticId(self.alloc_id());
                self.statics.insert(id, clone);
                Ok(Source::Static(id))
            }
            Source::Stream(id) => {
                let file = self.stream_ref(id)?.file().to_string();
                self.load_stream(&file).map(Source::Stream)
            }
        }
    }

    /// Release `source` and its backend objects. The handle is dead after.
    pub fn free(&mut self, source: Source) -> Result<()> {
        match source {
            Source::Static(id) => self
                .statics
                .remove(&id)
                .ok_or_else(|| anyhow!("Unknown static source: {id:?}"))?
                .free(&mut self.backend),
            Source::Stream(id) => self
                .streams
                .remove(&id)
                .ok_or_else(|| anyhow!("Unknown stream source: {id:?}"))?
                .free(&mut self.backend, &mut self.registry),
        }
        Ok(())
    }

    /// Set the listener gain, clamped to `[0, 1]`.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = clamp_volume(volume);
        self.backend.set_listener_gain(self.master_volume);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Feed every playing stream. Call once per frame.
    pub fn update_streams(&mut self) -> PumpReport {
        let mut report = PumpReport::default();
        let preload = self.config.update_preload_samples;
        let streams = &mut self.streams;
        let backend = &mut self.backend;

        let retired = self.registry.sweep(|id| {
            report.visited += 1;
            let Some(stream) = streams.get_mut(&id) else {
                log::warn!("Playing stream {id:?} no longer exists, dropping it");
                return Sweep::Retire;
            };
            let step = stream.pump(backend, preload);
            report.refilled += step.refilled;
            match step.status {
                PumpStatus::Running => Sweep::Keep,
                PumpStatus::Restarted => {
                    report.restarted += 1;
                    Sweep::Keep
                }
                PumpStatus::Drained => {
                    log::debug!("Stream {} finished", stream.file());
                    Sweep::Retire
                }
            }
        });
        report.retired = retired;

        if report.visited > 0 {
            log::trace!("Pumped streams: {report:?}");
        }
        report
    }

    pub fn playing_stream_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_registered(&self, id: StreamId) -> bool {
        self.registry.contains(id)
    }

    pub fn stream(&self, id: StreamId) -> Option<&StreamSource> {
        self.streams.get(&id)
    }

    pub fn static_source(&self, id: StaticId) -> Option<&StaticSource> {
        self.statics.get(&id)
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn static_count(&self) -> usize {
        self.statics.len()
    }

    /// Free every source.
    pub fn shutdown(&mut self) {
        if self.streams.is_empty() && self.statics.is_empty() {
            return;
        }
        log::debug!(
            "Shutting down audio: {} stream(s), {} static source(s)",
            self.streams.len(),
            self.statics.len()
        );
        for (_, stream) in self.streams.drain() {
            stream.free(&mut self.backend, &mut self.registry);
        }
        for (_, source) in self.statics.drain() {
            source.free(&mut self.backend);
        }
        self.registry.clear();
    }

    fn static_ref(&self, id: StaticId) -> Result<&StaticSource> {
        self.statics
            .get(&id)
            .ok_or_else(|| anyhow!("Unknown static source: {id:?}"))
    }

    fn stream_ref(&self, id: StreamId) -> Result<&StreamSource> {
        self.streams
            .get(&id)
            .ok_or_else(|| anyhow!("Unknown stream source: {id:?}"))
    }
}

impl<B: AudioBackend> Drop for AudioEngine<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn static_entry(
    statics: &mut HashMap<StaticId, StaticSource>,
    id: StaticId,
) -> Result<&mut StaticSource> {
    statics
        .get_mut(&id)
        .ok_or_else(|| anyhow!("Unknown static source: {id:?}"))
}

fn stream_entry(
    streams: &mut HashMap<StreamId, StreamSource>,
    id: StreamId,
) -> Result<&mut StreamSource> {
    streams
        .get_mut(&id)
        .ok_or_else(|| anyhow!("Unknown stream source: {id:?}"))
}
