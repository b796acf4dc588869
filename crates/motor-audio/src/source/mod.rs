mod common;
mod static_source;
mod stream_source;

pub use common::{SourceCommon, SourceState};
pub use static_source::{StaticBuffer, StaticSource};
pub use stream_source::{PumpStatus, PumpStep, STREAM_BUFFER_COUNT, StreamSource};

/// Handle for a fully decoded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StaticId(pub u64);

/// Handle for a streamed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

/// Handle for any source owned by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Static(StaticId),
    Stream(StreamId),
}

impl Source {
    pub fn is_static(&self) -> bool {
        matches!(self, Source::Static(_))
    }
}

impl From<StaticId> for Source {
    fn from(id: StaticId) -> Self {
        Source::Static(id)
    }
}

impl From<StreamId> for Source {
    fn from(id: StreamId) -> Self {
        Source::Stream(id)
    }
}

/// How `new_source` should load a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Decode everything up front.
    Static,
    /// Decode while playing.
    #[default]
    Stream,
}

impl std::str::FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(SourceKind::Static),
            "stream" => Ok(SourceKind::Stream),
            other => anyhow::bail!("Unknown source type: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("static".parse::<SourceKind>().unwrap(), SourceKind::Static);
        assert_eq!("stream".parse::<SourceKind>().unwrap(), SourceKind::Stream);
        assert!("streamed".parse::<SourceKind>().is_err());
        assert_eq!(SourceKind::default(), SourceKind::Stream);
    }

    #[test]
    fn test_source_from_ids() {
        assert!(Source::from(StaticId(1)).is_static());
        assert!(!Source::from(StreamId(1)).is_static());
    }
}
