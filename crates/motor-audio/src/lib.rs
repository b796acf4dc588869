pub mod backend;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod filesystem;
pub mod registry;
pub mod source;

pub use backend::{AudioBackend, SoftwareBackend};
pub use config::AudioConfig;
pub use engine::{AudioEngine, PumpReport};
pub use filesystem::{AssetSource, DirectorySource, MemoryAssets};
pub use source::{Source, SourceKind, SourceState, StaticId, StreamId};
