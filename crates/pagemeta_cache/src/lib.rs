//! Metadata and staleness tracking for compiled page artifacts.
//!
//! A [`PageMetaInfo`] records where a compiled page came from, answers whether
//! its source has changed since it was loaded (time-gated by a
//! [`StalenessCache`]), and lazily loads the binary side-data the renderer and
//! debugger need: static HTML fragments and line-number maps.

#![warn(missing_docs)]

pub mod artifact;
pub mod collaborators;
pub mod error;
pub mod freshness;
pub mod record;
pub mod side_data;
pub mod staleness;

pub use artifact::{ArtifactDescriptor, FieldDescriptor, PageArtifact};
pub use collaborators::{Application, Encoder, EncoderLookup, ExtensionRegistry, PluginInfo, PluginRegistry};
pub use error::MetaInfoError;
pub use freshness::{
    establish_last_modified, Connector, DefaultConnector, FileResource, MetadataConnection,
    Resource, UrlResource, UNKNOWN_LAST_MODIFIED,
};
pub use pagemeta_config::ReloadSettings;
pub use record::{
    CodecNames, Initialization, PageEncoders, PageMetaInfo, PageMetaInfoBuilder, PostRenderHook,
    SourceResolver, DEFAULT_PLUGIN_PATH,
};
pub use side_data::{DirNamespace, MemoryNamespace, ResourceNamespace};
pub use staleness::{CacheEntry, StalenessCache};
