//! Interfaces to the services a page's metadata is resolved against.
//!
//! The encoding subsystem, plugin registry and extension registry live
//! outside this crate; an [`Application`] bundles whichever of them the host
//! provides. Every member is optional and a missing one is a no-op.

use std::fmt;
use std::sync::Arc;

use crate::artifact::ArtifactDescriptor;

/// Escapes output for one context (HTML, JavaScript, raw, ...).
pub trait Encoder: Send + Sync + fmt::Debug {
    /// The codec name this encoder was registered under.
    fn codec_name(&self) -> &str;

    /// Encodes `input`.
    fn encode(&self, input: &str) -> String;
}

/// Resolves codec names to encoders.
pub trait EncoderLookup: Send + Sync {
    /// Returns the encoder for `codec_name`, or `None` if no encoding applies.
    fn lookup_encoder(&self, codec_name: &str) -> Option<Arc<dyn Encoder>>;
}

/// Identity of the plugin that contributed a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// Plugin name.
    pub name: String,
    /// Plugin version.
    pub version: String,
}

/// Maps compiled pages to the plugins that contributed them.
pub trait PluginRegistry: Send + Sync {
    /// The plugin path for the page, or `None` for application pages.
    fn plugin_path_for(&self, artifact: &ArtifactDescriptor) -> Option<String>;

    /// The plugin that contributed the page, if any.
    fn plugin_for(&self, artifact: &ArtifactDescriptor) -> Option<PluginInfo>;
}

/// Holds behavior attached to compiled pages at runtime.
pub trait ExtensionRegistry: Send + Sync {
    /// Drops every extension attached to the page `identifier`.
    fn remove_extensions(&self, identifier: &str);
}

/// The host application's services.
#[derive(Clone, Default)]
pub struct Application {
    /// Codec name to encoder resolution.
    pub encoders: Option<Arc<dyn EncoderLookup>>,
    /// Page to plugin resolution.
    pub plugin_registry: Option<Arc<dyn PluginRegistry>>,
    /// Runtime extension cleanup.
    pub extensions: Option<Arc<dyn ExtensionRegistry>>,
}

impl Application {
    /// Creates an application with no services.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the encoder lookup.
    pub fn with_encoders(mut self, encoders: Arc<dyn EncoderLookup>) -> Self {
        self.encoders = Some(encoders);
        self
    }

    /// Sets the plugin registry.
    pub fn with_plugin_registry(mut self, registry: Arc<dyn PluginRegistry>) -> Self {
        self.plugin_registry = Some(registry);
        self
    }

    /// Sets the extension registry.
    pub fn with_extensions(mut self, extensions: Arc<dyn ExtensionRegistry>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Resolves an optional codec name; any absence yields `None`.
    pub fn lookup_encoder(&self, codec_name: Option<&str>) -> Option<Arc<dyn Encoder>> {
        self.encoders.as_ref()?.lookup_encoder(codec_name?)
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("encoders", &self.encoders.is_some())
            .field("plugin_registry", &self.plugin_registry.is_some())
            .field("extensions", &self.extensions.is_some())
            .finish()
    }
}
