//! The per-page metadata record.
//!
//! One [`PageMetaInfo`] exists per compiled page and is shared by every
//! worker serving that page. It is built once, either from a precompiled
//! [`PageArtifact`] or through a [`PageMetaInfoBuilder`] after a runtime
//! compile, and afterwards only answers questions: has the source changed,
//! what are the static parts and line numbers, which encoders apply.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

use pagemeta_config::ReloadSettings;
use parking_lot::Mutex;

use crate::artifact::PageArtifact;
use crate::collaborators::{Application, Encoder, PluginInfo};
use crate::error::MetaInfoError;
use crate::freshness::{establish_last_modified, Resource, UNKNOWN_LAST_MODIFIED};
use crate::staleness::StalenessCache;

/// Plugin path of pages that no plugin contributed.
pub const DEFAULT_PLUGIN_PATH: &str = "";

/// Callback locating the current source of a page.
pub type SourceResolver<'a> = &'a dyn Fn() -> Option<Arc<dyn Resource>>;

/// Names of the codecs a page asks for, one per output context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecNames {
    /// Codec for `${}` expressions.
    pub expression: Option<String>,
    /// Codec for static HTML parts.
    pub static_html: Option<String>,
    /// Codec for page output.
    pub out: Option<String>,
    /// Codec for tag library output.
    pub taglib: Option<String>,
}

/// Encoders resolved from [`CodecNames`].
#[derive(Debug, Clone, Default)]
pub struct PageEncoders {
    /// Encoder for `${}` expressions.
    pub expression: Option<Arc<dyn Encoder>>,
    /// Encoder for static HTML parts.
    pub static_html: Option<Arc<dyn Encoder>>,
    /// Encoder for page output.
    pub out: Option<Arc<dyn Encoder>>,
    /// Encoder for tag library output.
    pub taglib: Option<Arc<dyn Encoder>>,
}

/// State produced by [`PageMetaInfo::initialize`].
#[derive(Debug, Clone, Default)]
pub struct Initialization {
    /// Resolved encoders.
    pub encoders: PageEncoders,
    /// Plugin path, set only when a plugin registry was consulted.
    pub plugin_path: Option<String>,
    /// Contributing plugin, if any.
    pub page_plugin: Option<PluginInfo>,
}

/// Work to run after every render pass.
pub trait PostRenderHook {
    /// Releases whatever the render attached to the page.
    fn finalize_resources(&self);
}

/// Metadata and caches for one compiled page.
pub struct PageMetaInfo {
    precompiled_mode: bool,
    identifier: Option<String>,
    artifact: Option<PageArtifact>,
    page_source: Mutex<Option<Box<dyn Read + Send>>>,
    content_type: Option<String>,
    jsp_tags: BTreeMap<String, String>,
    codec_names: CodecNames,
    compile_static_mode: bool,
    model_fields_mode: bool,
    compilation_error: Option<String>,
    last_modified: AtomicI64,
    html_parts: Option<Arc<[String]>>,
    line_numbers: Mutex<Option<Arc<[i32]>>>,
    model_fields: OnceLock<Arc<BTreeSet<String>>>,
    application: Option<Application>,
    initialization: Mutex<Option<Arc<Initialization>>>,
    staleness: StalenessCache,
    extensions_should_be_removed: AtomicBool,
}

impl PageMetaInfo {
    /// Builds the record of a precompiled page.
    ///
    /// The static HTML parts are read immediately; failing to read them fails
    /// construction. Line numbers are read on first use.
    pub fn from_artifact(artifact: PageArtifact, settings: ReloadSettings) -> Result<Self, MetaInfoError> {
        let html_parts = artifact.load_html_parts()?.map(Arc::from);
        let d = artifact.descriptor();
        let codec_names = CodecNames {
            expression: d.expression_codec.clone(),
            static_html: d.static_codec.clone(),
            out: d.out_codec.clone(),
            taglib: d.taglib_codec.clone(),
        };
        tracing::debug!(identifier = %d.identifier, last_modified = d.last_modified, "loaded precompiled page");

        Ok(Self {
            precompiled_mode: true,
            identifier: Some(d.identifier.clone()),
            page_source: Mutex::new(None),
            content_type: d.content_type.clone(),
            jsp_tags: d.jsp_tags.clone(),
            codec_names,
            compile_static_mode: d.compile_static_mode,
            model_fields_mode: d.model_fields_mode,
            compilation_error: None,
            last_modified: AtomicI64::new(d.last_modified),
            html_parts,
            line_numbers: Mutex::new(None),
            model_fields: OnceLock::new(),
            application: None,
            initialization: Mutex::new(None),
            staleness: StalenessCache::new(settings),
            extensions_should_be_removed: AtomicBool::new(false),
            artifact: Some(artifact),
        })
    }

    /// Starts the record of a page compiled at runtime.
    pub fn builder(settings: ReloadSettings) -> PageMetaInfoBuilder {
        PageMetaInfoBuilder::new(settings)
    }

    /// Attaches the host application's services.
    pub fn with_application(mut self, application: Application) -> Self {
        self.application = Some(application);
        self
    }

    /// Whether the page came from a precompiled artifact.
    pub fn is_precompiled_mode(&self) -> bool {
        self.precompiled_mode
    }

    /// Qualified identifier of the page, if known.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// The compiled artifact, if any.
    pub fn artifact(&self) -> Option<&PageArtifact> {
        self.artifact.as_ref()
    }

    /// Takes the source stream handed over at build time. Returns it once.
    pub fn take_page_source(&self) -> Option<Box<dyn Read + Send>> {
        self.page_source.lock().take()
    }

    /// Content type the page renders.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Tag library prefixes mapped to their URIs.
    pub fn jsp_tags(&self) -> &BTreeMap<String, String> {
        &self.jsp_tags
    }

    /// Codec names, as recorded at compile time.
    pub fn codec_names(&self) -> &CodecNames {
        &self.codec_names
    }

    /// Whether the page was compiled with static type checking.
    pub fn is_compile_static_mode(&self) -> bool {
        self.compile_static_mode
    }

    /// Whether model values are bound to declared page fields.
    pub fn is_model_fields_mode(&self) -> bool {
        self.model_fields_mode
    }

    /// The error the page failed to compile with, if any.
    pub fn compilation_error(&self) -> Option<&str> {
        self.compilation_error.as_deref()
    }

    /// Source modification time the loaded page corresponds to.
    pub fn last_modified(&self) -> i64 {
        self.last_modified.load(Ordering::Acquire)
    }

    /// Records `resource`'s current modification time as the page's own.
    ///
    /// Callers invoke this right after compiling from `resource`.
    pub fn apply_last_modified_from_resource(&self, resource: Option<&dyn Resource>) {
        let millis = resource.map_or(UNKNOWN_LAST_MODIFIED, establish_last_modified);
        self.last_modified.store(millis, Ordering::Release);
    }

    /// Static HTML parts, if the page has any.
    pub fn html_parts(&self) -> Option<Arc<[String]>> {
        self.html_parts.clone()
    }

    /// Maps generated code lines back to page source lines.
    ///
    /// For precompiled pages the map is read on first call and cached; a
    /// failed read is returned (and logged) and retried on the next call.
    pub fn line_numbers(&self) -> Result<Option<Arc<[i32]>>, MetaInfoError> {
        let mut slot = self.line_numbers.lock();
        if slot.is_some() || !self.precompiled_mode {
            return Ok((*slot).clone());
        }
        let Some(artifact) = &self.artifact else {
            return Ok(None);
        };
        match artifact.load_line_numbers() {
            Ok(values) => {
                let values: Arc<[i32]> = values.into();
                *slot = Some(Arc::clone(&values));
                Ok(Some(values))
            }
            Err(e) => {
                tracing::warn!(identifier = %artifact.identifier(), error = %e, "problem reading precompiled line numbers");
                Err(e)
            }
        }
    }

    /// Names of the page fields the model binds to.
    ///
    /// Computed once: the non-static, non-synthetic fields declared on the
    /// compiled page when model-fields mode is on, otherwise empty.
    pub fn model_fields(&self) -> Arc<BTreeSet<String>> {
        Arc::clone(self.model_fields.get_or_init(|| {
            let fields = match &self.artifact {
                Some(artifact) if self.model_fields_mode => artifact
                    .descriptor()
                    .fields
                    .iter()
                    .filter(|f| !f.is_static && !f.is_synthetic)
                    .map(|f| f.name.clone())
                    .collect(),
                _ => BTreeSet::new(),
            };
            Arc::new(fields)
        }))
    }

    /// Resolves encoders and plugin origin, and computes the model fields.
    ///
    /// Always runs; see [`initialize_on_demand`](Self::initialize_on_demand)
    /// for the once-only variant.
    pub fn initialize(&self) -> Arc<Initialization> {
        let mut slot = self.initialization.lock();
        let init = Arc::new(self.compute_initialization());
        *slot = Some(Arc::clone(&init));
        init
    }

    /// Runs [`initialize`](Self::initialize) unless it already ran.
    ///
    /// Concurrent first callers wait for the one running initialization.
    pub fn initialize_on_demand(&self) -> Arc<Initialization> {
        let mut slot = self.initialization.lock();
        if let Some(init) = slot.as_ref() {
            return Arc::clone(init);
        }
        let init = Arc::new(self.compute_initialization());
        *slot = Some(Arc::clone(&init));
        init
    }

    /// Whether initialization has run.
    pub fn is_initialized(&self) -> bool {
        self.initialization.lock().is_some()
    }

    /// Forgets the initialization so the next on-demand call runs it again.
    pub fn reset_initialization(&self) {
        *self.initialization.lock() = None;
    }

    /// The current initialization, if any.
    pub fn initialization(&self) -> Option<Arc<Initialization>> {
        self.initialization.lock().clone()
    }

    /// Plugin path resolved at initialization.
    pub fn plugin_path(&self) -> Option<String> {
        self.initialization()?.plugin_path.clone()
    }

    /// Contributing plugin resolved at initialization.
    pub fn page_plugin(&self) -> Option<PluginInfo> {
        self.initialization()?.page_plugin.clone()
    }

    /// Encoders resolved at initialization.
    pub fn encoders(&self) -> PageEncoders {
        self.initialization()
            .map(|init| init.encoders.clone())
            .unwrap_or_default()
    }

    fn compute_initialization(&self) -> Initialization {
        let app = self.application.as_ref();
        let lookup = |name: &Option<String>| app.and_then(|a| a.lookup_encoder(name.as_deref()));
        let encoders = PageEncoders {
            expression: lookup(&self.codec_names.expression),
            static_html: lookup(&self.codec_names.static_html),
            out: lookup(&self.codec_names.out),
            taglib: lookup(&self.codec_names.taglib),
        };

        let (plugin_path, page_plugin) = match (app.and_then(|a| a.plugin_registry.as_ref()), &self.artifact) {
            (Some(registry), Some(artifact)) => (
                Some(
                    registry
                        .plugin_path_for(artifact.descriptor())
                        .unwrap_or_else(|| DEFAULT_PLUGIN_PATH.to_string()),
                ),
                registry.plugin_for(artifact.descriptor()),
            ),
            _ => (None, None),
        };

        self.model_fields();
        tracing::trace!(identifier = ?self.identifier, ?plugin_path, "initialized page metadata");

        Initialization {
            encoders,
            plugin_path,
            page_plugin,
        }
    }

    /// Whether the page's source is newer than what was loaded.
    ///
    /// `None` means the page has no reloadable source and is never reloaded.
    pub fn should_reload(&self, resolve_source: Option<SourceResolver<'_>>) -> bool {
        self.check_if_reloadable_resource_has_changed(resolve_source)
            .is_some()
    }

    /// Returns the source resource if it changed since the page was loaded.
    ///
    /// At most one lookup runs per check interval; within the interval the
    /// previous answer is returned and `resolve_source` is not called.
    pub fn check_if_reloadable_resource_has_changed(
        &self,
        resolve_source: Option<SourceResolver<'_>>,
    ) -> Option<Arc<dyn Resource>> {
        let resolve = resolve_source?;
        self.staleness.check_staleness(self.last_modified(), resolve)
    }

    /// Removes runtime extensions from the page now, and again after every
    /// subsequent render.
    pub fn remove_page_extensions(&self) {
        self.extensions_should_be_removed
            .store(true, Ordering::Release);
        let registry = self
            .application
            .as_ref()
            .and_then(|a| a.extensions.as_ref());
        if let (Some(registry), Some(identifier)) = (registry, self.identifier()) {
            registry.remove_extensions(identifier);
        }
    }
}

impl PostRenderHook for PageMetaInfo {
    fn finalize_resources(&self) {
        if self.extensions_should_be_removed.load(Ordering::Acquire) {
            self.remove_page_extensions();
        }
    }
}

impl fmt::Debug for PageMetaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageMetaInfo")
            .field("identifier", &self.identifier)
            .field("precompiled_mode", &self.precompiled_mode)
            .field("last_modified", &self.last_modified())
            .field("html_parts", &self.html_parts.as_ref().map(|p| p.len()))
            .field("staleness", &self.staleness)
            .finish_non_exhaustive()
    }
}

/// Builds the record of a page compiled at runtime.
pub struct PageMetaInfoBuilder {
    settings: ReloadSettings,
    identifier: Option<String>,
    artifact: Option<PageArtifact>,
    page_source: Option<Box<dyn Read + Send>>,
    content_type: Option<String>,
    jsp_tags: BTreeMap<String, String>,
    codec_names: CodecNames,
    compile_static_mode: bool,
    model_fields_mode: bool,
    compilation_error: Option<String>,
    last_modified: i64,
    html_parts: Option<Vec<String>>,
    line_numbers: Option<Vec<i32>>,
    application: Option<Application>,
}

impl PageMetaInfoBuilder {
    fn new(settings: ReloadSettings) -> Self {
        Self {
            settings,
            identifier: None,
            artifact: None,
            page_source: None,
            content_type: None,
            jsp_tags: BTreeMap::new(),
            codec_names: CodecNames::default(),
            compile_static_mode: false,
            model_fields_mode: false,
            compilation_error: None,
            last_modified: UNKNOWN_LAST_MODIFIED,
            html_parts: None,
            line_numbers: None,
            application: None,
        }
    }

    /// Sets the page identifier.
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Sets the artifact the runtime compile produced.
    ///
    /// Its identifier is used unless one was set explicitly; its side-data
    /// resources are not read in this mode.
    pub fn artifact(mut self, artifact: PageArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Sets the page source stream.
    pub fn page_source(mut self, source: impl Read + Send + 'static) -> Self {
        self.page_source = Some(Box::new(source));
        self
    }

    /// Sets the content type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the tag library prefixes.
    pub fn jsp_tags(mut self, jsp_tags: BTreeMap<String, String>) -> Self {
        self.jsp_tags = jsp_tags;
        self
    }

    /// Sets the codec names.
    pub fn codec_names(mut self, codec_names: CodecNames) -> Self {
        self.codec_names = codec_names;
        self
    }

    /// Sets static type checking mode.
    pub fn compile_static_mode(mut self, enabled: bool) -> Self {
        self.compile_static_mode = enabled;
        self
    }

    /// Sets model-fields mode.
    pub fn model_fields_mode(mut self, enabled: bool) -> Self {
        self.model_fields_mode = enabled;
        self
    }

    /// Records the error the page failed to compile with.
    pub fn compilation_error(mut self, error: impl Into<String>) -> Self {
        self.compilation_error = Some(error.into());
        self
    }

    /// Sets the source modification time.
    pub fn last_modified(mut self, millis: i64) -> Self {
        self.last_modified = millis;
        self
    }

    /// Sets the static HTML parts.
    pub fn html_parts(mut self, parts: Vec<String>) -> Self {
        self.html_parts = Some(parts);
        self
    }

    /// Sets the line-number map.
    pub fn line_numbers(mut self, line_numbers: Vec<i32>) -> Self {
        self.line_numbers = Some(line_numbers);
        self
    }

    /// Attaches the host application's services.
    pub fn application(mut self, application: Application) -> Self {
        self.application = Some(application);
        self
    }

    /// Finishes the record.
    pub fn build(self) -> PageMetaInfo {
        let identifier = self
            .identifier
            .or_else(|| self.artifact.as_ref().map(|a| a.identifier().to_string()));
        PageMetaInfo {
            precompiled_mode: false,
            identifier,
            artifact: self.artifact,
            page_source: Mutex::new(self.page_source),
            content_type: self.content_type,
            jsp_tags: self.jsp_tags,
            codec_names: self.codec_names,
            compile_static_mode: self.compile_static_mode,
            model_fields_mode: self.model_fields_mode,
            compilation_error: self.compilation_error,
            last_modified: AtomicI64::new(self.last_modified),
            html_parts: self.html_parts.map(Arc::from),
            line_numbers: Mutex::new(self.line_numbers.map(Arc::from)),
            model_fields: OnceLock::new(),
            application: self.application,
            initialization: Mutex::new(None),
            staleness: StalenessCache::new(self.settings),
            extensions_should_be_removed: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactDescriptor, FieldDescriptor};
    use crate::collaborators::{EncoderLookup, ExtensionRegistry, PluginRegistry};
    use crate::side_data::{encode_int_array, encode_string_array, MemoryNamespace};
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Named(String);

    impl Encoder for Named {
        fn codec_name(&self) -> &str {
            &self.0
        }

        fn encode(&self, input: &str) -> String {
            input.to_string()
        }
    }

    struct AnyCodec;

    impl EncoderLookup for AnyCodec {
        fn lookup_encoder(&self, codec_name: &str) -> Option<Arc<dyn Encoder>> {
            (codec_name != "none").then(|| Arc::new(Named(codec_name.to_string())) as Arc<dyn Encoder>)
        }
    }

    struct Plugins;

    impl PluginRegistry for Plugins {
        fn plugin_path_for(&self, artifact: &ArtifactDescriptor) -> Option<String> {
            artifact
                .identifier
                .starts_with("blog.")
                .then(|| "/plugins/blog-1.0".to_string())
        }

        fn plugin_for(&self, artifact: &ArtifactDescriptor) -> Option<PluginInfo> {
            artifact.identifier.starts_with("blog.").then(|| PluginInfo {
                name: "blog".to_string(),
                version: "1.0".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct Extensions {
        removed: AtomicUsize,
    }

    impl ExtensionRegistry for Extensions {
        fn remove_extensions(&self, _identifier: &str) {
            self.removed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    fn artifact(identifier: &str, with_lines: bool) -> PageArtifact {
        let mut d = ArtifactDescriptor::new(identifier);
        d.last_modified = 10_000;
        d.out_codec = Some("html".to_string());
        d.static_codec = Some("none".to_string());
        d.model_fields_mode = true;
        d.fields = vec![
            FieldDescriptor::instance("title"),
            FieldDescriptor {
                name: "CONSTANT".to_string(),
                is_static: true,
                is_synthetic: false,
            },
            FieldDescriptor {
                name: "$generated".to_string(),
                is_static: false,
                is_synthetic: true,
            },
        ];
        let simple = identifier.rsplit('.').next().unwrap();
        let mut ns = MemoryNamespace::new().with(
            format!("{simple}_html.data"),
            encode_string_array(&["<b>", "</b>"]).unwrap(),
        );
        if with_lines {
            ns.insert(
                format!("{simple}_linenumbers.data"),
                encode_int_array(&[0, 7, 1_000_000, -5]).unwrap(),
            );
        }
        PageArtifact::new(d, Arc::new(ns))
    }

    #[test]
    fn precompiled_loads_html_eagerly() {
        let info = PageMetaInfo::from_artifact(artifact("app.Index", false), ReloadSettings::default()).unwrap();
        assert!(info.is_precompiled_mode());
        assert_eq!(info.last_modified(), 10_000);
        assert_eq!(&*info.html_parts().unwrap(), &["<b>".to_string(), "</b>".to_string()]);
        assert_eq!(info.identifier(), Some("app.Index"));
    }

    #[test]
    fn precompiled_line_numbers_are_lazy_and_cached() {
        let info = PageMetaInfo::from_artifact(artifact("app.Index", true), ReloadSettings::default()).unwrap();
        let first = info.line_numbers().unwrap().unwrap();
        assert_eq!(&*first, &[0, 7, 1_000_000, -5]);
        let second = info.line_numbers().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_line_numbers_surface_error() {
        let info = PageMetaInfo::from_artifact(artifact("app.Index", false), ReloadSettings::default()).unwrap();
        assert!(matches!(
            info.line_numbers(),
            Err(MetaInfoError::MissingResource { .. })
        ));
    }

    #[test]
    fn dynamic_fields_are_set_directly() {
        let info = PageMetaInfo::builder(ReloadSettings::default())
            .identifier("Dynamic")
            .page_source(&b"<p>${x}</p>"[..])
            .content_type("text/html")
            .last_modified(5)
            .html_parts(vec!["<p>".to_string()])
            .line_numbers(vec![1, 2])
            .compilation_error("boom")
            .build();
        assert!(!info.is_precompiled_mode());
        assert_eq!(info.last_modified(), 5);
        assert_eq!(&*info.line_numbers().unwrap().unwrap(), &[1, 2]);
        assert_eq!(info.content_type(), Some("text/html"));
        assert_eq!(info.compilation_error(), Some("boom"));

        let mut source = String::new();
        info.take_page_source()
            .unwrap()
            .read_to_string(&mut source)
            .unwrap();
        assert_eq!(source, "<p>${x}</p>");
        assert!(info.take_page_source().is_none());
    }

    #[test]
    fn dynamic_without_line_numbers_is_none() {
        let info = PageMetaInfo::builder(ReloadSettings::default()).build();
        assert!(info.line_numbers().unwrap().is_none());
        assert!(info.html_parts().is_none());
    }

    #[test]
    fn should_reload_none_never_resolves() {
        let info = PageMetaInfo::builder(ReloadSettings::default()).build();
        assert!(!info.should_reload(None));
        assert!(info.check_if_reloadable_resource_has_changed(None).is_none());
    }

    #[test]
    fn model_fields_filter_static_and_synthetic() {
        let info = PageMetaInfo::from_artifact(artifact("app.Index", false), ReloadSettings::default()).unwrap();
        let fields = info.model_fields();
        assert_eq!(fields.iter().collect::<Vec<_>>(), vec!["title"]);
        assert!(Arc::ptr_eq(&fields, &info.model_fields()));
    }

    #[test]
    fn model_fields_empty_without_artifact() {
        let info = PageMetaInfo::builder(ReloadSettings::default())
            .model_fields_mode(true)
            .build();
        assert!(info.model_fields().is_empty());
    }

    #[test]
    fn initialize_without_application_leaves_everything_unset() {
        let info = PageMetaInfo::from_artifact(artifact("app.Index", false), ReloadSettings::default()).unwrap();
        let init = info.initialize_on_demand();
        assert!(init.encoders.out.is_none());
        assert!(init.plugin_path.is_none());
        assert!(init.page_plugin.is_none());
        assert!(info.is_initialized());
    }

    #[test]
    fn initialize_resolves_encoders_and_plugin() {
        let app = Application::new()
            .with_encoders(Arc::new(AnyCodec))
            .with_plugin_registry(Arc::new(Plugins));
        let info = PageMetaInfo::from_artifact(artifact("blog.Post", false), ReloadSettings::default())
            .unwrap()
            .with_application(app);
        info.initialize();
        let encoders = info.encoders();
        assert_eq!(encoders.out.unwrap().codec_name(), "html");
        assert!(encoders.static_html.is_none());
        assert!(encoders.expression.is_none());
        assert_eq!(info.plugin_path().as_deref(), Some("/plugins/blog-1.0"));
        assert_eq!(info.page_plugin().unwrap().name, "blog");
    }

    #[test]
    fn application_page_gets_default_plugin_path() {
        let app = Application::new().with_plugin_registry(Arc::new(Plugins));
        let info = PageMetaInfo::from_artifact(artifact("app.Index", false), ReloadSettings::default())
            .unwrap()
            .with_application(app);
        info.initialize_on_demand();
        assert_eq!(info.plugin_path().as_deref(), Some(DEFAULT_PLUGIN_PATH));
        assert!(info.page_plugin().is_none());
    }

    #[test]
    fn on_demand_runs_once_until_reset() {
        let info = PageMetaInfo::builder(ReloadSettings::default()).build();
        let a = info.initialize_on_demand();
        let b = info.initialize_on_demand();
        assert!(Arc::ptr_eq(&a, &b));
        info.reset_initialization();
        assert!(!info.is_initialized());
        let c = info.initialize_on_demand();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn extensions_removed_after_render_once_requested() {
        let extensions = Arc::new(Extensions::default());
        let app = Application::new().with_extensions(extensions.clone());
        let info = PageMetaInfo::builder(ReloadSettings::default())
            .identifier("Page")
            .application(app)
            .build();

        info.finalize_resources();
        assert_eq!(extensions.removed.load(std::sync::atomic::Ordering::SeqCst), 0);

        info.remove_page_extensions();
        info.finalize_resources();
        assert_eq!(extensions.removed.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn apply_last_modified_without_resource_is_unknown() {
        let info = PageMetaInfo::builder(ReloadSettings::default())
            .last_modified(99)
            .build();
        info.apply_last_modified_from_resource(None);
        assert_eq!(info.last_modified(), UNKNOWN_LAST_MODIFIED);
    }
}
