//! Description of precompiled page artifacts.
//!
//! A precompiled page ships a JSON descriptor (`<Name>_meta.json`) next to
//! its side-data files. The descriptor carries what the page compiler knew
//! about the page: its identifier, source timestamp, codec names, mode flags,
//! and the fields the compiled page declares.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::MetaInfoError;
use crate::freshness::UNKNOWN_LAST_MODIFIED;
use crate::side_data::{self, DirNamespace, ResourceNamespace};

/// Suffix of the descriptor resource.
pub const DESCRIPTOR_SUFFIX: &str = "_meta.json";

/// What the compiler recorded about a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Qualified identifier of the compiled page, e.g. `app.pages.Index`.
    pub identifier: String,

    /// Content type the page renders.
    #[serde(default)]
    pub content_type: Option<String>,

    /// Source modification time in milliseconds since the epoch.
    #[serde(default = "unknown_last_modified")]
    pub last_modified: i64,

    /// Tag library prefixes mapped to their URIs.
    #[serde(default)]
    pub jsp_tags: BTreeMap<String, String>,

    /// Codec applied to `${}` expressions.
    #[serde(default)]
    pub expression_codec: Option<String>,

    /// Codec applied to static HTML parts.
    #[serde(default)]
    pub static_codec: Option<String>,

    /// Codec applied to the page output.
    #[serde(default)]
    pub out_codec: Option<String>,

    /// Codec applied to tag library output.
    #[serde(default)]
    pub taglib_codec: Option<String>,

    /// Whether the page was compiled with static type checking.
    #[serde(default)]
    pub compile_static_mode: bool,

    /// Whether model values are bound to declared page fields.
    #[serde(default)]
    pub model_fields_mode: bool,

    /// Fields declared directly on the compiled page.
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

/// A field declared on a compiled page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Class-level rather than per-instance.
    #[serde(default)]
    pub is_static: bool,
    /// Generated by the compiler rather than declared in the page.
    #[serde(default)]
    pub is_synthetic: bool,
}

impl FieldDescriptor {
    /// A plain instance field.
    pub fn instance(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_static: false,
            is_synthetic: false,
        }
    }
}

fn unknown_last_modified() -> i64 {
    UNKNOWN_LAST_MODIFIED
}

impl ArtifactDescriptor {
    /// Creates a descriptor with no codecs, no fields, and an unknown timestamp.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            content_type: None,
            last_modified: UNKNOWN_LAST_MODIFIED,
            jsp_tags: BTreeMap::new(),
            expression_codec: None,
            static_codec: None,
            out_codec: None,
            taglib_codec: None,
            compile_static_mode: false,
            model_fields_mode: false,
            fields: Vec::new(),
        }
    }

    /// Loads the descriptor of `identifier` from `namespace`.
    pub fn load(namespace: &dyn ResourceNamespace, identifier: &str) -> Result<Self, MetaInfoError> {
        let name = side_data::data_resource_name(identifier, DESCRIPTOR_SUFFIX);
        let mut stream = namespace
            .open(&name)
            .map_err(|source| MetaInfoError::ResourceUnreadable {
                name: name.clone(),
                source,
            })?
            .ok_or_else(|| MetaInfoError::MissingResource { name: name.clone() })?;
        let mut json = String::new();
        stream
            .read_to_string(&mut json)
            .map_err(|source| MetaInfoError::ResourceUnreadable { name, source })?;
        serde_json::from_str(&json).map_err(|e| MetaInfoError::ManifestParse {
            reason: e.to_string(),
        })
    }

    /// Writes the descriptor into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, MetaInfoError> {
        std::fs::create_dir_all(dir).map_err(|e| MetaInfoError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let name = side_data::data_resource_name(&self.identifier, DESCRIPTOR_SUFFIX);
        let path = side_data::resource_path(dir, &name).map_err(|e| MetaInfoError::Io {
            path: dir.join(&name),
            source: e,
        })?;
        let json = serde_json::to_string_pretty(self).map_err(|e| MetaInfoError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| MetaInfoError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

/// Handle to a precompiled page: its descriptor plus the namespace its
/// companion resources are read from.
#[derive(Debug, Clone)]
pub struct PageArtifact {
    descriptor: Arc<ArtifactDescriptor>,
    namespace: Arc<dyn ResourceNamespace>,
}

impl PageArtifact {
    /// Pairs a descriptor with its resource namespace.
    pub fn new(descriptor: ArtifactDescriptor, namespace: Arc<dyn ResourceNamespace>) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            namespace,
        }
    }

    /// Opens the artifact `identifier` whose files live in `dir`.
    pub fn open(dir: &Path, identifier: &str) -> Result<Self, MetaInfoError> {
        let namespace = DirNamespace::new(dir);
        let descriptor = ArtifactDescriptor::load(&namespace, identifier)?;
        Ok(Self::new(descriptor, Arc::new(namespace)))
    }

    /// The compiler's description of the page.
    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    /// Qualified identifier of the page.
    pub fn identifier(&self) -> &str {
        &self.descriptor.identifier
    }

    /// Where companion resources are read from.
    pub fn namespace(&self) -> &dyn ResourceNamespace {
        self.namespace.as_ref()
    }

    /// Reads the static HTML parts; `None` if the page has none.
    pub fn load_html_parts(&self) -> Result<Option<Vec<String>>, MetaInfoError> {
        side_data::load_string_array(self.namespace(), self.identifier())
    }

    /// Reads the line-number map.
    pub fn load_line_numbers(&self) -> Result<Vec<i32>, MetaInfoError> {
        side_data::load_int_array(self.namespace(), self.identifier())
    }
}
