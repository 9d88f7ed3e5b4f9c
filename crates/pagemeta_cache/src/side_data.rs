//! Binary side-data stored alongside precompiled page artifacts.
//!
//! Two companion resources may accompany an artifact: the static HTML parts
//! (`<Name>_html.data`) and the line-number map (`<Name>_linenumbers.data`).
//! Both share one layout: a 4-byte big-endian element count followed by the
//! elements. Strings are written as a 2-byte big-endian byte length plus
//! modified UTF-8, the encoding of Java's `DataOutput::writeUTF`; integers are
//! 4-byte big-endian. There is no header or version.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::MetaInfoError;

/// Suffix of the static HTML parts resource.
pub const HTML_DATA_SUFFIX: &str = "_html.data";

/// Suffix of the line-number map resource.
pub const LINE_NUMBERS_DATA_SUFFIX: &str = "_linenumbers.data";

/// Largest encoded string a 2-byte length prefix can describe.
const MAX_ENCODED_STRING_LEN: usize = u16::MAX as usize;

/// Upper bound on capacity reserved from an untrusted count.
const MAX_PREALLOCATED: usize = 4096;

/// A place from which an artifact's companion resources are opened by name.
pub trait ResourceNamespace: Send + Sync + fmt::Debug {
    /// Opens the named resource, returning `None` if it does not exist.
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + Send>>>;

    /// The directory backing this namespace, if it lives on disk.
    fn root(&self) -> Option<&Path> {
        None
    }
}

/// Resources stored as files in one directory.
#[derive(Debug, Clone)]
pub struct DirNamespace {
    root: PathBuf,
}

impl DirNamespace {
    /// Creates a namespace over the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceNamespace for DirNamespace {
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + Send>>> {
        match File::open(resource_path(&self.root, name)?) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

/// Resources held in memory, e.g. embedded with `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct MemoryNamespace {
    resources: HashMap<String, Arc<[u8]>>,
}

impl MemoryNamespace {
    /// Creates an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a resource.
    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.resources.insert(name.into(), bytes.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl ResourceNamespace for MemoryNamespace {
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + Send>>> {
        Ok(self
            .resources
            .get(name)
            .map(|bytes| Box::new(Cursor::new(Arc::clone(bytes))) as Box<dyn Read + Send>))
    }
}

/// Joins `name` onto `root`, accepting only a plain file name.
pub(crate) fn resource_path(root: &Path, name: &str) -> io::Result<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(root.join(name)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("resource name {name:?} is not a plain file name"),
        )),
    }
}

/// Derives a side-data resource name from an artifact identifier.
///
/// Any qualifying prefix up to the last `.`, `::` or path separator is
/// dropped: `app.pages.Index` with `_html.data` gives `Index_html.data`.
pub fn data_resource_name(identifier: &str, suffix: &str) -> String {
    let simple = identifier
        .rsplit(['.', ':', '/', '\\'])
        .next()
        .unwrap_or(identifier);
    format!("{simple}{suffix}")
}

/// Loads the static HTML parts for `identifier`.
///
/// Returns `Ok(None)` when the resource does not exist; fully dynamic pages
/// have no static parts.
pub fn load_string_array(
    namespace: &dyn ResourceNamespace,
    identifier: &str,
) -> Result<Option<Vec<String>>, MetaInfoError> {
    let name = data_resource_name(identifier, HTML_DATA_SUFFIX);
    let Some(stream) = open_resource(namespace, &name)? else {
        tracing::trace!(resource = %name, "no static html data");
        return Ok(None);
    };
    read_string_array(BufReader::new(stream), &name).map(Some)
}

/// Loads the line-number map for `identifier`.
///
/// Unlike the HTML parts, a missing resource is an error: precompiled pages
/// that ask for line numbers are expected to ship them.
pub fn load_int_array(
    namespace: &dyn ResourceNamespace,
    identifier: &str,
) -> Result<Vec<i32>, MetaInfoError> {
    let name = data_resource_name(identifier, LINE_NUMBERS_DATA_SUFFIX);
    let stream = open_resource(namespace, &name)?
        .ok_or_else(|| MetaInfoError::MissingResource { name: name.clone() })?;
    read_int_array(BufReader::new(stream), &name)
}

fn open_resource(
    namespace: &dyn ResourceNamespace,
    name: &str,
) -> Result<Option<Box<dyn Read + Send>>, MetaInfoError> {
    namespace
        .open(name)
        .map_err(|source| MetaInfoError::ResourceUnreadable {
            name: name.to_string(),
            source,
        })
}

/// Decodes a string-array payload. `name` is used in error messages.
pub fn read_string_array<R: Read>(mut reader: R, name: &str) -> Result<Vec<String>, MetaInfoError> {
    let count = read_count(&mut reader, name)?;
    let mut parts = Vec::with_capacity(count.min(MAX_PREALLOCATED));
    for _ in 0..count {
        let mut len = [0u8; 2];
        fill(&mut reader, &mut len, name)?;
        let mut bytes = vec![0u8; usize::from(u16::from_be_bytes(len))];
        fill(&mut reader, &mut bytes, name)?;
        parts.push(decode_modified_utf8(&bytes).map_err(|reason| MetaInfoError::corrupt(name, reason))?);
    }
    Ok(parts)
}

/// Decodes an integer-array payload. `name` is used in error messages.
pub fn read_int_array<R: Read>(mut reader: R, name: &str) -> Result<Vec<i32>, MetaInfoError> {
    let count = read_count(&mut reader, name)?;
    let mut values = Vec::with_capacity(count.min(MAX_PREALLOCATED));
    for _ in 0..count {
        let mut word = [0u8; 4];
        fill(&mut reader, &mut word, name)?;
        values.push(i32::from_be_bytes(word));
    }
    Ok(values)
}

/// Writes a string-array payload to `writer`.
///
/// A part that encodes to more than 65535 bytes fails with
/// [`MetaInfoError::StringTooLong`]; earlier parts are already written.
pub fn write_string_array<W: Write, S: AsRef<str>>(mut writer: W, parts: &[S]) -> Result<(), MetaInfoError> {
    write_all(&mut writer, &encode_count(parts.len())?)?;
    for part in parts {
        let encoded = encode_modified_utf8(part.as_ref());
        if encoded.len() > MAX_ENCODED_STRING_LEN {
            return Err(MetaInfoError::StringTooLong { len: encoded.len() });
        }
        write_all(&mut writer, &(encoded.len() as u16).to_be_bytes())?;
        write_all(&mut writer, &encoded)?;
    }
    Ok(())
}

/// Writes an integer-array payload to `writer`.
pub fn write_int_array<W: Write>(mut writer: W, values: &[i32]) -> Result<(), MetaInfoError> {
    write_all(&mut writer, &encode_count(values.len())?)?;
    for value in values {
        write_all(&mut writer, &value.to_be_bytes())?;
    }
    Ok(())
}

/// Encodes a string-array payload.
pub fn encode_string_array<S: AsRef<str>>(parts: &[S]) -> Result<Vec<u8>, MetaInfoError> {
    let mut output = Vec::new();
    write_string_array(&mut output, parts)?;
    Ok(output)
}

/// Encodes an integer-array payload.
pub fn encode_int_array(values: &[i32]) -> Result<Vec<u8>, MetaInfoError> {
    let mut output = Vec::with_capacity(4 + 4 * values.len());
    write_int_array(&mut output, values)?;
    Ok(output)
}

/// Writes the static HTML parts for `identifier` into `dir`, returning the file path.
pub fn store_string_array<S: AsRef<str>>(
    dir: &Path,
    identifier: &str,
    parts: &[S],
) -> Result<PathBuf, MetaInfoError> {
    let bytes = encode_string_array(parts)?;
    store(dir, &data_resource_name(identifier, HTML_DATA_SUFFIX), &bytes)
}

/// Writes the line-number map for `identifier` into `dir`, returning the file path.
pub fn store_int_array(dir: &Path, identifier: &str, values: &[i32]) -> Result<PathBuf, MetaInfoError> {
    let bytes = encode_int_array(values)?;
    store(dir, &data_resource_name(identifier, LINE_NUMBERS_DATA_SUFFIX), &bytes)
}

fn store(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, MetaInfoError> {
    std::fs::create_dir_all(dir).map_err(|e| MetaInfoError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let path = resource_path(dir, name).map_err(|e| MetaInfoError::Io {
        path: dir.join(name),
        source: e,
    })?;
    std::fs::write(&path, bytes).map_err(|e| MetaInfoError::Io {
        path: path.clone(),
        source: e,
    })?;
    Ok(path)
}

fn write_all<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<(), MetaInfoError> {
    writer.write_all(bytes).map_err(|e| MetaInfoError::Serialization {
        reason: e.to_string(),
    })
}

fn encode_count(len: usize) -> Result<[u8; 4], MetaInfoError> {
    let count = i32::try_from(len).map_err(|_| MetaInfoError::Serialization {
        reason: format!("{len} elements do not fit a 4-byte count"),
    })?;
    Ok(count.to_be_bytes())
}

fn read_count<R: Read>(reader: &mut R, name: &str) -> Result<usize, MetaInfoError> {
    let mut word = [0u8; 4];
    fill(reader, &mut word, name)?;
    let count = i32::from_be_bytes(word);
    usize::try_from(count).map_err(|_| MetaInfoError::corrupt(name, format!("negative element count {count}")))
}

/// Reads exactly `buf.len()` bytes; running out of input is corruption.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8], name: &str) -> Result<(), MetaInfoError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            MetaInfoError::corrupt(name, format!("unexpected end of data reading {} bytes", buf.len()))
        } else {
            MetaInfoError::ResourceUnreadable {
                name: name.to_string(),
                source: e,
            }
        }
    })
}

fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

fn decode_modified_utf8(bytes: &[u8]) -> Result<String, String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = continuation(bytes, i + 1)?;
            units.push((u16::from(b & 0x1F) << 6) | b2);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = continuation(bytes, i + 1)?;
            let b3 = continuation(bytes, i + 2)?;
            units.push((u16::from(b & 0x0F) << 12) | (b2 << 6) | b3);
            i += 3;
        } else {
            return Err(format!("malformed input around byte {i}"));
        }
    }
    String::from_utf16(&units).map_err(|_| "unpaired surrogate in string".to_string())
}

fn continuation(bytes: &[u8], at: usize) -> Result<u16, String> {
    match bytes.get(at) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(u16::from(b & 0x3F)),
        Some(_) => Err(format!("malformed input around byte {at}")),
        None => Err("partial character at end".to_string()),
    }
}
