//! Establishing the last-modified time of a page source.
//!
//! Sources come in three shapes: plain files, `file:` URLs, and anything else
//! reachable through a URL. Every failure collapses to
//! [`UNKNOWN_LAST_MODIFIED`]; a page whose source cannot be queried keeps
//! serving what is already loaded.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use url::Url;

/// Sentinel for "modification time could not be determined".
pub const UNKNOWN_LAST_MODIFIED: i64 = -1;

/// An open handle used only to read a resource's metadata.
pub trait MetadataConnection: Send {
    /// The modification time reported by the connection, if any.
    fn last_modified(&mut self) -> io::Result<Option<i64>>;

    /// Releases the connection.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Opens metadata connections for URLs.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Connects to `url` without reading its body.
    fn connect(&self, url: &Url) -> io::Result<Box<dyn MetadataConnection>>;
}

/// A locatable page source.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Human-readable location, for logs.
    fn description(&self) -> String;

    /// Whether the resource currently exists.
    fn exists(&self) -> bool;

    /// The backing file, for resources that are plain filesystem paths.
    fn file_path(&self) -> Option<&Path> {
        None
    }

    /// The URL addressing this resource.
    fn url(&self) -> io::Result<Url>;

    /// Opens a connection for metadata retrieval.
    fn open_connection(&self) -> io::Result<Box<dyn MetadataConnection>>;
}

/// Returns the last-modified time of `resource` in milliseconds since the
/// epoch, or [`UNKNOWN_LAST_MODIFIED`].
///
/// Resolution order: filesystem path, then a `file:` URL that maps to an
/// existing local file, then a metadata-only connection. A connection opened
/// here is closed before returning, whatever the outcome.
pub fn establish_last_modified(resource: &dyn Resource) -> i64 {
    if let Some(path) = resource.file_path() {
        return file_last_modified(path);
    }

    let mut connection = None;
    let result = query(resource, &mut connection);
    if let Some(connection) = connection {
        if let Err(e) = connection.close() {
            tracing::debug!(resource = %resource.description(), error = %e, "closing metadata connection failed");
        }
    }

    match result {
        Ok(Some(millis)) => millis,
        Ok(None) => UNKNOWN_LAST_MODIFIED,
        Err(e) => {
            tracing::warn!(resource = %resource.description(), error = %e, "could not establish last modified time");
            UNKNOWN_LAST_MODIFIED
        }
    }
}

fn query(
    resource: &dyn Resource,
    connection: &mut Option<Box<dyn MetadataConnection>>,
) -> io::Result<Option<i64>> {
    let url = resource.url()?;
    if url.scheme() == "file" {
        if let Ok(path) = url.to_file_path() {
            if path.exists() {
                return Ok(Some(file_last_modified(&path)));
            }
        }
    }
    connection.insert(resource.open_connection()?).last_modified()
}

/// Modification time of a local file, or [`UNKNOWN_LAST_MODIFIED`].
pub fn file_last_modified(path: &Path) -> i64 {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(time) => system_time_millis(time),
        Err(e) => {
            tracing::trace!(path = %path.display(), error = %e, "no modification time");
            UNKNOWN_LAST_MODIFIED
        }
    }
}

/// Converts a [`SystemTime`] to milliseconds since the Unix epoch.
pub fn system_time_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

/// A source file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
}

impl FileResource {
    /// Creates a resource for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Resource for FileResource {
    fn description(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn file_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn url(&self) -> io::Result<Url> {
        let absolute = if self.path.is_absolute() {
            self.path.clone()
        } else {
            std::env::current_dir()?.join(&self.path)
        };
        Url::from_file_path(&absolute).map_err(|()| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file URL", absolute.display()),
            )
        })
    }

    fn open_connection(&self) -> io::Result<Box<dyn MetadataConnection>> {
        Ok(Box::new(FileConnection::open(&self.path)?))
    }
}

/// A source addressed by URL, queried through a [`Connector`].
#[derive(Debug, Clone)]
pub struct UrlResource {
    url: Url,
    connector: Arc<dyn Connector>,
}

impl UrlResource {
    /// Creates a resource using the [`DefaultConnector`].
    pub fn new(url: Url) -> Self {
        Self::with_connector(url, Arc::new(DefaultConnector::default()))
    }

    /// Creates a resource queried through `connector`.
    pub fn with_connector(url: Url, connector: Arc<dyn Connector>) -> Self {
        Self { url, connector }
    }
}

impl Resource for UrlResource {
    fn description(&self) -> String {
        self.url.to_string()
    }

    /// Local files are checked directly. Remote sources are assumed to
    /// exist; the metadata lookup that follows reports a missing one as
    /// [`UNKNOWN_LAST_MODIFIED`].
    fn exists(&self) -> bool {
        if self.url.scheme() == "file" {
            return self.url.to_file_path().is_ok_and(|p| p.exists());
        }
        true
    }

    fn url(&self) -> io::Result<Url> {
        Ok(self.url.clone())
    }

    fn open_connection(&self) -> io::Result<Box<dyn MetadataConnection>> {
        self.connector.connect(&self.url)
    }
}

/// Metadata of a local file, read once at open time.
struct FileConnection {
    metadata: fs::Metadata,
}

impl FileConnection {
    fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            metadata: fs::metadata(path)?,
        })
    }
}

impl MetadataConnection for FileConnection {
    fn last_modified(&mut self) -> io::Result<Option<i64>> {
        self.metadata.modified().map(|t| Some(system_time_millis(t)))
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

/// Connector for `file:` URLs and, with the `http` feature, `http(s):` URLs.
///
/// One HTTP client is built per connector and shared by every lookup.
#[derive(Debug, Clone)]
pub struct DefaultConnector {
    #[cfg(feature = "http")]
    client: Option<reqwest::blocking::Client>,
}

impl DefaultConnector {
    /// Creates a connector whose remote requests give up after `timeout`.
    ///
    /// If the HTTP client cannot be built, remote URLs fail to connect and
    /// their modification time stays unknown.
    #[cfg_attr(not(feature = "http"), allow(unused_variables))]
    pub fn new(timeout: Duration) -> Self {
        Self {
            #[cfg(feature = "http")]
            client: match http::build_client(timeout) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!(error = %e, "http client unavailable");
                    None
                }
            },
        }
    }

    /// Creates a connector that queries remote URLs with `client`.
    #[cfg(feature = "http")]
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self {
            client: Some(client),
        }
    }
}

impl Default for DefaultConnector {
    fn default() -> Self {
        Self::new(Duration::from_millis(
            pagemeta_config::DEFAULT_CONNECT_TIMEOUT_MS,
        ))
    }
}

impl Connector for DefaultConnector {
    fn connect(&self, url: &Url) -> io::Result<Box<dyn MetadataConnection>> {
        match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|()| {
                    io::Error::new(io::ErrorKind::InvalidInput, format!("bad file URL {url}"))
                })?;
                Ok(Box::new(FileConnection::open(&path)?))
            }
            #[cfg(feature = "http")]
            "http" | "https" => {
                let client = self
                    .client
                    .as_ref()
                    .ok_or_else(|| io::Error::other("http client unavailable"))?;
                Ok(Box::new(http::HttpConnection::open(client, url)?))
            }
            scheme => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("no connector for scheme '{scheme}'"),
            )),
        }
    }
}

#[cfg(feature = "http")]
mod http {
    use std::io;
    use std::time::Duration;

    use reqwest::blocking::{Client, Response};
    use reqwest::header::LAST_MODIFIED;
    use reqwest::StatusCode;
    use url::Url;

    use super::MetadataConnection;

    /// The response to a `HEAD` request; no body is ever read.
    pub(super) struct HttpConnection {
        response: Response,
    }

    pub(super) fn build_client(timeout: Duration) -> reqwest::Result<Client> {
        Client::builder().timeout(timeout).build()
    }

    impl HttpConnection {
        pub(super) fn open(client: &Client, url: &Url) -> io::Result<Self> {
            let response = client
                .head(url.as_str())
                .send()
                .map_err(io::Error::other)?;
            match response.status() {
                StatusCode::NOT_FOUND => Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{url} not found"),
                )),
                status if !status.is_success() => {
                    Err(io::Error::other(format!("{url} answered {status}")))
                }
                _ => Ok(Self { response }),
            }
        }
    }

    impl MetadataConnection for HttpConnection {
        fn last_modified(&mut self) -> io::Result<Option<i64>> {
            let Some(value) = self.response.headers().get(LAST_MODIFIED) else {
                return Ok(None);
            };
            let text = value
                .to_str()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            chrono::DateTime::parse_from_rfc2822(text)
                .map(|t| Some(t.timestamp_millis()))
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        }

        fn close(self: Box<Self>) -> io::Result<()> {
            drop(self.response);
            Ok(())
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn touch(path: &Path, millis: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_millis(millis))
            .unwrap();
    }

    #[derive(Debug, Default)]
    struct Counts {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    #[derive(Debug)]
    struct FakeConnector {
        counts: Arc<Counts>,
        reply: Result<Option<i64>, io::ErrorKind>,
        fail_open: bool,
    }

    struct FakeConnection {
        counts: Arc<Counts>,
        reply: Result<Option<i64>, io::ErrorKind>,
    }

    impl MetadataConnection for FakeConnection {
        fn last_modified(&mut self) -> io::Result<Option<i64>> {
            self.reply.map_err(io::Error::from)
        }

        fn close(self: Box<Self>) -> io::Result<()> {
            self.counts.closed.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::other("close failed"))
        }
    }

    impl Connector for FakeConnector {
        fn connect(&self, _url: &Url) -> io::Result<Box<dyn MetadataConnection>> {
            if self.fail_open {
                return Err(io::ErrorKind::NotFound.into());
            }
            self.counts.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeConnection {
                counts: Arc::clone(&self.counts),
                reply: self.reply,
            }))
        }
    }

    fn remote(reply: Result<Option<i64>, io::ErrorKind>, fail_open: bool) -> (UrlResource, Arc<Counts>) {
        let counts = Arc::new(Counts::default());
        let connector = FakeConnector {
            counts: Arc::clone(&counts),
            reply,
            fail_open,
        };
        let url = Url::parse("http://pages.example/index.gsp").unwrap();
        (UrlResource::with_connector(url, Arc::new(connector)), counts)
    }

    #[test]
    fn file_resource_uses_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.gsp");
        fs::write(&path, "<p/>").unwrap();
        touch(&path, 1_700_000_000_000);
        assert_eq!(
            establish_last_modified(&FileResource::new(&path)),
            1_700_000_000_000
        );
    }

    #[test]
    fn missing_file_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let resource = FileResource::new(dir.path().join("gone.gsp"));
        assert!(!resource.exists());
        assert_eq!(establish_last_modified(&resource), UNKNOWN_LAST_MODIFIED);
    }

    #[test]
    fn file_url_maps_to_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.gsp");
        fs::write(&path, "x").unwrap();
        touch(&path, 42_000);
        let resource = UrlResource::new(Url::from_file_path(&path).unwrap());
        assert!(resource.exists());
        assert_eq!(establish_last_modified(&resource), 42_000);
    }

    #[test]
    fn remote_connection_reports_and_closes() {
        let (resource, counts) = remote(Ok(Some(12_001)), false);
        assert_eq!(establish_last_modified(&resource), 12_001);
        assert_eq!(counts.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counts.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remote_failure_is_unknown_and_still_closes() {
        let (resource, counts) = remote(Err(io::ErrorKind::ConnectionReset), false);
        assert_eq!(establish_last_modified(&resource), UNKNOWN_LAST_MODIFIED);
        assert_eq!(counts.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remote_without_header_is_unknown() {
        let (resource, _) = remote(Ok(None), false);
        assert_eq!(establish_last_modified(&resource), UNKNOWN_LAST_MODIFIED);
    }

    #[test]
    fn remote_not_found_is_unknown() {
        let (resource, counts) = remote(Ok(Some(1)), true);
        assert_eq!(establish_last_modified(&resource), UNKNOWN_LAST_MODIFIED);
        assert_eq!(counts.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remote_exists_without_connecting() {
        let (resource, counts) = remote(Ok(Some(1)), false);
        assert!(resource.exists());
        assert_eq!(counts.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_file_url_does_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("gone.gsp")).unwrap();
        assert!(!UrlResource::new(url).exists());
    }

    #[test]
    fn unsupported_scheme_is_unknown() {
        let resource = UrlResource::new(Url::parse("ftp://pages.example/a.gsp").unwrap());
        assert_eq!(establish_last_modified(&resource), UNKNOWN_LAST_MODIFIED);
    }

    #[test]
    fn pre_epoch_times_are_negative() {
        let t = UNIX_EPOCH - Duration::from_millis(1500);
        assert_eq!(system_time_millis(t), -1500);
    }
}
