//! `pagemeta check`: has a page's source changed since it was compiled?

use std::sync::Arc;
use std::time::Duration;

use pagemeta_cache::{DefaultConnector, FileResource, PageArtifact, PageMetaInfo, Resource, UrlResource};
use url::Url;

use crate::{CheckArgs, GlobalArgs};

/// Exit code reported when the source is newer than the artifact.
pub const EXIT_CHANGED: i32 = 2;

/// Runs the `pagemeta check` command.
///
/// Returns exit code 0 when the source is unchanged (or its modification time
/// cannot be established) and [`EXIT_CHANGED`] when it is newer.
pub fn run(args: &CheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = global.load_config()?;
    let timeout = Duration::from_millis(config.connection.timeout_ms);
    let artifact = PageArtifact::open(&args.artifact.dir, &args.artifact.identifier)?;
    let info = PageMetaInfo::from_artifact(artifact, (&config.reload).into())?;

    let source = resolve_source(&args.source, timeout);
    if !source.exists() {
        tracing::warn!(source = %source.description(), "page source does not exist");
    }

    let resolve = || Some(Arc::clone(&source));
    let changed = info.should_reload(Some(&resolve));
    if !global.quiet {
        let verdict = if changed { "changed" } else { "unchanged" };
        eprintln!("  {} {verdict} (compiled at {})", source.description(), info.last_modified());
    }
    Ok(if changed { EXIT_CHANGED } else { 0 })
}

/// Interprets `source` as a URL when it has a scheme longer than a drive
/// letter, otherwise as a filesystem path.
fn resolve_source(source: &str, timeout: Duration) -> Arc<dyn Resource> {
    match Url::parse(source) {
        Ok(url) if url.scheme().len() > 1 => {
            Arc::new(UrlResource::with_connector(url, Arc::new(DefaultConnector::new(timeout))))
        }
        _ => Arc::new(FileResource::new(source)),
    }
}
