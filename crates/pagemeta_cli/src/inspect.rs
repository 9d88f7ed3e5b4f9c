//! `pagemeta inspect`: summary of a precompiled page.

use pagemeta_cache::{PageArtifact, PageMetaInfo};

use crate::{ArtifactArgs, GlobalArgs};

/// Runs the `pagemeta inspect` command.
///
/// Prints the descriptor fields, the number of static HTML parts and the
/// length of the line-number map. Returns exit code 0 on success.
pub fn run(args: &ArtifactArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = global.load_config()?;
    let artifact = PageArtifact::open(&args.dir, &args.identifier)?;
    let info = PageMetaInfo::from_artifact(artifact, (&config.reload).into())?;

    for line in report(&info, global.verbose) {
        println!("{line}");
    }
    Ok(0)
}

/// Formats the lines `inspect` prints.
fn report(info: &PageMetaInfo, verbose: bool) -> Vec<String> {
    let none = || "-".to_string();
    let codecs = info.codec_names();
    let mut lines = vec![
        format!("identifier:     {}", info.identifier().unwrap_or("-")),
        format!("content type:   {}", info.content_type().unwrap_or("-")),
        format!("last modified:  {}", info.last_modified()),
        format!(
            "codecs:         expression={} static={} out={} taglib={}",
            codecs.expression.clone().unwrap_or_else(none),
            codecs.static_html.clone().unwrap_or_else(none),
            codecs.out.clone().unwrap_or_else(none),
            codecs.taglib.clone().unwrap_or_else(none),
        ),
        format!("compile static: {}", info.is_compile_static_mode()),
        format!("model fields:   {}", join(info.model_fields().iter())),
        format!(
            "html parts:     {}",
            info.html_parts().map_or_else(none, |p| p.len().to_string())
        ),
    ];

    lines.push(match info.line_numbers() {
        Ok(Some(map)) => format!("line numbers:   {}", map.len()),
        Ok(None) => format!("line numbers:   {}", none()),
        Err(e) => format!("line numbers:   unavailable ({e})"),
    });

    if verbose {
        for (prefix, uri) in info.jsp_tags() {
            lines.push(format!("taglib:         {prefix} = {uri}"));
        }
        if let Some(parts) = info.html_parts() {
            for (i, part) in parts.iter().enumerate() {
                lines.push(format!("html[{i}]:        {part:?}"));
            }
        }
    }
    lines
}

fn join<'a>(names: impl Iterator<Item = &'a String>) -> String {
    let joined = names.map(String::as_str).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}
