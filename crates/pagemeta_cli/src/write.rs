//! `pagemeta write-html` and `pagemeta write-lines`: side-data production.

use pagemeta_cache::side_data;

use crate::{GlobalArgs, WriteHtmlArgs, WriteLinesArgs};

/// Runs the `pagemeta write-html` command. Returns exit code 0 on success.
pub fn run_html(args: &WriteHtmlArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let path = side_data::store_string_array(&args.artifact.dir, &args.artifact.identifier, &args.parts)?;
    if !global.quiet {
        eprintln!("     Wrote {} ({} parts)", path.display(), args.parts.len());
    }
    Ok(0)
}

/// Runs the `pagemeta write-lines` command. Returns exit code 0 on success.
pub fn run_lines(args: &WriteLinesArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let path = side_data::store_int_array(&args.artifact.dir, &args.artifact.identifier, &args.lines)?;
    if !global.quiet {
        eprintln!("     Wrote {} ({} lines)", path.display(), args.lines.len());
    }
    Ok(0)
}
