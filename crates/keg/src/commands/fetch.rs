//! `keg fetch` -- download and verify a formula's source archive.

use anyhow::Result;
use keg_build::InstallError;
use keg_core::validation::validate;
use keg_ui::styles::{render_muted, render_pass_icon};

use crate::cli::FetchArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `keg fetch` command.
pub fn run(ctx: &RuntimeContext, args: &FetchArgs) -> Result<()> {
    let ws = ctx.workspace()?;
    let formula = ws.load_formula(&args.formula)?;
    validate(&formula).map_err(InstallError::from)?;
    let checksum = formula.source.checksum().map_err(InstallError::from)?;

    let cache = ws.download_cache();
    if args.force && cache.evict(&formula)? {
        tracing::debug!(name = %formula.name, "evicted cached download");
    }
    let fetcher = ws.fetcher();
    let download = cache.fetch(&fetcher, &formula, Some(&checksum))?;
    checksum
        .verify_file(&download.path)
        .map_err(InstallError::from)?;

    if ctx.json {
        output_json(&serde_json::json!({
            "name": formula.name,
            "version": formula.version_label(),
            "path": download.path.display().to_string(),
            "cached": download.cached,
            "bytes": download.bytes,
            "checksum": checksum,
        }));
    } else if ctx.quiet {
        println!("{}", download.path.display());
    } else {
        let note = if download.cached { " (cached)" } else { "" };
        println!(
            "{} {}{}",
            render_pass_icon(),
            download.path.display(),
            render_muted(note)
        );
    }
    Ok(())
}
