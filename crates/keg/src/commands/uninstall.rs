//! `keg uninstall` -- remove installed kegs.

use anyhow::Result;
use keg_ui::styles::render_pass_icon;

use crate::cli::UninstallArgs;
use crate::context::RuntimeContext;
use crate::output::{output_json, receipt_json};

/// Execute the `keg uninstall` command.
pub fn run(ctx: &RuntimeContext, args: &UninstallArgs) -> Result<()> {
    let ws = ctx.workspace()?;
    let fetcher = ws.fetcher();
    let removed = ws
        .installer(&fetcher)
        .uninstall(&args.name, args.version.as_deref())?;

    if ctx.json {
        output_json(&removed.iter().map(receipt_json).collect::<Vec<_>>());
        return Ok(());
    }
    for receipt in &removed {
        ctx.status(&format!(
            "{} Uninstalled {} {} ({})",
            render_pass_icon(),
            receipt.name,
            receipt.version,
            receipt.prefix.display()
        ));
    }
    Ok(())
}
