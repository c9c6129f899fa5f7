//! `keg list` -- list installed kegs.

use anyhow::Result;

use crate::context::RuntimeContext;
use crate::output::{format_receipt_row, output_json, output_table, receipt_json};

/// Execute the `keg list` command.
pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let ws = ctx.workspace()?;
    let fetcher = ws.fetcher();
    let receipts = ws.installer(&fetcher).installed();

    if ctx.json {
        output_json(&receipts.iter().map(receipt_json).collect::<Vec<_>>());
        return Ok(());
    }
    if receipts.is_empty() {
        ctx.status("No kegs installed.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = receipts.iter().map(format_receipt_row).collect();
    output_table(&["NAME", "VERSION", "INSTALLED", "PREFIX"], &rows);
    Ok(())
}
