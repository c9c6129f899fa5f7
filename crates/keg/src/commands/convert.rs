//! `keg convert` -- re-emit a formula as TOML, JSON or Ruby.

use anyhow::{Context, Result};
use keg_formula::emit::{Format, emit};

use crate::cli::{ConvertArgs, ConvertFormat};
use crate::context::RuntimeContext;

impl From<ConvertFormat> for Format {
    fn from(format: ConvertFormat) -> Self {
        match format {
            ConvertFormat::Toml => Format::Toml,
            ConvertFormat::Json => Format::Json,
            ConvertFormat::Ruby => Format::Ruby,
        }
    }
}

/// Execute the `keg convert` command.
pub fn run(ctx: &RuntimeContext, args: &ConvertArgs) -> Result<()> {
    let ws = ctx.workspace()?;
    let formula = ws.load_formula(&args.formula)?;
    let text = emit(&formula, args.to.into())?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            ctx.status(&format!("Wrote {}", path.display()));
        }
        None => {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
