//! `keg config` -- show the effective configuration.
//!
//! Apart from `config init`, which writes the defaults once, the
//! configuration is changed by editing `config.yaml` in the keg home or by
//! setting `KEG_*` environment variables.

use anyhow::{Result, bail};
use keg_config::config::{KegConfig, save_config};
use keg_config::keg_dir::keg_home;

use crate::cli::{ConfigArgs, ConfigCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `keg config` command.
pub fn run(ctx: &RuntimeContext, args: &ConfigArgs) -> Result<()> {
    match args.command.as_ref().unwrap_or(&ConfigCommands::Show) {
        ConfigCommands::Show => {
            let ws = ctx.workspace()?;
            if ctx.json {
                output_json(&serde_json::json!({
                    "home": ws.home.display().to_string(),
                    "config_file": ws.config_path().display().to_string(),
                    "root": ws.root.display().to_string(),
                    "cache_dir": ws.cache_dir.display().to_string(),
                    "formula_dirs": ws
                        .formula_dirs
                        .iter()
                        .map(|d| d.display().to_string())
                        .collect::<Vec<_>>(),
                    "config": ws.config,
                }));
            } else {
                println!("# home: {}", ws.home.display());
                println!("# root: {}", ws.root.display());
                println!("# cache_dir: {}", ws.cache_dir.display());
                print!("{}", serde_yaml::to_string(&ws.config)?);
            }
        }
        ConfigCommands::Path => {
            let ws = ctx.workspace()?;
            if ctx.json {
                output_json(&serde_json::json!({
                    "path": ws.config_path().display().to_string(),
                    "exists": ws.config_path().is_file(),
                }));
            } else {
                println!("{}", ws.config_path().display());
            }
        }
        // An existing config.yaml may be invalid, so init does not load it
        ConfigCommands::Init { force } => init(ctx, *force)?,
    }
    Ok(())
}

fn init(ctx: &RuntimeContext, force: bool) -> Result<()> {
    let home = keg_home()?;
    let path = crate::context::config_path(&home);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    save_config(&home, &KegConfig::default())?;
    tracing::info!(path = %path.display(), "wrote default configuration");

    if ctx.json {
        output_json(&serde_json::json!({ "path": path.display().to_string() }));
    } else if !ctx.quiet {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
