//! `keg` -- validate, fetch and install package formulas.
//!
//! Parses CLI arguments with clap, resolves the runtime context, and
//! dispatches to command handlers.

mod cli;
mod commands;
mod context;
mod output;

use std::sync::atomic::{AtomicBool, Ordering};

use clap::{CommandFactory, Parser};

use cli::{Cli, Commands};
use context::RuntimeContext;

/// Tracks whether a Ctrl+C has already been received.
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

fn main() {
    // First Ctrl+C: exit cleanly. Second: force exit.
    let _ = ctrlc::set_handler(|| {
        if CTRLC_RECEIVED.swap(true, Ordering::SeqCst) {
            std::process::exit(1);
        }
        std::process::exit(0);
    });

    let cli = Cli::parse();
    let ctx = RuntimeContext::from_global_args(&cli.global);

    if ctx.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("keg=debug,keg_build=debug,keg_fetch=debug,keg_lockfile=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Some(Commands::Validate(args)) => commands::validate::run(&ctx, &args),
        Some(Commands::Show(args)) => commands::show::run(&ctx, &args),
        Some(Commands::Convert(args)) => commands::convert::run(&ctx, &args),
        Some(Commands::Checksum(args)) => commands::checksum::run(&ctx, &args),
        Some(Commands::Fetch(args)) => commands::fetch::run(&ctx, &args),
        Some(Commands::Install(args)) => commands::install::run(&ctx, &args),
        Some(Commands::Test(args)) => commands::test::run(&ctx, &args),
        Some(Commands::List) => commands::list::run(&ctx),
        Some(Commands::Uninstall(args)) => commands::uninstall::run(&ctx, &args),
        Some(Commands::History(args)) => commands::history::run(&ctx, &args),
        Some(Commands::Config(args)) => commands::config_cmd::run(&ctx, &args),
        Some(Commands::Completion(args)) => commands::completion::run(&ctx, &args),
        Some(Commands::Version) => commands::version::run(&ctx),
        None => {
            let _ = Cli::command().print_help();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        if ctx.json {
            let err_json = serde_json::json!({ "error": format!("{:#}", e) });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&err_json).unwrap_or_else(|_| format!("{:#}", e))
            );
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}
