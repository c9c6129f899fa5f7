//! `keg install` -- run the install pipeline for one formula.
//!
//! Progress goes to stdout as `==>` stage headers. A failing test stage is
//! a warning: the keg stays installed and the command still succeeds.

use anyhow::Result;
use keg_build::runner::tail_lines;
use keg_build::{InstallOptions, Plan, Stage, StageListener, TestOutcome};
use keg_config::config::KegConfig;
use keg_core::formula::Formula;
use keg_ui::styles::{
    render_fail, render_header, render_muted, render_pass_icon, render_skip_icon, render_warn,
    render_warn_icon,
};

use crate::cli::InstallArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Lines of command output shown when a step fails.
pub const OUTPUT_TAIL: usize = 20;

/// Prints stage headers and, when verbose, each command.
pub struct ProgressListener {
    pub verbose: bool,
}

impl StageListener for ProgressListener {
    fn stage(&self, stage: Stage, formula: &Formula, detail: &str) {
        let title = format!("{} {} {}", stage_verb(stage), formula.name, formula.version_label());
        println!("{}", render_header(&title));
        if self.verbose && !detail.is_empty() {
            println!("{}", render_muted(detail));
        }
    }

    fn step(&self, _stage: Stage, command: &str) {
        if self.verbose {
            println!("{}", render_muted(command));
        }
    }
}

pub fn stage_verb(stage: Stage) -> &'static str {
    match stage {
        Stage::Fetch => "Fetching",
        Stage::Verify => "Verifying",
        Stage::Resolve => "Resolving dependencies for",
        Stage::Build => "Building",
        Stage::Install => "Installing",
        Stage::Test => "Testing",
    }
}

/// Command-line flags layered over the configured defaults.
pub fn install_options(config: &KegConfig, args: &InstallArgs) -> InstallOptions {
    InstallOptions {
        run_tests: config.run_tests && !args.no_test,
        keep_build: config.keep_build || args.keep_build,
        force: args.force,
        jobs: args.jobs.filter(|j| *j > 0).unwrap_or(config.jobs),
    }
}

/// Execute the `keg install` command.
pub fn run(ctx: &RuntimeContext, args: &InstallArgs) -> Result<()> {
    let ws = ctx.workspace()?;
    let formula = ws.load_formula(&args.formula)?;
    let options = install_options(&ws.config, args);
    let fetcher = ws.fetcher();

    if args.dry_run {
        let plan = ws.installer(&fetcher).plan(&formula, &options)?;
        if ctx.json {
            output_json(&plan);
        } else {
            print_plan(&plan);
        }
        return Ok(());
    }

    let listener = ProgressListener {
        verbose: ctx.verbose,
    };
    let mut installer = ws.installer(&fetcher);
    if !ctx.quiet && !ctx.json {
        installer = installer.with_listener(&listener);
    }

    let report = match installer.install(&formula, &options) {
        Ok(report) => report,
        Err(err) => {
            if let Some(output) = err.step_output() {
                print_output_tail(output);
            }
            return Err(err.into());
        }
    };

    if ctx.json {
        output_json(&report);
        return Ok(());
    }

    report_test(ctx, &report.test);
    if let Some(dir) = &report.build_dir {
        ctx.status(&render_muted(&format!("Build directory kept at {}", dir.display())));
    }
    ctx.status(&format!(
        "{} {} {} installed to {}",
        render_pass_icon(),
        report.name,
        report.version,
        report.prefix.display()
    ));
    Ok(())
}

/// Reports a test outcome. Failures always print, even with `--quiet`.
pub fn report_test(ctx: &RuntimeContext, outcome: &TestOutcome) {
    match outcome {
        TestOutcome::Passed { steps } => {
            ctx.status(&render_muted(&format!("Test passed ({steps} step(s))")));
        }
        TestOutcome::Failed { step, code, output } => {
            let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            eprintln!(
                "{} {}",
                render_warn_icon(),
                render_warn(&format!("Test failed (exit {code}): {step}"))
            );
            print_output_tail(output);
        }
        TestOutcome::Skipped { reason } => {
            ctx.status(&format!(
                "{} {}",
                render_skip_icon(),
                render_muted(&format!("Test skipped: {reason}"))
            ));
        }
    }
}

fn print_output_tail(output: &str) {
    let tail = tail_lines(output, OUTPUT_TAIL);
    if tail.trim().is_empty() {
        return;
    }
    for line in tail.lines() {
        eprintln!("  {}", render_fail(line));
    }
}

fn print_plan(plan: &Plan) {
    println!("{}", render_header(&format!("Would install {} {}", plan.name, plan.version)));
    println!("Prefix:   {}", plan.prefix.display());
    println!("Archive:  {}", plan.archive.display());
    println!("Checksum: {}", plan.checksum);

    if !plan.dependencies.is_empty() {
        println!();
        println!("DEPENDENCIES");
        for dep in &plan.dependencies {
            let status = match &dep.provision {
                Some(keg_build::deps::Provision::Keg { version, .. }) => format!("keg {version}"),
                Some(keg_build::deps::Provision::System { path }) => path.display().to_string(),
                None => render_fail("missing"),
            };
            println!("  {} ({}) {}", dep.name, dep.stage, render_muted(&status));
        }
    }
    for (title, steps) in [
        ("BUILD", &plan.build),
        ("INSTALL", &plan.install),
        ("TEST", &plan.test),
    ] {
        if steps.is_empty() {
            continue;
        }
        println!();
        println!("{title}");
        for step in steps {
            println!("  {step}");
        }
    }
}
