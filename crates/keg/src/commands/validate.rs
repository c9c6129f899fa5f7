//! `keg validate` -- check formulas for errors.
//!
//! Every problem in every formula is reported before exiting; the command
//! fails if any formula has an error. Unknown `{{variables}}` in commands
//! are warnings, since they are passed through to the shell unexpanded.

use anyhow::{Result, bail};
use keg_core::history::Severity;
use keg_core::validation::lint;
use keg_formula::template::unknown_variables;
use keg_ui::styles::{render_bold, render_finding, render_muted, render_pass_icon};
use serde::Serialize;

use crate::cli::ValidateArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

#[derive(Debug, Serialize)]
struct ValidationResult {
    formula: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Execute the `keg validate` command.
pub fn run(ctx: &RuntimeContext, args: &ValidateArgs) -> Result<()> {
    let ws = ctx.workspace()?;
    let mut results = Vec::with_capacity(args.formulas.len());

    for name in &args.formulas {
        let result = match ws.load_formula(name) {
            Ok(formula) => ValidationResult {
                formula: formula.name.clone(),
                path: Some(formula.origin.clone()),
                version: formula.version().ok().map(|v| v.to_string()),
                errors: lint(&formula).iter().map(ToString::to_string).collect(),
                warnings: unknown_variables(&formula)
                    .into_iter()
                    .map(|v| format!("unknown template variable '{{{{{v}}}}}'"))
                    .collect(),
            },
            Err(err) => ValidationResult {
                formula: name.clone(),
                path: None,
                version: None,
                errors: vec![format!("{err:#}")],
                warnings: Vec::new(),
            },
        };
        results.push(result);
    }

    let failed = results.iter().filter(|r| !r.errors.is_empty()).count();

    if ctx.json {
        output_json(&results);
    } else {
        for result in &results {
            print_result(ctx, result);
        }
    }

    if failed > 0 {
        bail!("{failed} of {} formula(s) failed validation", results.len());
    }
    Ok(())
}

fn print_result(ctx: &RuntimeContext, result: &ValidationResult) {
    let label = match &result.version {
        Some(v) => format!("{} {v}", result.formula),
        None => result.formula.clone(),
    };
    if result.errors.is_empty() {
        if !ctx.quiet {
            let path = result.path.as_deref().unwrap_or_default();
            println!(
                "{} {} {}",
                render_pass_icon(),
                render_bold(&label),
                render_muted(path)
            );
        }
    } else {
        println!("{}", render_bold(&label));
    }
    for err in &result.errors {
        println!("  {}", render_finding(Severity::Error, err));
    }
    if !ctx.quiet {
        for warning in &result.warnings {
            println!("  {}", render_finding(Severity::Warning, warning));
        }
    }
}
