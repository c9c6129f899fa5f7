//! `keg show` -- display a parsed formula.

use anyhow::Result;
use keg_core::formula::{Formula, Step};
use keg_ui::styles::{render_accent, render_bold, render_muted};

use crate::cli::ShowArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `keg show` command.
pub fn run(ctx: &RuntimeContext, args: &ShowArgs) -> Result<()> {
    let ws = ctx.workspace()?;
    let formula = ws.load_formula(&args.formula)?;

    if ctx.json {
        let mut value = serde_json::to_value(&formula)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("version".into(), formula.version_label().into());
            obj.insert("origin".into(), formula.origin.clone().into());
            obj.insert(
                "installed".into(),
                ws.cellar()
                    .receipt(&formula.name, &formula.version_label())
                    .is_some()
                    .into(),
            );
        }
        output_json(&value);
        return Ok(());
    }

    println!("{}", format_formula(&formula));
    Ok(())
}

/// Multi-line human-readable view of a formula.
pub fn format_formula(formula: &Formula) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        render_bold(&formula.name),
        formula.version_label()
    ));
    if !formula.desc.is_empty() {
        lines.push(formula.desc.clone());
    }
    if !formula.homepage.is_empty() {
        lines.push(render_accent(&formula.homepage));
    }
    lines.push(String::new());
    lines.push(format!("Source:   {}", formula.source.url));
    let checksum = match formula.source.checksum() {
        Ok(c) => c.to_string(),
        Err(err) => format!("invalid ({err})"),
    };
    lines.push(format!("Checksum: {checksum}"));

    if !formula.dependencies.is_empty() {
        lines.push(String::new());
        lines.push("DEPENDENCIES".to_string());
        for dep in &formula.dependencies {
            lines.push(format!("  {} {}", dep.name, render_muted(&format!("({})", dep.stage))));
        }
    }

    let procedure = formula.procedure();
    push_steps(&mut lines, "BUILD", procedure.build);
    push_steps(&mut lines, "INSTALL", procedure.install);
    push_steps(&mut lines, "TEST", &formula.test);

    if !formula.origin.is_empty() {
        lines.push(String::new());
        lines.push(render_muted(&format!("From: {}", formula.origin)));
    }
    lines.join("\n")
}

fn push_steps(lines: &mut Vec<String>, title: &str, steps: &[Step]) {
    if steps.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(title.to_string());
    for step in steps {
        lines.push(format!("  {step}"));
    }
}
