//! `keg history` -- check formulas as the release history of a package.
//!
//! Formulas are grouped by name and each group is checked separately, so a
//! directory holding several packages' release files can be passed as is.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use keg_core::formula::Formula;
use keg_core::history::{HistoryReport, check_history};
use keg_formula::parser::{load_dir, load_formula};
use keg_ui::styles::{render_bold, render_finding, render_muted, render_pass_icon};

use crate::cli::HistoryArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `keg history` command.
pub fn run(ctx: &RuntimeContext, args: &HistoryArgs) -> Result<()> {
    let formulae = load_all(&args.paths)?;
    if formulae.is_empty() {
        bail!("no formula files found");
    }
    let reports = history_reports(formulae);

    if ctx.json {
        output_json(&reports);
    } else {
        for report in &reports {
            print_report(ctx, report);
        }
    }

    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| !r.is_clean())
        .map(|r| r.name.as_str())
        .collect();
    if !failed.is_empty() {
        bail!("release history has errors: {}", failed.join(", "));
    }
    Ok(())
}

fn load_all(paths: &[PathBuf]) -> Result<Vec<Formula>> {
    let mut formulae = Vec::new();
    for path in paths {
        if path.is_dir() {
            formulae.extend(
                load_dir(path).with_context(|| format!("failed to load {}", path.display()))?,
            );
        } else {
            formulae.push(
                load_formula(path)
                    .with_context(|| format!("failed to load formula {}", path.display()))?,
            );
        }
    }
    Ok(formulae)
}

/// One report per package name, in name order.
pub fn history_reports(formulae: Vec<Formula>) -> Vec<HistoryReport> {
    let mut by_name: BTreeMap<String, Vec<Formula>> = BTreeMap::new();
    for formula in formulae {
        by_name.entry(formula.name.clone()).or_default().push(formula);
    }
    by_name.values().map(|group| check_history(group)).collect()
}

fn print_report(ctx: &RuntimeContext, report: &HistoryReport) {
    let versions = report.versions.join(" -> ");
    if report.findings.is_empty() {
        println!("{} {} {}", render_pass_icon(), render_bold(&report.name), versions);
    } else {
        println!("{} {}", render_bold(&report.name), versions);
    }
    if !ctx.quiet {
        for t in &report.transitions {
            if t.added.is_empty() && t.removed.is_empty() {
                continue;
            }
            let mut changes: Vec<String> = t.added.iter().map(|d| format!("+{d}")).collect();
            changes.extend(t.removed.iter().map(|d| format!("-{d}")));
            println!(
                "  {}",
                render_muted(&format!("{} -> {}: {}", t.from, t.to, changes.join(" ")))
            );
        }
    }
    for finding in &report.findings {
        println!("  {}", render_finding(finding.severity(), &finding.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keg_core::checksum::{Checksum, HashAlgorithm};
    use keg_core::formula::{Source, Step};
    use pretty_assertions::assert_eq;

    fn release(name: &str, version: &str, digest_byte: char) -> Formula {
        let checksum =
            Checksum::new(HashAlgorithm::Sha256, &digest_byte.to_string().repeat(64)).unwrap();
        Formula {
            name: name.into(),
            version: None,
            homepage: String::new(),
            desc: String::new(),
            source: Source::new(
                format!("https://example.org/{name}/archive/v{version}.tar.gz"),
                &checksum,
            ),
            dependencies: vec![],
            build: vec![],
            install: vec![Step::Shell("make install".into())],
            test: vec![],
            origin: String::new(),
        }
    }

    #[test]
    fn groups_by_name() {
        let reports = history_reports(vec![
            release("mattext", "0.8", 'b'),
            release("libev", "4.33", 'c'),
            release("mattext", "0.6", 'a'),
        ]);
        let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["libev", "mattext"]);
        assert_eq!(reports[1].versions, vec!["0.6", "0.8"]);
        assert!(reports.iter().all(HistoryReport::is_clean));
    }

    #[test]
    fn shared_checksum_is_not_clean() {
        let reports = history_reports(vec![
            release("mattext", "0.6", 'a'),
            release("mattext", "0.7", 'a'),
        ]);
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].is_clean());
    }
}
