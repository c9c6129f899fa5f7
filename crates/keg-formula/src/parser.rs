//! Parse formula files (TOML, JSON, Ruby) and resolve formula paths.

use std::path::{Path, PathBuf};

use keg_core::formula::Formula;

use crate::error::FormulaError;
use crate::ruby::parse_ruby;

/// File suffixes tried, in order, when looking a formula up by name.
pub const FORMULA_SUFFIXES: &[&str] = &[".rb", ".toml", ".json"];

/// Parse a formula from a TOML string.
pub fn parse_toml(content: &str) -> Result<Formula, FormulaError> {
    toml::from_str(content).map_err(|e| FormulaError::Parse(e.to_string()))
}

/// Parse a formula from a JSON string.
pub fn parse_json(content: &str) -> Result<Formula, FormulaError> {
    serde_json::from_str(content).map_err(|e| FormulaError::Parse(e.to_string()))
}

/// Load a formula from a file path (format picked by extension).
pub fn load_formula(path: &Path) -> Result<Formula, FormulaError> {
    let content = std::fs::read_to_string(path).map_err(|source| FormulaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut formula = match path.extension().and_then(|e| e.to_str()) {
        Some("rb") => parse_ruby(&content)?,
        Some("toml") => parse_toml(&content)?,
        Some("json") => parse_json(&content)?,
        _ => {
            // Try JSON first, then TOML, then Ruby
            parse_json(&content)
                .or_else(|_| parse_toml(&content))
                .or_else(|_| parse_ruby(&content))?
        }
    };
    formula.origin = path.display().to_string();
    tracing::debug!(name = %formula.name, origin = %formula.origin, "loaded formula");
    Ok(formula)
}

/// Load every formula file (by known suffix) directly inside `dir`,
/// sorted by file name.
pub fn load_dir(dir: &Path) -> Result<Vec<Formula>, FormulaError> {
    let read_err = |source| FormulaError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(read_err)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_formula_suffix(p))
        .collect();
    paths.sort();
    paths.iter().map(|p| load_formula(p)).collect()
}

fn has_formula_suffix(path: &Path) -> bool {
    let name = path.to_string_lossy();
    FORMULA_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Search for a formula by name.
///
/// Search order:
/// 1. Exact path (absolute, or relative to `cwd`)
/// 2. `cwd` with standard suffixes
/// 3. Each of `search_dirs` with standard suffixes
pub fn find_formula(
    name: &str,
    cwd: &Path,
    search_dirs: &[PathBuf],
) -> Result<PathBuf, FormulaError> {
    // 1. Exact path
    let exact = Path::new(name);
    if exact.is_absolute() && exact.is_file() {
        return Ok(exact.to_path_buf());
    }
    let relative = cwd.join(name);
    if relative.is_file() {
        return Ok(relative);
    }

    // 2-3. cwd, then configured formula directories
    for dir in std::iter::once(cwd).chain(search_dirs.iter().map(PathBuf::as_path)) {
        if !dir.is_dir() {
            continue;
        }
        for suffix in FORMULA_SUFFIXES {
            let candidate = dir.join(format!("{name}{suffix}"));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    let mut searched = vec![cwd.display().to_string()];
    searched.extend(search_dirs.iter().map(|d| d.display().to_string()));
    Err(FormulaError::NotFound {
        name: name.to_string(),
        searched: searched.join(", "),
    })
}
