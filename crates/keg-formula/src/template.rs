//! Command templates: `{{variable}}` substitution in build, install and
//! test steps.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use keg_core::formula::{Formula, Step};

/// Argument that expands to the standard CMake configuration flags.
pub const STD_CMAKE_ARGS: &str = "{{std_cmake_args}}";

/// Variables a formula may reference.
pub const KNOWN_VARIABLES: &[&str] = &[
    "name",
    "version",
    "prefix",
    "bin",
    "lib",
    "include",
    "share",
    "formula_path",
    "jobs",
    "std_cmake_args",
];

/// The standard CMake flags for installing into `prefix`.
pub fn std_cmake_args(prefix: &Path) -> Vec<String> {
    vec![
        format!("-DCMAKE_INSTALL_PREFIX={}", prefix.display()),
        "-DCMAKE_BUILD_TYPE=Release".to_string(),
        "-DCMAKE_FIND_FRAMEWORK=LAST".to_string(),
        "-DCMAKE_VERBOSE_MAKEFILE=ON".to_string(),
        "-Wno-dev".to_string(),
    ]
}

/// Values for every template variable of one keg.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    vars: HashMap<String, String>,
    cmake_args: Vec<String>,
}

impl TemplateContext {
    /// Builds the variables for installing `formula` into `prefix`.
    pub fn for_keg(formula: &Formula, prefix: &Path, formula_path: &Path, jobs: usize) -> Self {
        let mut vars = HashMap::new();
        let p = |sub: &str| prefix.join(sub).display().to_string();
        vars.insert("name".to_string(), formula.name.clone());
        vars.insert("version".to_string(), formula.version_label());
        vars.insert("prefix".to_string(), prefix.display().to_string());
        vars.insert("bin".to_string(), p("bin"));
        vars.insert("lib".to_string(), p("lib"));
        vars.insert("include".to_string(), p("include"));
        vars.insert("share".to_string(), p("share"));
        vars.insert(
            "formula_path".to_string(),
            formula_path.display().to_string(),
        );
        vars.insert("jobs".to_string(), jobs.max(1).to_string());

        let cmake_args = std_cmake_args(prefix);
        vars.insert(
            "std_cmake_args".to_string(),
            cmake_args
                .iter()
                .map(|a| shell_quote(a))
                .collect::<Vec<_>>()
                .join(" "),
        );
        Self { vars, cmake_args }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Expands a step. In an argv step, an argument that is exactly
    /// `{{std_cmake_args}}` is replaced by the individual flags.
    pub fn expand(&self, step: &Step) -> Step {
        match step {
            Step::Shell(cmd) => Step::Shell(substitute_vars(cmd, &self.vars)),
            Step::Exec(argv) => {
                let mut out = Vec::with_capacity(argv.len() + self.cmake_args.len());
                for arg in argv {
                    if arg == STD_CMAKE_ARGS {
                        out.extend(self.cmake_args.iter().cloned());
                    } else {
                        out.push(substitute_vars(arg, &self.vars));
                    }
                }
                Step::Exec(out)
            }
        }
    }
}

/// Substitute `{{variable}}` patterns in a string with provided values.
/// Unresolved variables are left as-is.
pub fn substitute_vars(text: &str, vars: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match var_name(after) {
            Some(name) => {
                match vars.get(name) {
                    Some(val) => result.push_str(val),
                    None => {
                        result.push_str("{{");
                        result.push_str(name);
                        result.push_str("}}");
                    }
                }
                rest = &after[name.len() + 2..];
            }
            None => {
                result.push_str("{{");
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

/// Extract all `{{variable}}` names referenced in a formula's steps.
pub fn extract_variables(formula: &Formula) -> Vec<String> {
    let mut vars = BTreeSet::new();
    for step in formula
        .build
        .iter()
        .chain(&formula.install)
        .chain(&formula.test)
    {
        match step {
            Step::Shell(cmd) => scan_vars(cmd, &mut vars),
            Step::Exec(argv) => argv.iter().for_each(|a| scan_vars(a, &mut vars)),
        }
    }
    vars.into_iter().collect()
}

/// Variables referenced by the formula that keg does not define.
pub fn unknown_variables(formula: &Formula) -> Vec<String> {
    extract_variables(formula)
        .into_iter()
        .filter(|v| !KNOWN_VARIABLES.contains(&v.as_str()))
        .collect()
}

/// Quotes `arg` for `sh` if it contains anything but safe characters.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./:,+@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// If `s` starts with `name}}`, returns `name`.
fn var_name(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if !bytes.first().is_some_and(|b| is_var_start(*b)) {
        return None;
    }
    let end = bytes.iter().position(|b| !is_var_cont(*b))?;
    s[end..].starts_with("}}").then(|| &s[..end])
}

fn is_var_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_var_cont(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn scan_vars(text: &str, vars: &mut BTreeSet<String>) {
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        match var_name(after) {
            Some(name) => {
                vars.insert(name.to_string());
                rest = &after[name.len() + 2..];
            }
            None => rest = after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keg_core::formula::Source;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn make_vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn formula(install: Vec<Step>, test: Vec<Step>) -> Formula {
        Formula {
            name: "mattext".into(),
            version: None,
            homepage: String::new(),
            desc: String::new(),
            source: Source {
                url: "https://github.com/dhurum/mattext/archive/v0.8.tar.gz".into(),
                sha256: None,
                sha1: None,
            },
            dependencies: vec![],
            build: vec![],
            install,
            test,
            origin: String::new(),
        }
    }

    #[test]
    fn substitute_simple() {
        let vars = make_vars(&[("prefix", "/opt/keg")]);
        assert_eq!(
            substitute_vars("make PREFIX={{prefix}} install", &vars),
            "make PREFIX=/opt/keg install"
        );
    }

    #[test]
    fn substitute_missing_left_alone() {
        let vars = make_vars(&[("a", "X")]);
        assert_eq!(substitute_vars("{{a}} {{missing}}", &vars), "X {{missing}}");
    }

    #[test]
    fn substitute_ignores_malformed() {
        let vars = make_vars(&[("a", "X")]);
        assert_eq!(substitute_vars("{{ a }} {{a} {{", &vars), "{{ a }} {{a} {{");
        assert_eq!(substitute_vars("{{{a}}}", &vars), "{{{a}}}");
    }

    #[test]
    fn expand_splices_cmake_args() {
        let f = formula(vec![], vec![]);
        let ctx = TemplateContext::for_keg(
            &f,
            Path::new("/keg/Cellar/mattext/0.8"),
            Path::new("/formulae/mattext.rb"),
            4,
        );
        let step = Step::Exec(vec!["cmake".into(), "./".into(), STD_CMAKE_ARGS.into()]);
        match ctx.expand(&step) {
            Step::Exec(argv) => {
                assert_eq!(argv[0], "cmake");
                assert_eq!(argv[2], "-DCMAKE_INSTALL_PREFIX=/keg/Cellar/mattext/0.8");
                assert_eq!(argv.len(), 2 + std_cmake_args(Path::new("/x")).len());
            }
            other => panic!("expected Exec, got {other:?}"),
        }
    }

    #[test]
    fn expand_shell_step() {
        let f = formula(vec![], vec![]);
        let prefix = PathBuf::from("/keg/Cellar/mattext/0.8");
        let ctx = TemplateContext::for_keg(&f, &prefix, Path::new("/f/mattext.rb"), 0);
        assert_eq!(ctx.get("jobs"), Some("1"));
        assert_eq!(
            ctx.expand(&Step::Shell("{{bin}}/mattext {{formula_path}}".into())),
            Step::Shell("/keg/Cellar/mattext/0.8/bin/mattext /f/mattext.rb".into())
        );
        assert_eq!(
            ctx.expand(&Step::Shell("make -j{{jobs}} && echo {{version}}".into())),
            Step::Shell("make -j1 && echo 0.8".into())
        );
    }

    #[test]
    fn extract_and_unknown() {
        let f = formula(
            vec![Step::Exec(vec!["cmake".into(), STD_CMAKE_ARGS.into()])],
            vec![Step::Shell("{{bin}}/mattext {{fixture}}".into())],
        );
        assert_eq!(
            extract_variables(&f),
            vec!["bin", "fixture", "std_cmake_args"]
        );
        assert_eq!(unknown_variables(&f), vec!["fixture"]);
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("-DCMAKE_BUILD_TYPE=Release"), "-DCMAKE_BUILD_TYPE=Release");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
