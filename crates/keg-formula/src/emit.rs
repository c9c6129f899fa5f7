//! Write formulas back out as TOML, JSON or Ruby.

use std::fmt::Write as _;

use keg_core::formula::{DependencyStage, Formula, Step};

use crate::error::FormulaError;
use crate::ruby::{class_from_name, ruby_accessor};
use crate::template::STD_CMAKE_ARGS;

/// Output format for [`emit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
    Ruby,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "ruby" | "rb" => Ok(Self::Ruby),
            other => Err(format!("unknown format '{other}' (expected toml, json or ruby)")),
        }
    }
}

pub fn emit(formula: &Formula, format: Format) -> Result<String, FormulaError> {
    match format {
        Format::Toml => to_toml(formula),
        Format::Json => to_json(formula),
        Format::Ruby => Ok(to_ruby(formula)),
    }
}

pub fn to_toml(formula: &Formula) -> Result<String, FormulaError> {
    toml::to_string_pretty(formula).map_err(|e| FormulaError::Serialize(e.to_string()))
}

pub fn to_json(formula: &Formula) -> Result<String, FormulaError> {
    serde_json::to_string_pretty(formula).map_err(|e| FormulaError::Serialize(e.to_string()))
}

/// Renders a formula in the Ruby DSL accepted by [`crate::ruby::parse_ruby`].
pub fn to_ruby(formula: &Formula) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "class {} < Formula", class_from_name(&formula.name));
    if !formula.desc.is_empty() {
        let _ = writeln!(out, "  desc {}", ruby_literal(&formula.desc));
    }
    if !formula.homepage.is_empty() {
        let _ = writeln!(out, "  homepage {}", ruby_literal(&formula.homepage));
    }
    let _ = writeln!(out, "  url {}", ruby_literal(&formula.source.url));
    if let Some(version) = &formula.version {
        let _ = writeln!(out, "  version {}", ruby_literal(version));
    }
    if let Some(sha256) = &formula.source.sha256 {
        let _ = writeln!(out, "  sha256 {}", ruby_literal(sha256));
    }
    if let Some(sha1) = &formula.source.sha1 {
        let _ = writeln!(out, "  sha1 {}", ruby_literal(sha1));
    }

    if !formula.dependencies.is_empty() {
        out.push('\n');
        for dep in &formula.dependencies {
            let option = match dep.stage {
                DependencyStage::Runtime => "",
                DependencyStage::Build => " => :build",
                DependencyStage::Test => " => :test",
                DependencyStage::Optional => " => :optional",
            };
            let _ = writeln!(out, "  depends_on {}{option}", ruby_literal(&dep.name));
        }
    }

    if !formula.build.is_empty() {
        push_steps(&mut out, "def build", &formula.build);
    }
    push_steps(&mut out, "def install", &formula.install);
    if !formula.test.is_empty() {
        push_steps(&mut out, "test do", &formula.test);
    }
    out.push_str("end\n");
    out
}

fn push_steps(out: &mut String, opener: &str, steps: &[Step]) {
    let _ = writeln!(out, "\n  {opener}");
    for step in steps {
        let _ = writeln!(out, "    {}", ruby_system(step));
    }
    out.push_str("  end\n");
}

fn ruby_system(step: &Step) -> String {
    match step {
        Step::Shell(cmd) => format!("system {}", ruby_string(cmd)),
        // A lone string would read back as a shell command.
        Step::Exec(argv) if argv.len() == 1 && argv[0] != STD_CMAKE_ARGS => {
            let program = ruby_string(&argv[0]);
            format!("system [{program}, {program}]")
        }
        Step::Exec(argv) => {
            let args: Vec<String> = argv
                .iter()
                .map(|arg| {
                    if arg == STD_CMAKE_ARGS {
                        "*std_cmake_args".to_string()
                    } else {
                        ruby_string(arg)
                    }
                })
                .collect();
            format!("system {}", args.join(", "))
        }
    }
}

/// A double-quoted Ruby string with no interpolation.
fn ruby_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    push_escaped(&mut out, s);
    out.push('"');
    out
}

/// A double-quoted Ruby string; `{{var}}` with a Ruby accessor becomes
/// `#{accessor}`.
fn ruby_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut rest = s;
    while let Some(open) = rest.find("{{") {
        push_escaped(&mut out, &rest[..open]);
        let after = &rest[open + 2..];
        let accessor = after
            .find("}}")
            .and_then(|close| ruby_accessor(&after[..close]).map(|a| (a, close)));
        match accessor {
            Some((accessor, close)) => {
                out.push_str("#{");
                out.push_str(accessor);
                out.push('}');
                rest = &after[close + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    push_escaped(&mut out, rest);
    out.push('"');
    out
}

fn push_escaped(out: &mut String, s: &str) {
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '#' if chars.peek() == Some(&'{') => out.push_str("\\#"),
            c => out.push(c),
        }
    }
}
