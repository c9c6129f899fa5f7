//! The Homebrew Ruby formula DSL, restricted to what source formulas use.
//!
//! Supported:
//!
//! ```ruby
//! require 'formula'
//!
//! class Mattext < Formula
//!   desc "..."
//!   homepage 'https://github.com/dhurum/mattext'
//!   url 'https://github.com/dhurum/mattext/archive/v0.6.tar.gz'
//!   sha1 '8b96dd4fa1cb06bc3e0b7aade6f8e3e20910dc7b'
//!   depends_on 'cmake' => :build
//!   depends_on 'argp-standalone'
//!
//!   def install
//!     system "cmake", "./", *std_cmake_args
//!     system "make install"
//!   end
//!
//!   test do
//!     system "#{bin}/mattext", "#{path}"
//!   end
//! end
//! ```
//!
//! Other class-level directives (`license`, `bottle do ... end`, ...) are
//! skipped. Inside `install` and `test` only `system` calls are accepted.
//!
//! Two forms go beyond what Homebrew writes. A `def build` method holds the
//! build steps, which run before `install`. The `system ["make", "make"]`
//! array form runs a single program without a shell, as in Ruby.
//!
//! Class names map to formula names by CamelCase on `-`, with `_` escapes
//! for the other punctuation: `__` is `_`, `_x` is `+`, `_d` is `.` and `_h`
//! is a `-` that cannot be written as a capital. A name starting with a
//! digit gets an `N_` prefix (`7zip` is `N_7zip`).

use keg_core::formula::{Dependency, DependencyStage, Formula, Source, Step};

use crate::error::FormulaError;
use crate::template::STD_CMAKE_ARGS;

/// Ruby accessors that map onto template variables.
const RUBY_VARS: &[(&str, &str)] = &[
    ("prefix", "prefix"),
    ("bin", "bin"),
    ("lib", "lib"),
    ("include", "include"),
    ("share", "share"),
    ("name", "name"),
    ("version", "version"),
    ("path", "formula_path"),
];

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Lit(String),
    Interp(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Const(String),
    Str(Vec<Part>),
    Sym(String),
    Arrow,
    Comma,
    Star,
    Lt,
    LBracket,
    RBracket,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Context {
    TopLevel,
    Class,
    Build,
    Install,
    Test,
    Skip(usize),
    Done,
}

/// Parses a Ruby formula.
pub fn parse_ruby(content: &str) -> Result<Formula, FormulaError> {
    let mut formula = Formula {
        name: String::new(),
        version: None,
        homepage: String::new(),
        desc: String::new(),
        source: Source {
            url: String::new(),
            sha256: None,
            sha1: None,
        },
        dependencies: Vec::new(),
        build: Vec::new(),
        install: Vec::new(),
        test: Vec::new(),
        origin: String::new(),
    };
    let mut ctx = Context::TopLevel;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let err = |message: String| FormulaError::Syntax {
            line: line_no,
            message,
        };

        ctx = match ctx {
            Context::TopLevel => {
                if line.starts_with("require ") {
                    Context::TopLevel
                } else {
                    formula.name = parse_class_header(line).map_err(err)?;
                    Context::Class
                }
            }
            Context::Class => class_line(line, &mut formula).map_err(err)?,
            Context::Build | Context::Install | Context::Test => {
                if line == "end" {
                    Context::Class
                } else {
                    let step = parse_system(line).map_err(err)?;
                    match ctx {
                        Context::Build => formula.build.push(step),
                        Context::Install => formula.install.push(step),
                        _ => formula.test.push(step),
                    }
                    ctx
                }
            }
            Context::Skip(depth) => {
                if is_block_end(line) {
                    if depth == 1 { Context::Class } else { Context::Skip(depth - 1) }
                } else if opens_block(line) {
                    Context::Skip(depth + 1)
                } else {
                    ctx
                }
            }
            Context::Done => {
                return Err(err(format!("unexpected content after class end: {line}")));
            }
        };
    }

    match ctx {
        Context::Done => Ok(formula),
        Context::TopLevel => Err(FormulaError::Parse("no formula class found".into())),
        _ => Err(FormulaError::Parse("unexpected end of file: missing 'end'".into())),
    }
}

/// Handles one line at class level and returns the next context.
fn class_line(line: &str, formula: &mut Formula) -> Result<Context, String> {
    if line == "end" {
        return Ok(Context::Done);
    }
    let keyword = line
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or(line);

    match keyword {
        "desc" => formula.desc = single_string(line, keyword)?,
        "homepage" => formula.homepage = single_string(line, keyword)?,
        "url" => formula.source.url = first_string(line, keyword)?,
        "version" => formula.version = Some(single_string(line, keyword)?),
        "sha1" => formula.source.sha1 = Some(single_string(line, keyword)?),
        "sha256" => formula.source.sha256 = Some(single_string(line, keyword)?),
        "depends_on" => {
            if let Some(dep) = parse_depends_on(line)? {
                formula.dependencies.push(dep);
            }
        }
        "def" if line == "def build" => return Ok(Context::Build),
        "def" if line == "def install" => return Ok(Context::Install),
        "test" if line == "test do" => return Ok(Context::Test),
        _ => {
            if opens_block(line) {
                tracing::debug!(line, "skipping formula block");
                return Ok(Context::Skip(1));
            }
            tracing::debug!(line, "skipping formula directive");
        }
    }
    Ok(Context::Class)
}

fn parse_class_header(line: &str) -> Result<String, String> {
    let toks = tokenize(line)?;
    match toks.as_slice() {
        [Tok::Ident(kw), Tok::Const(class), Tok::Lt, Tok::Const(base)]
            if kw == "class" && base == "Formula" =>
        {
            Ok(name_from_class(class))
        }
        _ => Err(format!("expected 'class Name < Formula', got: {line}")),
    }
}

/// `keyword "value"` (optionally parenthesized), no interpolation.
fn single_string(line: &str, keyword: &str) -> Result<String, String> {
    let args = call_args(line, keyword)?;
    match args.as_slice() {
        [arg] => literal(arg, keyword),
        _ => Err(format!("{keyword} takes exactly one string")),
    }
}

/// Like [`single_string`], but ignores trailing options (`url "..", using: :git`).
fn first_string(line: &str, keyword: &str) -> Result<String, String> {
    let args = call_args(line, keyword)?;
    match args.first() {
        Some(arg) => literal(arg, keyword),
        None => Err(format!("{keyword} needs a string")),
    }
}

fn literal(arg: &[Tok], keyword: &str) -> Result<String, String> {
    match arg {
        [Tok::Str(parts)] => parts
            .iter()
            .map(|p| match p {
                Part::Lit(s) => Ok(s.as_str()),
                Part::Interp(expr) => Err(format!(
                    "interpolation '#{{{expr}}}' is not supported in {keyword}"
                )),
            })
            .collect(),
        _ => Err(format!("{keyword} expects a string literal")),
    }
}

fn parse_depends_on(line: &str) -> Result<Option<Dependency>, String> {
    let toks = tokenize(line)?;
    let rest = &toks[1..];
    let (name, rest) = match rest {
        [Tok::Str(parts), rest @ ..] => (literal(&[Tok::Str(parts.clone())], "depends_on")?, rest),
        // `depends_on :xcode`, `depends_on macos: ...` are system requirements.
        _ => {
            tracing::debug!(line, "skipping system requirement");
            return Ok(None);
        }
    };

    let symbols: Vec<&str> = match rest {
        [] => vec![],
        [Tok::Arrow, Tok::Sym(s)] => vec![s.as_str()],
        [Tok::Arrow, Tok::LBracket, inner @ .., Tok::RBracket] => inner
            .iter()
            .filter(|t| **t != Tok::Comma)
            .map(|t| match t {
                Tok::Sym(s) => Ok(s.as_str()),
                other => Err(format!("unexpected {other:?} in depends_on options")),
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(format!("unsupported depends_on form: {line}")),
    };

    let mut stage = DependencyStage::Runtime;
    for sym in symbols {
        let s = match sym {
            "build" => DependencyStage::Build,
            "test" => DependencyStage::Test,
            "optional" | "recommended" => DependencyStage::Optional,
            "run" => DependencyStage::Runtime,
            other => return Err(format!("unknown dependency option :{other}")),
        };
        // :build wins over :test when both are given.
        if stage == DependencyStage::Runtime || s == DependencyStage::Build {
            stage = s;
        }
    }
    Ok(Some(Dependency::new(name, stage)))
}

fn parse_system(line: &str) -> Result<Step, String> {
    let args = call_args(line, "system")
        .map_err(|_| format!("only 'system' calls are supported here, got: {line}"))?;
    if args.is_empty() {
        return Err("system needs a command".into());
    }

    let mut argv = Vec::with_capacity(args.len());
    // A single string goes through the shell unless something forces exec.
    let mut direct = false;
    for (i, arg) in args.iter().enumerate() {
        match arg.as_slice() {
            [Tok::Str(parts)] => argv.push(template_string(parts)?),
            // `system ["prog", "argv0"], ...` never uses the shell.
            [Tok::LBracket, Tok::Str(program), Tok::Comma, Tok::Str(_), Tok::RBracket]
                if i == 0 =>
            {
                direct = true;
                argv.push(template_string(program)?);
            }
            [Tok::Star, Tok::Ident(id)] if id == "std_cmake_args" => {
                direct = true;
                argv.push(STD_CMAKE_ARGS.to_string());
            }
            [Tok::Ident(id)] => match ruby_var(id) {
                Some(var) => argv.push(format!("{{{{{var}}}}}")),
                None => return Err(format!("unknown value '{id}' in system call")),
            },
            other => return Err(format!("unsupported system argument: {other:?}")),
        }
    }

    if argv.len() == 1 && !direct {
        Ok(Step::Shell(argv.remove(0)))
    } else {
        Ok(Step::Exec(argv))
    }
}

fn template_string(parts: &[Part]) -> Result<String, String> {
    let mut out = String::new();
    for part in parts {
        match part {
            Part::Lit(s) => out.push_str(s),
            Part::Interp(expr) => match ruby_var(expr) {
                Some(var) => {
                    out.push_str("{{");
                    out.push_str(var);
                    out.push_str("}}");
                }
                None => return Err(format!("unsupported interpolation '#{{{expr}}}'")),
            },
        }
    }
    Ok(out)
}

fn ruby_var(id: &str) -> Option<&'static str> {
    RUBY_VARS
        .iter()
        .find(|(ruby, _)| *ruby == id)
        .map(|(_, var)| *var)
}

/// Tokenizes `keyword args...` / `keyword(args...)` and splits the arguments
/// on top-level commas.
fn call_args(line: &str, keyword: &str) -> Result<Vec<Vec<Tok>>, String> {
    let toks = tokenize(line)?;
    let mut rest = match toks.split_first() {
        Some((Tok::Ident(kw), rest)) if kw == keyword => rest,
        _ => return Err(format!("expected '{keyword}'")),
    };
    if let [Tok::LParen, inner @ .., Tok::RParen] = rest {
        rest = inner;
    }

    let mut args = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;
    for tok in rest {
        match tok {
            Tok::Comma if depth == 0 => args.push(std::mem::take(&mut current)),
            Tok::LBracket | Tok::LParen => {
                depth += 1;
                current.push(tok.clone());
            }
            Tok::RBracket | Tok::RParen => {
                depth = depth.saturating_sub(1);
                current.push(tok.clone());
            }
            _ => current.push(tok.clone()),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    Ok(args)
}

fn tokenize(line: &str) -> Result<Vec<Tok>, String> {
    let mut toks = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '#' => break,
            '\'' => {
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(e @ ('\\' | '\'')) => s.push(e),
                            Some(e) => {
                                s.push('\\');
                                s.push(e);
                            }
                            None => return Err("unterminated string".into()),
                        },
                        Some('\'') => break,
                        Some(ch) => s.push(ch),
                        None => return Err("unterminated string".into()),
                    }
                }
                toks.push(Tok::Str(vec![Part::Lit(s)]));
            }
            '"' => {
                let mut parts = Vec::new();
                let mut lit = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some('n') => lit.push('\n'),
                            Some('t') => lit.push('\t'),
                            Some(e) => lit.push(e),
                            None => return Err("unterminated string".into()),
                        },
                        Some('#') if chars.peek() == Some(&'{') => {
                            chars.next();
                            let mut expr = String::new();
                            loop {
                                match chars.next() {
                                    Some('}') => break,
                                    Some(ch) => expr.push(ch),
                                    None => return Err("unterminated interpolation".into()),
                                }
                            }
                            if !lit.is_empty() {
                                parts.push(Part::Lit(std::mem::take(&mut lit)));
                            }
                            parts.push(Part::Interp(expr.trim().to_string()));
                        }
                        Some('"') => break,
                        Some(ch) => lit.push(ch),
                        None => return Err("unterminated string".into()),
                    }
                }
                if !lit.is_empty() || parts.is_empty() {
                    parts.push(Part::Lit(lit));
                }
                toks.push(Tok::Str(parts));
            }
            ':' => {
                let mut sym = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        sym.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if sym.is_empty() {
                    return Err("unexpected ':'".into());
                }
                toks.push(Tok::Sym(sym));
            }
            '=' if chars.peek() == Some(&'>') => {
                chars.next();
                toks.push(Tok::Arrow);
            }
            ',' => toks.push(Tok::Comma),
            '*' => toks.push(Tok::Star),
            '<' => toks.push(Tok::Lt),
            '[' => toks.push(Tok::LBracket),
            ']' => toks.push(Tok::RBracket),
            '(' => toks.push(Tok::LParen),
            ')' => toks.push(Tok::RParen),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '?' | '!') {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // `key: value` keyword arguments become symbol + arrow.
                if chars.peek() == Some(&':') {
                    chars.next();
                    toks.push(Tok::Sym(ident));
                    toks.push(Tok::Arrow);
                } else if c.is_ascii_uppercase() {
                    toks.push(Tok::Const(ident));
                } else {
                    toks.push(Tok::Ident(ident));
                }
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(toks)
}

fn opens_block(line: &str) -> bool {
    let first = line.split_whitespace().next().unwrap_or("");
    line.ends_with(" do")
        || line.contains(" do |")
        || matches!(first, "def" | "if" | "unless" | "case" | "begin" | "while" | "class" | "module")
}

fn is_block_end(line: &str) -> bool {
    line == "end" || line.starts_with("end ") || line.starts_with("end.")
}

/// `ArgpStandalone` -> `argp-standalone`, `Python3_d12` -> `python3.12`.
pub fn name_from_class(class: &str) -> String {
    let rest = match class.strip_prefix("N_") {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => class,
    };
    let mut name = String::with_capacity(rest.len() + 4);
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '_' => match chars.peek().copied() {
                Some(e @ ('_' | 'x' | 'd' | 'h')) => {
                    chars.next();
                    name.push(match e {
                        'x' => '+',
                        'd' => '.',
                        'h' => '-',
                        _ => '_',
                    });
                }
                _ => name.push('_'),
            },
            c if c.is_ascii_uppercase() => {
                if !name.is_empty() {
                    name.push('-');
                }
                name.push(c.to_ascii_lowercase());
            }
            c => name.push(c),
        }
    }
    name
}

/// `argp-standalone` -> `ArgpStandalone`, `gtk+3` -> `Gtk_x3`. Inverse of
/// [`name_from_class`] for every valid formula name.
pub fn class_from_name(name: &str) -> String {
    let mut class = String::with_capacity(name.len() + 4);
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        class.push_str("N_");
    }
    let mut chars = name.chars().peekable();
    let mut capital = true;
    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek().is_some_and(char::is_ascii_lowercase) => capital = true,
            '-' => class.push_str("_h"),
            '+' => class.push_str("_x"),
            '.' => class.push_str("_d"),
            '_' => class.push_str("__"),
            c if capital => {
                class.push(c.to_ascii_uppercase());
                capital = false;
            }
            c => class.push(c),
        }
    }
    class
}

/// Maps a template variable back to its Ruby accessor.
pub(crate) fn ruby_accessor(var: &str) -> Option<&'static str> {
    RUBY_VARS
        .iter()
        .find(|(_, v)| *v == var)
        .map(|(ruby, _)| *ruby)
}
