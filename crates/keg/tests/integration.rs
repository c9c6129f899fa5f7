//! End-to-end CLI integration tests for the `keg` binary.
//!
//! Each test gets its own temporary keg home (via `KEG_HOME`) and exercises
//! the `keg` binary as a subprocess via `assert_cmd`. Installs use a
//! `file://` tarball built on the fly, so no network is needed.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use flate2::Compression;
use flate2::write::GzEncoder;
use predicates::prelude::*;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CONFIGURE: &str = "#!/bin/sh\necho \"PREFIX=$1\" > config.mk\n";
const HELLO: &str = "#!/bin/sh\necho \"hello from keg\"\n";

const INSTALL_STEPS: &[&str] = &[
    "sh configure.sh {{prefix}}",
    "mkdir -p {{bin}} && cp hello.sh {{bin}}/hello && chmod +x {{bin}}/hello && cp config.mk {{prefix}}/",
];
const PASSING_TEST: &[&str] = &["{{bin}}/hello | grep -q 'hello from keg'"];

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// A temporary keg home plus a working directory for formula files.
struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("home")).unwrap();
        std::fs::create_dir_all(dir.path().join("work")).unwrap();
        Self { dir }
    }

    fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    fn work(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    /// Build a `Command` targeting the cargo-built `keg` binary.
    fn keg(&self) -> Command {
        let mut cmd = Command::cargo_bin("keg").unwrap();
        cmd.env("KEG_HOME", self.home())
            .env("NO_COLOR", "1")
            .env_remove("KEG_ROOT")
            .current_dir(self.work());
        cmd
    }

    /// Writes `hello-1.0.tar.gz` with a configure script and the program.
    fn archive(&self) -> PathBuf {
        let archive = self.work().join("hello-1.0.tar.gz");
        let file = std::fs::File::create(&archive).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, body) in [
            ("hello-1.0/configure.sh", CONFIGURE),
            ("hello-1.0/hello.sh", HELLO),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, name, body.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        archive
    }

    /// Writes `hello.json` pinned to `sha256`.
    fn formula(&self, sha256: &str, deps: &[&str], test: &[&str]) -> PathBuf {
        self.named_formula("hello", sha256, deps, INSTALL_STEPS, test)
    }

    /// Writes `<name>.json` building from the shared archive.
    fn named_formula(
        &self,
        name: &str,
        sha256: &str,
        deps: &[&str],
        install: &[&str],
        test: &[&str],
    ) -> PathBuf {
        let mut archive = self.work().join("hello-1.0.tar.gz");
        if !archive.is_file() {
            archive = self.archive();
        }
        let url = url::Url::from_file_path(&archive).unwrap();
        let formula = serde_json::json!({
            "name": name,
            "desc": "Prints a greeting",
            "source": { "url": url.as_str(), "sha256": sha256 },
            "dependencies": deps,
            "install": install,
            "test": test,
        });
        let path = self.work().join(format!("{name}.json"));
        std::fs::write(&path, serde_json::to_string_pretty(&formula).unwrap()).unwrap();
        path
    }

    /// Writes a formula whose checksum matches the archive.
    fn good_formula(&self, test: &[&str]) -> PathBuf {
        let hex = self.archive_sha256();
        self.formula(&hex, &[], test)
    }

    /// Writes the archive and returns its sha256 as printed by `keg checksum`.
    fn archive_sha256(&self) -> String {
        let archive = self.archive();
        let out = self
            .keg()
            .args(["checksum", archive.to_str().unwrap()])
            .output()
            .unwrap();
        assert!(out.status.success());
        let line = String::from_utf8(out.stdout).unwrap();
        let hex = line
            .split_whitespace()
            .next()
            .unwrap()
            .trim_start_matches("sha256:")
            .to_string();
        hex
    }

    fn keg_dir(&self) -> PathBuf {
        self.home().join("Cellar/hello/1.0")
    }
}

// ---------------------------------------------------------------------------
// Formula commands
// ---------------------------------------------------------------------------

#[test]
fn version_prints() {
    let env = Env::new();
    env.keg()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("keg version "));
}

#[test]
fn validate_release_formulas() {
    let env = Env::new();
    env.keg()
        .arg("validate")
        .arg(fixture("mattext-0.6.rb"))
        .arg(fixture("mattext-0.8.rb"))
        .assert()
        .success()
        .stdout(predicate::str::contains("mattext 0.6"))
        .stdout(predicate::str::contains("mattext 0.8"));
}

#[test]
fn validate_reports_every_error() {
    let env = Env::new();
    env.keg()
        .arg("validate")
        .arg(fixture("broken.toml"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("invalid name 'Broken'"))
        .stdout(predicate::str::contains("unsupported url scheme 'ftp'"))
        .stdout(predicate::str::contains("install procedure is empty"))
        .stderr(predicate::str::contains("1 of 1 formula(s) failed validation"));
}

#[test]
fn validate_json_lists_errors_per_formula() {
    let env = Env::new();
    let out = env
        .keg()
        .args(["validate", "--json"])
        .arg(fixture("mattext-0.8.rb"))
        .arg(fixture("broken.toml"))
        .output()
        .unwrap();
    assert!(!out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let results = json.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["formula"], "mattext");
    assert_eq!(results[0]["version"], "0.8");
    assert!(results[0]["errors"].as_array().unwrap().is_empty());
    assert!(!results[1]["errors"].as_array().unwrap().is_empty());
}

#[test]
fn validate_finds_formula_by_name_in_formula_dir() {
    let env = Env::new();
    let formula_dir = env.home().join("Formula");
    std::fs::create_dir_all(&formula_dir).unwrap();
    std::fs::copy(fixture("mattext-0.8.rb"), formula_dir.join("mattext.rb")).unwrap();
    env.keg()
        .args(["validate", "mattext"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mattext 0.8"));
}

#[test]
fn show_json_resolves_version() {
    let env = Env::new();
    let out = env
        .keg()
        .args(["show", "--json"])
        .arg(fixture("mattext-0.8.rb"))
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["name"], "mattext");
    assert_eq!(json["version"], "0.8");
    assert_eq!(
        json["source"]["sha256"],
        "4998efdf224f8f8c7afe54e3dffe60f547bcc573b50b6d3415d52865ee519ab2"
    );
    assert_eq!(json["installed"], false);
}

#[test]
fn convert_ruby_to_toml_and_back_validates() {
    let env = Env::new();
    env.keg()
        .args(["convert", "--to", "toml"])
        .arg(fixture("mattext-0.6.rb"))
        .assert()
        .success()
        .stdout(predicate::str::contains("name = \"mattext\""))
        .stdout(predicate::str::contains(
            "sha1 = \"8b96dd4fa1cb06bc3e0b7aade6f8e3e20910dc7b\"",
        ))
        .stdout(predicate::str::contains("{{std_cmake_args}}"));

    let out = env.work().join("mattext.toml");
    env.keg()
        .args(["convert", "--to", "toml", "-o"])
        .arg(&out)
        .arg(fixture("mattext-0.6.rb"))
        .assert()
        .success();
    env.keg()
        .args(["validate", "mattext.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mattext 0.6"));
}

#[test]
fn checksum_of_file() {
    let env = Env::new();
    std::fs::write(env.work().join("greeting.txt"), "hello\n").unwrap();
    env.keg()
        .args(["checksum", "greeting.txt"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "sha256:5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03",
        ));
    env.keg()
        .args(["checksum", "greeting.txt", "--algorithm", "sha1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "sha1:f572d396fae9206628714fb2ce00f72e94f2258f",
        ));
}

#[test]
fn history_of_releases() {
    let env = Env::new();
    env.keg()
        .arg("history")
        .arg(fixture("mattext-0.8.rb"))
        .arg(fixture("mattext-0.6.rb"))
        .assert()
        .success()
        .stdout(predicate::str::contains("0.6 -> 0.8"))
        .stdout(predicate::str::contains("+libev"));
}

#[test]
fn history_rejects_reused_checksum() {
    let env = Env::new();
    let content = std::fs::read_to_string(fixture("mattext-0.6.rb")).unwrap();
    let copy = env.work().join("mattext-0.7.rb");
    std::fs::write(&copy, content.replace("v0.6", "v0.7")).unwrap();
    env.keg()
        .arg("history")
        .arg(fixture("mattext-0.6.rb"))
        .arg(&copy)
        .assert()
        .failure()
        .stdout(predicate::str::contains("share checksum"))
        .stderr(predicate::str::contains("release history has errors: mattext"));
}

// ---------------------------------------------------------------------------
// Install lifecycle
// ---------------------------------------------------------------------------

#[test]
fn install_test_list_uninstall() {
    let env = Env::new();
    let formula = env.good_formula(PASSING_TEST);

    env.keg()
        .arg("install")
        .arg(&formula)
        .assert()
        .success()
        .stdout(predicate::str::contains("==> Fetching hello 1.0"))
        .stdout(predicate::str::contains("==> Installing hello 1.0"))
        .stdout(predicate::str::contains("Test passed"))
        .stdout(predicate::str::contains("hello 1.0 installed to"));

    let keg = env.keg_dir();
    assert!(keg.join("INSTALL_RECEIPT.json").is_file());
    assert!(keg.join("bin/hello").is_file());
    let config = std::fs::read_to_string(keg.join("config.mk")).unwrap();
    assert_eq!(config.trim(), format!("PREFIX={}", keg.display()));
    // The build directory is removed by default
    assert!(!env.home().join("build/hello-1.0").exists());

    let out = env.keg().args(["list", "--json"]).output().unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json[0]["name"], "hello");
    assert_eq!(json[0]["version"], "1.0");
    assert_eq!(json[0]["prefix"], keg.display().to_string());

    env.keg()
        .arg("test")
        .arg(&formula)
        .assert()
        .success();

    env.keg()
        .arg("install")
        .arg(&formula)
        .assert()
        .failure()
        .stderr(predicate::str::contains("hello 1.0 is already installed"));

    env.keg()
        .args(["uninstall", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Uninstalled hello 1.0"));
    assert!(!keg.exists());

    env.keg()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No kegs installed."));
}

#[test]
fn test_runs_installed_program_by_name() {
    let env = Env::new();
    let formula = env.good_formula(&["hello {{formula_path}} | grep -q 'hello from keg'"]);

    env.keg()
        .arg("install")
        .arg(&formula)
        .assert()
        .success()
        .stdout(predicate::str::contains("Test passed"));

    let out = env
        .keg()
        .args(["test", "--json"])
        .arg(&formula)
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json, serde_json::json!({ "status": "passed", "steps": 1 }));
}

#[test]
fn installed_runtime_dependency_is_on_path() {
    let env = Env::new();
    let sha256 = env.archive_sha256();
    let hello = env.formula(&sha256, &[], PASSING_TEST);
    env.keg().arg("install").arg(&hello).assert().success();

    // greeter builds and tests with the hello keg's program
    let greeter = env.named_formula(
        "greeter",
        &sha256,
        &["hello"],
        &["mkdir -p {{prefix}}/share && hello > {{prefix}}/share/greeting"],
        &["test \"$(hello)\" = \"$(cat {{prefix}}/share/greeting)\""],
    );
    env.keg()
        .arg("install")
        .arg(&greeter)
        .assert()
        .success()
        .stdout(predicate::str::contains("Test passed"));

    let greeting = env.home().join("Cellar/greeter/1.0/share/greeting");
    assert_eq!(std::fs::read_to_string(greeting).unwrap(), "hello from keg\n");

    let out = env.keg().args(["list", "--json"]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json[0]["name"], "greeter");
    assert_eq!(json[0]["runtime_dependencies"][0], "hello");
}

#[test]
fn install_into_root_override() {
    let env = Env::new();
    let formula = env.good_formula(&[]);
    let root = env.dir.path().join("opt");
    env.keg()
        .arg("--root")
        .arg(&root)
        .args(["install", "--quiet"])
        .arg(&formula)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    assert!(root.join("Cellar/hello/1.0/bin/hello").is_file());
    assert!(!env.keg_dir().exists());
}

#[test]
fn checksum_mismatch_aborts_before_build() {
    let env = Env::new();
    let formula = env.formula(&"0".repeat(64), &[], PASSING_TEST);
    env.keg()
        .arg("install")
        .arg(&formula)
        .assert()
        .failure()
        .stderr(predicate::str::contains("checksum mismatch"));
    assert!(!env.keg_dir().exists());
    assert!(!env.home().join("build/hello-1.0").exists());
}

#[test]
fn missing_dependency_aborts_before_build() {
    let env = Env::new();
    let formula = env.good_formula(&[]);
    // Rewrite with a dependency that nothing provides
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&formula).unwrap()).unwrap();
    json["dependencies"] = serde_json::json!(["keg-no-such-tool", "sh"]);
    std::fs::write(&formula, json.to_string()).unwrap();

    env.keg()
        .arg("install")
        .arg(&formula)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "missing dependencies for hello: keg-no-such-tool",
        ));
    assert!(!env.keg_dir().exists());
}

#[test]
fn failing_test_is_a_warning() {
    let env = Env::new();
    let formula = env.good_formula(&["exit 3"]);
    env.keg()
        .arg("install")
        .arg(&formula)
        .assert()
        .success()
        .stderr(predicate::str::contains("Test failed (exit 3)"));
    assert!(env.keg_dir().join("INSTALL_RECEIPT.json").is_file());

    env.keg()
        .arg("test")
        .arg(&formula)
        .assert()
        .failure()
        .stderr(predicate::str::contains("test failed for hello 1.0"));
}

#[test]
fn dry_run_expands_commands_without_running() {
    let env = Env::new();
    let formula = env.good_formula(PASSING_TEST);
    let out = env
        .keg()
        .args(["install", "--dry-run", "--json"])
        .arg(&formula)
        .output()
        .unwrap();
    assert!(out.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let keg = env.keg_dir().display().to_string();
    assert_eq!(plan["prefix"], keg);
    assert_eq!(plan["build"][0], format!("sh configure.sh {keg}"));
    assert!(plan["install"][0].as_str().unwrap().contains(&format!("{keg}/bin")));
    assert!(!env.home().join("Cellar").exists());
}

#[test]
fn fetch_reuses_verified_download() {
    let env = Env::new();
    let formula = env.good_formula(&[]);
    let cached = env.home().join("cache/hello--1.0--hello-1.0.tar.gz");

    env.keg()
        .arg("fetch")
        .arg(&formula)
        .assert()
        .success()
        .stdout(predicate::str::contains(cached.display().to_string()));
    assert!(cached.is_file());

    env.keg()
        .arg("fetch")
        .arg(&formula)
        .assert()
        .success()
        .stdout(predicate::str::contains("(cached)"));
}

// ---------------------------------------------------------------------------
// Setup and errors
// ---------------------------------------------------------------------------

#[test]
fn config_reads_yaml_and_env() {
    let env = Env::new();
    std::fs::write(env.home().join("config.yaml"), "jobs: 3\nrun_tests: false\n").unwrap();

    env.keg()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            env.home().join("config.yaml").display().to_string(),
        ));

    let out = env
        .keg()
        .env("KEG_HTTP__TIMEOUT_SECS", "30")
        .args(["config", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["config"]["jobs"], 3);
    assert_eq!(json["config"]["run_tests"], false);
    assert_eq!(json["config"]["http"]["timeout_secs"], 30);
    assert_eq!(json["root"], env.home().display().to_string());
}

#[test]
fn config_init_writes_defaults_once() {
    let env = Env::new();
    let home = env.dir.path().join("fresh");
    let config = home.join("config.yaml");

    env.keg()
        .env("KEG_HOME", &home)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains(config.display().to_string()));
    let written = std::fs::read_to_string(&config).unwrap();
    assert!(written.contains("run_tests: true"), "{written}");

    env.keg()
        .env("KEG_HOME", &home)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    std::fs::write(&config, "jobs: 0\n").unwrap();
    env.keg()
        .env("KEG_HOME", &home)
        .args(["config", "init", "--force"])
        .assert()
        .success();
    env.keg()
        .env("KEG_HOME", &home)
        .args(["config", "--json"])
        .assert()
        .success();
}

#[test]
fn invalid_config_is_an_error() {
    let env = Env::new();
    std::fs::write(env.home().join("config.yaml"), "jobs: 0\n").unwrap();
    env.keg()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("jobs"));
}

#[test]
fn json_errors_go_to_stderr() {
    let env = Env::new();
    let out = env
        .keg()
        .args(["show", "no-such-formula", "--json"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    let json: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("formula 'no-such-formula' not found")
    );
}

#[test]
fn uninstall_unknown_fails() {
    let env = Env::new();
    env.keg()
        .args(["uninstall", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hello is not installed"));
}

#[test]
fn completion_generates_script() {
    let env = Env::new();
    env.keg()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keg"));
}
