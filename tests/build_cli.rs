// tests/build_cli.rs

//! End-to-end tests driving the apkgbuild binary.
//!
//! These run with `--no-isolation` so they work unprivileged; the
//! chrooted path is covered by the sandbox unit tests and requires root.

use apkgbuild::{PackageRoot, archive};
use std::fs;
use std::path::Path;
use std::process::Command;

const COMPLETE_SCRIPT: &str = r#"
shell = "/bin/sh"
build_dependencies = {}

name = "foo"
version = "1.0.0"
description = "d"
authors = {"a"}
maintainers = {"m"}
dependencies = { required = {}, optional = {} }
files = { ["/bin/foo"] = "foo" }
hooks = {}

function build()
    local ok, err = exec("printf hello > pkg/foo")
    assert(ok, err)
end
"#;

fn run_apkgbuild(script: &Path, output: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_apkgbuild"))
        .arg("--no-isolation")
        .arg(script)
        .arg(output)
        .output()
        .expect("failed to run apkgbuild")
}

#[test]
fn test_complete_script_builds_archive() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("build.lua");
    fs::write(&script, COMPLETE_SCRIPT).unwrap();
    let output = dir.path().join("foo.apkg");

    let result = run_apkgbuild(&script, &output);
    assert!(
        result.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert!(output.exists());

    let unpacked = tempfile::tempdir().unwrap();
    archive::unpack(&output, unpacked.path()).unwrap();

    let raw = fs::read_to_string(unpacked.path().join("package.toml")).unwrap();
    let manifest: PackageRoot = toml::from_str(&raw).unwrap();
    assert_eq!(manifest.spec, 1);
    assert_eq!(manifest.package.name, "foo");
    assert_eq!(manifest.package.version, "1.0.0");
    assert_eq!(
        manifest.files.get("/bin/foo").map(String::as_str),
        Some("foo")
    );
    // All four hook fields serialize as empty strings
    assert!(raw.contains("preinstall = \"\""));
    assert!(raw.contains("postinstall = \"\""));
    assert!(raw.contains("preremove = \"\""));
    assert!(raw.contains("postremove = \"\""));

    assert_eq!(
        fs::read_to_string(unpacked.path().join("foo")).unwrap(),
        "hello"
    );
}

#[test]
fn test_missing_required_field_reports_and_fails() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("build.lua");
    fs::write(
        &script,
        r#"
shell = "/bin/sh"
build_dependencies = {}
name = "foo"
description = "d"
authors = {}
maintainers = {}
dependencies = { required = {}, optional = {} }
files = {}
function build() end
"#,
    )
    .unwrap();
    let output = dir.path().join("foo.apkg");

    let result = run_apkgbuild(&script, &output);
    assert!(!result.status.success());

    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("Error: "), "stderr: {}", stderr);
    assert!(stderr.contains("version"), "stderr: {}", stderr);
    assert!(!output.exists());
}

#[test]
fn test_script_syntax_error_fails() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("build.lua");
    fs::write(&script, "this is not lua").unwrap();
    let output = dir.path().join("foo.apkg");

    let result = run_apkgbuild(&script, &output);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Error: "));
    assert!(!output.exists());
}

#[test]
fn test_independent_runs_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let script_a = dir.path().join("a.lua");
    let script_b = dir.path().join("b.lua");
    fs::write(&script_a, COMPLETE_SCRIPT).unwrap();
    fs::write(&script_b, COMPLETE_SCRIPT.replace("\"foo\"", "\"bar\"")).unwrap();

    let out_a = dir.path().join("a.apkg");
    let out_b = dir.path().join("b.apkg");

    let a = run_apkgbuild(&script_a, &out_a);
    let b = run_apkgbuild(&script_b, &out_b);
    assert!(a.status.success());
    assert!(b.status.success());
    assert!(out_a.exists());
    assert!(out_b.exists());
}
