//! CLI smoke tests for stevedore.
//!
//! These tests run the binary against small fixture apps and check output
//! and exit codes.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn stevedore_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("stevedore");
    cmd.env_remove("IMAGE").env_remove("RUST_LOG");
    cmd
}

/// Create a temp app directory from `(path, content)` pairs.
fn temp_app(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for (path, content) in files {
        let path = temp.path().join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    temp
}

const NOOP_APP: &str = r#"
id: helloapp
provider: noop
params:
  - name: greeting
    default: hello
graph:
  web:
    artifacts:
      noop:
        - artifacts/web.txt
"#;

const PROMPTING_APP: &str = r#"
provider: noop
graph:
  web:
    artifacts:
      noop:
        - artifacts/web.txt
"#;

const KUBE_APP: &str = r#"
id: kubeapp
graph:
  web:
    artifacts:
      kubernetes:
        - artifacts/pod.yaml
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
    stevedore_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
    stevedore_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stevedore"));
}

#[test]
fn subcommand_help_works() {
    for cmd in &["run", "check", "providers"] {
        stevedore_cmd()
            .arg(cmd)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Usage"));
    }
}

// =============================================================================
// Commands
// =============================================================================

#[test]
fn providers_lists_builtins() {
    stevedore_cmd()
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("kubernetes"))
        .stdout(predicate::str::contains("docker"))
        .stdout(predicate::str::contains("noop"));
}

#[test]
fn check_valid_app() {
    let app = temp_app(&[("Appfile", NOOP_APP), ("artifacts/web.txt", "$greeting")]);

    stevedore_cmd()
        .arg("check")
        .arg(app.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("helloapp"));
}

#[test]
fn check_missing_artifact_exits_2() {
    let app = temp_app(&[("Appfile", NOOP_APP)]);

    stevedore_cmd()
        .arg("check")
        .arg(app.path())
        .assert()
        .code(2);
}

#[test]
fn run_dry_run_renders_artifacts() {
    let app = temp_app(&[("Appfile", NOOP_APP), ("artifacts/web.txt", "say=$greeting")]);
    let work = TempDir::new().unwrap();
    let answers = work.path().join("answers.out.yaml");

    stevedore_cmd()
        .arg("run")
        .arg(app.path())
        .arg("--dry-run")
        .arg("--no-ask")
        .arg("--workdir")
        .arg(work.path())
        .arg("--answers-output")
        .arg(&answers)
        .assert()
        .success()
        .stdout(predicate::str::contains("Deployed helloapp"));

    let rendered = std::fs::read_to_string(work.path().join("web/artifacts/web.txt")).unwrap();
    assert_eq!(rendered, "say=hello");
    let written = std::fs::read_to_string(&answers).unwrap();
    assert!(written.contains("greeting: hello"));
}

#[test]
fn run_missing_value_without_asking_exits_3() {
    let app = temp_app(&[("Appfile", PROMPTING_APP), ("artifacts/web.txt", "port=${port}")]);
    let work = TempDir::new().unwrap();

    stevedore_cmd()
        .arg("run")
        .arg(app.path())
        .arg("--no-ask")
        .arg("--workdir")
        .arg(work.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("port"));
}

#[test]
fn run_without_appfile_exits_2() {
    let app = TempDir::new().unwrap();

    stevedore_cmd()
        .arg("run")
        .arg(app.path())
        .arg("--no-ask")
        .assert()
        .code(2);
}

#[test]
fn run_provider_failure_exits_1() {
    let app = temp_app(&[
        ("Appfile", KUBE_APP),
        ("artifacts/pod.yaml", "apiVersion: v1\nmetadata:\n  name: web\n"),
    ]);
    let work = TempDir::new().unwrap();

    stevedore_cmd()
        .arg("run")
        .arg(app.path())
        .arg("--dry-run")
        .arg("--no-ask")
        .arg("--workdir")
        .arg(work.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("kubernetes"));
}

#[test]
fn check_rejects_component_outside_workdir() {
    let app = temp_app(&[(
        "Appfile",
        "graph:\n  ../victim:\n    artifacts:\n      noop: [a.tmpl]\n",
    )]);

    stevedore_cmd()
        .arg("check")
        .arg(app.path())
        .assert()
        .code(2);
}
