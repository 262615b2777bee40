#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn pyt(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pyt").unwrap();
    cmd.current_dir(dir.path())
        .env("PYT_ROOT", dir.path())
        .env_remove("PYT_TEMPLATE_REPO")
        .env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap()
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn hook_input(tool: &str, command: &str) -> String {
    serde_json::json!({"tool_name": tool, "tool_input": {"command": command}}).to_string()
}

const TEMPLATE_PYPROJECT: &str = r#"[project]
name = "package-name"
description = "A short description of your package"
authors = [{ name = "Your Name", email = "your.email@example.com" }]

[project.urls]
Repository = "https://github.com/username/package_name"
"#;

fn template_project(dir: &TempDir) {
    let root = dir.path();
    write(root, "pyproject.toml", TEMPLATE_PYPROJECT);
    write(
        root,
        "README.md",
        "# Package Name\n\npip install package-name\n\nhttps://github.com/username/package_name\n",
    );
    write(root, "src/package_name/__init__.py", "\"\"\"Package Name.\"\"\"\n");
    write(root, "tests/test_basic.py", "from package_name import core\nimport package_name\n");
    write(root, "tests/pyproject_template/test_tool.py", "def test_tool():\n    pass\n");
}

// ---------------------------------------------------------------------------
// pyt hook
// ---------------------------------------------------------------------------

#[test]
fn hook_allows_safe_command() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .arg("hook")
        .write_stdin(hook_input("Bash", "ls -la && git status"))
        .assert()
        .code(0);
}

#[test]
fn hook_blocks_force_push_to_main() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .arg("hook")
        .write_stdin(hook_input("Bash", "git push --force origin main"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("BLOCKED"))
        .stderr(predicate::str::contains("protected branch 'main'"));
}

#[test]
fn hook_blocks_dangerous_flag() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .arg("hook")
        .write_stdin(hook_input("Bash", "git commit -m wip --no-verify"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Skips pre-commit"));
}

#[test]
fn hook_blocks_workflow_command() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .arg("hook")
        .write_stdin(hook_input("Bash", "gh pr create --fill"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("doit pr"));
}

#[test]
fn hook_ignores_non_shell_tools() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .arg("hook")
        .write_stdin(hook_input("Read", "git push --force origin main"))
        .assert()
        .code(0);
}

#[test]
fn hook_rejects_invalid_json() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .arg("hook")
        .write_stdin("not json")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid JSON"));
}

// ---------------------------------------------------------------------------
// pyt sync
// ---------------------------------------------------------------------------

#[test]
fn sync_show_before_any_sync() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .args(["sync", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Never synced"));
}

#[test]
fn sync_mark_then_show() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .args(["sync", "mark", "abc1234", "--date", "2025-01-15"])
        .assert()
        .success();

    let settings = read(dir.path(), ".config/pyproject_template/settings.toml");
    assert!(settings.contains("abc1234"));
    assert!(settings.contains("2025-01-15"));

    pyt(&dir)
        .args(["sync", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("abc1234"));
}

#[test]
fn sync_mark_json_output() {
    let dir = TempDir::new().unwrap();
    let output = pyt(&dir)
        .args(["--json", "sync", "mark", "deadbeef", "--date", "2025-03-01"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let v = stdout_json(&output);
    assert_eq!(v["commit"], "deadbeef");
    assert_eq!(v["commit_date"], "2025-03-01");
}

#[test]
fn sync_mark_rejects_bad_date() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .args(["sync", "mark", "abc1234", "--date", "2025-13-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid date"));
    assert!(!dir
        .path()
        .join(".config/pyproject_template/settings.toml")
        .exists());
}

#[test]
fn sync_mark_rejects_non_sha() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .args(["sync", "mark", "not-a-sha"])
        .assert()
        .failure();
}

#[test]
fn sync_mark_keeps_project_settings() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        ".config/pyproject_template/settings.toml",
        "[project]\nname = \"Kept\"\nextra_key = \"survives\"\n\n[other]\nflag = true\n",
    );
    pyt(&dir)
        .args(["sync", "mark", "abc1234", "--date", "2025-01-15"])
        .assert()
        .success();
    let settings = read(dir.path(), ".config/pyproject_template/settings.toml");
    assert!(settings.contains("name = \"Kept\""));
    assert!(settings.contains("extra_key = \"survives\""));
    assert!(settings.contains("[other]"));
    assert!(settings.contains("abc1234"));
}

// ---------------------------------------------------------------------------
// pyt check
// ---------------------------------------------------------------------------

fn diverged_pair() -> (TempDir, TempDir) {
    let project = TempDir::new().unwrap();
    let template = TempDir::new().unwrap();
    write(project.path(), "README.md", "same\n");
    write(template.path(), "README.md", "same\r\n");
    write(project.path(), "pyproject.toml", "[project]\nname = \"mine\"\n");
    write(template.path(), "pyproject.toml", "[project]\nname = \"package-name\"\n");
    write(template.path(), "docs/new.md", "new\n");
    write(project.path(), "notes.txt", "local\n");
    write(project.path(), "CHANGELOG.md", "mine\n");
    write(template.path(), "CHANGELOG.md", "theirs\n");
    write(project.path(), "__pycache__/x.pyc", "junk");
    (project, template)
}

#[test]
fn check_against_local_template() {
    let (project, template) = diverged_pair();
    let output = pyt(&project)
        .args(["--json", "check", "--offline", "--template"])
        .arg(template.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let v = stdout_json(&output);
    assert_eq!(v["modified"], serde_json::json!(["CHANGELOG.md", "pyproject.toml"]));
    assert_eq!(v["missing"], serde_json::json!(["docs/new.md"]));
    assert_eq!(v["extra"], serde_json::json!(["notes.txt"]));
    assert_eq!(v["last_sync"], serde_json::Value::Null);
}

#[test]
fn check_skip_changelog() {
    let (project, template) = diverged_pair();
    let output = pyt(&project)
        .args(["--json", "check", "--offline", "--skip-changelog", "--template"])
        .arg(template.path())
        .output()
        .unwrap();
    let v = stdout_json(&output);
    assert_eq!(v["modified"], serde_json::json!(["pyproject.toml"]));
}

#[test]
fn check_human_output_lists_changes() {
    let (project, template) = diverged_pair();
    pyt(&project)
        .args(["check", "--offline", "--template"])
        .arg(template.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("missing"))
        .stdout(predicate::str::contains("docs/new.md"))
        .stdout(predicate::str::contains("2 modified, 1 missing, 1 extra."));
}

#[test]
fn check_identical_trees_are_clean() {
    let project = TempDir::new().unwrap();
    let template = TempDir::new().unwrap();
    write(project.path(), "README.md", "hello\n");
    write(template.path(), "README.md", "hello\n");
    pyt(&project)
        .args(["check", "--offline", "--template"])
        .arg(template.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Project matches the template."));
}

#[test]
fn check_missing_template_dir_fails() {
    let project = TempDir::new().unwrap();
    pyt(&project)
        .args(["check", "--offline", "--template"])
        .arg(project.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

fn write_tar_gz(path: &Path, files: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(enc);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

#[test]
fn check_from_local_archive() {
    let project = TempDir::new().unwrap();
    let archives = TempDir::new().unwrap();
    write(project.path(), "README.md", "hello\n");
    let archive = archives.path().join("template.tar.gz");
    write_tar_gz(
        &archive,
        &[
            ("pyproject-template-main/README.md", "hello\n"),
            ("pyproject-template-main/dodo.py", "# tasks\n"),
        ],
    );

    let output = pyt(&project)
        .args(["--json", "check", "--offline", "--archive-url"])
        .arg(&archive)
        .output()
        .unwrap();
    assert!(output.status.success());
    let v = stdout_json(&output);
    assert_eq!(v["missing"], serde_json::json!(["dodo.py"]));
    assert_eq!(v["modified"], serde_json::json!([]));

    // The download directory is removed afterwards.
    let leftovers: Vec<_> = std::fs::read_dir(project.path().join("tmp"))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn check_mark_reviewed_needs_network() {
    let (project, template) = diverged_pair();
    pyt(&project)
        .args(["check", "--offline", "--mark-reviewed", "--template"])
        .arg(template.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--mark-reviewed"));
}

// ---------------------------------------------------------------------------
// pyt configure
// ---------------------------------------------------------------------------

fn configure_args() -> [&'static str; 10] {
    [
        "configure",
        "--project-name",
        "Widget Tools",
        "--author-name",
        "Ada Lovelace",
        "--author-email",
        "ada@example.com",
        "--github-user",
        "ada",
        "--skip-missing",
    ]
}

#[test]
fn configure_replaces_placeholders() {
    let dir = TempDir::new().unwrap();
    template_project(&dir);
    pyt(&dir).args(configure_args()).assert().success();

    let root = dir.path();
    let pyproject = read(root, "pyproject.toml");
    assert!(pyproject.contains("name = \"widget-tools\""));
    assert!(pyproject.contains("Ada Lovelace"));
    assert!(pyproject.contains("ada@example.com"));
    assert!(pyproject.contains("https://github.com/ada/widget-tools"));

    let readme = read(root, "README.md");
    assert!(readme.contains("# Widget Tools"));
    assert!(readme.contains("pip install widget-tools"));

    assert!(root.join("src/widget_tools/__init__.py").is_file());
    assert!(!root.join("src/package_name").exists());
    assert!(!root.join("tests/pyproject_template").exists());

    let test_src = read(root, "tests/test_basic.py");
    assert!(test_src.contains("from widget_tools import core"));
    assert!(test_src.contains("import widget_tools"));

    let settings = read(root, ".config/pyproject_template/settings.toml");
    assert!(settings.contains("Widget Tools"));
    assert!(settings.contains("widget_tools"));
}

#[test]
fn configure_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    template_project(&dir);
    let output = pyt(&dir)
        .arg("--json")
        .args(configure_args())
        .arg("--dry-run")
        .output()
        .unwrap();
    assert!(output.status.success());
    let v = stdout_json(&output);
    assert_eq!(v["dry_run"], true);
    assert!(v["updated"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "README.md"));

    assert_eq!(read(dir.path(), "pyproject.toml"), TEMPLATE_PYPROJECT);
    assert!(dir.path().join("src/package_name").is_dir());
    assert!(!dir
        .path()
        .join(".config/pyproject_template/settings.toml")
        .exists());
}

#[test]
fn configure_missing_target_aborts_without_skip_flag() {
    let dir = TempDir::new().unwrap();
    template_project(&dir);
    let args: Vec<&str> = configure_args()
        .into_iter()
        .filter(|a| *a != "--skip-missing")
        .collect();
    pyt(&dir)
        .args(args)
        .assert()
        .failure()
        .stderr(predicate::str::contains("target not found"));
    assert_eq!(read(dir.path(), "pyproject.toml"), TEMPLATE_PYPROJECT);
}

#[test]
fn configure_refuses_configured_project_without_yes() {
    let dir = TempDir::new().unwrap();
    template_project(&dir);
    pyt(&dir).args(configure_args()).assert().success();

    pyt(&dir)
        .args(configure_args())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already configured"));
    pyt(&dir).args(configure_args()).arg("--yes").assert().success();
}

#[test]
fn configure_rejects_bad_email() {
    let dir = TempDir::new().unwrap();
    template_project(&dir);
    pyt(&dir)
        .args([
            "configure",
            "--project-name",
            "Widget",
            "--author-name",
            "Ada",
            "--author-email",
            "not-an-email",
            "--github-user",
            "ada",
            "--skip-missing",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid email"));
}

// ---------------------------------------------------------------------------
// pyt status
// ---------------------------------------------------------------------------

#[test]
fn status_offline_recommends_configure() {
    let dir = TempDir::new().unwrap();
    template_project(&dir);
    pyt(&dir)
        .args(["status", "--offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configured:   no"))
        .stdout(predicate::str::contains("pyt configure"));
}

#[test]
fn status_offline_json_after_configure() {
    let dir = TempDir::new().unwrap();
    template_project(&dir);
    pyt(&dir).args(configure_args()).assert().success();

    let output = pyt(&dir)
        .args(["--json", "status", "--offline"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let v = stdout_json(&output);
    assert_eq!(v["configured"], true);
    assert_eq!(v["project"]["package_name"], "widget_tools");
    assert_eq!(v["latest"], serde_json::Value::Null);
}

// ---------------------------------------------------------------------------
// pyt migrate
// ---------------------------------------------------------------------------

fn migration_pair() -> (TempDir, TempDir) {
    let template = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write(template.path(), "pyproject.toml", "[project]\nname = \"package-name\"\n");
    write(template.path(), "dodo.py", "# tasks\n");
    write(template.path(), "docs/index.md", "# Docs\n");
    write(target.path(), "pyproject.toml", "[project]\nname = \"legacy\"\n");
    write(target.path(), "app.py", "print('hi')\n");
    (template, target)
}

#[test]
fn migrate_dry_run_leaves_target_alone() {
    let (template, target) = migration_pair();
    let output = pyt(&target)
        .args(["--json", "migrate", "--dry-run", "--template"])
        .arg(template.path())
        .arg("--target")
        .arg(target.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let v = stdout_json(&output);
    assert_eq!(v["dry_run"], true);
    assert!(v["copied"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "dodo.py"));
    assert_eq!(v["backed_up"][0]["path"], "pyproject.toml");

    assert!(!target.path().join("dodo.py").exists());
    assert!(!target.path().join("tmp").exists());
    assert!(read(target.path(), "pyproject.toml").contains("legacy"));
}

#[test]
fn migrate_copies_and_backs_up() {
    let (template, target) = migration_pair();
    pyt(&target)
        .args(["migrate", "--template"])
        .arg(template.path())
        .arg("--target")
        .arg(target.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Backed up to"));

    let root = target.path();
    assert!(read(root, "pyproject.toml").contains("package-name"));
    assert_eq!(read(root, "dodo.py"), "# tasks\n");
    assert_eq!(read(root, "docs/index.md"), "# Docs\n");
    assert_eq!(read(root, "app.py"), "print('hi')\n");

    let backups: Vec<_> = std::fs::read_dir(root.join("tmp"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(backups.len(), 1);
    let backed_up = std::fs::read_to_string(backups[0].join("pyproject.toml")).unwrap();
    assert!(backed_up.contains("legacy"));
}

#[test]
fn migrate_requires_a_template_source() {
    let (_template, target) = migration_pair();
    pyt(&target)
        .args(["migrate", "--target"])
        .arg(target.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--template"));
}

// ---------------------------------------------------------------------------
// pyt bootstrap
// ---------------------------------------------------------------------------

#[test]
fn bootstrap_dry_run_prints_plan() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .args([
            "bootstrap",
            "--name",
            "widget-tools",
            "--owner",
            "ada",
            "--author-name",
            "Ada",
            "--author-email",
            "ada@example.com",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("ada/widget-tools"))
        .stdout(predicate::str::contains("create-repo"))
        .stdout(predicate::str::contains("commit-push"));
    assert!(!dir.path().join("widget-tools").exists());
}

#[test]
fn bootstrap_dry_run_json_lists_steps() {
    let dir = TempDir::new().unwrap();
    let output = pyt(&dir)
        .args([
            "--json",
            "bootstrap",
            "--name",
            "widget-tools",
            "--owner",
            "ada",
            "--author-name",
            "Ada",
            "--author-email",
            "ada@example.com",
            "--dry-run",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let v = stdout_json(&output);
    assert_eq!(v["repo"], "ada/widget-tools");
    let ids: Vec<&str> = v["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            "check-requirements",
            "create-repo",
            "repo-settings",
            "rulesets",
            "labels",
            "pages",
            "codeql",
            "clone",
            "configure",
            "commit-push",
            "dev-environment"
        ]
    );
    assert!(v["steps"]
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["status"] == "planned"));
}

#[test]
fn bootstrap_rejects_invalid_package_name() {
    let dir = TempDir::new().unwrap();
    pyt(&dir)
        .args([
            "bootstrap",
            "--name",
            "widget-tools",
            "--owner",
            "ada",
            "--package-name",
            "Bad-Name",
            "--author-name",
            "Ada",
            "--author-email",
            "ada@example.com",
            "--dry-run",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid package name"));
}
