use assert_cmd::Command; // Bring Command into scope
use predicates::prelude::*; // Bring predicate traits into scope
use tempfile::tempdir;

fn dotbot(config_dir: &std::path::Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("dotbot")?;
    cmd.arg("--config-dir")
        .arg(config_dir)
        .arg("--modules-dir")
        .arg(config_dir.join("modules"))
        .env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn test_init_config_creates_settings_once() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    dotbot(dir.path())?
        .arg("init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));
    assert!(dir.path().join("settings.json").is_file());

    dotbot(dir.path())?
        .arg("init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Settings already exist"));

    Ok(())
}

#[test]
fn test_plugins_lists_compiled_in_module() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    dotbot(dir.path())?
        .arg("plugins")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. kubc08.dotbotbase.test - Test Module v1.0.0"));

    Ok(())
}

#[test]
fn test_broken_settings_fail_startup() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("settings.json"), "{ not json")?;

    dotbot(dir.path())?.arg("plugins").assert().failure();

    Ok(())
}

#[test]
fn test_run_serves_requests_from_stdin() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let input = [
        r#"{"id": 1, "command": "test"}"#,
        r#"{"command": "testentry", "path": ["add"], "args": {"key": "color", "value": "blue"}}"#,
        r#"{"command": "testentry", "options": [{"name": "get", "options": [{"name": "key", "value": "shape"}]}]}"#,
        r#"{"command": "testgroup", "path": ["testgroup1", "testsubcommand"], "args": {"testval2": "hi"}}"#,
        r#"{"command": "missing"}"#,
        "not json",
    ]
    .join("\n");

    dotbot(dir.path())?
        .arg("run")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"id":1,"content":"DotBot is up and running!""#))
        .stdout(predicate::str::contains("Added entry color with value 'blue'"))
        .stdout(predicate::str::contains("No entry found for key shape"))
        .stdout(predicate::str::contains("Your sub command argument is hi"))
        .stdout(predicate::str::contains("This command is currently unavailable."))
        .stdout(predicate::str::contains(r#"{"error":"#));
    assert!(dir.path().join("test-module.json").is_file());

    Ok(())
}

#[test]
fn test_run_without_input_shuts_down_cleanly() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    dotbot(dir.path())?
        .write_stdin("")
        .assert()
        .success()
        .stderr(predicate::str::contains("No platform token configured"))
        .stderr(predicate::str::contains("Shutting down"));

    Ok(())
}
