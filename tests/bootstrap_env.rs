//! End-to-end bootstrap runs against fake `ffmpeg`/`ffprobe` scripts.
//!
//! Fallback dirs are emptied so a system install cannot leak into results.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use vcbot::toolchain::{Bootstrap, BootstrapOptions, ProcessEnv, Tool, ToolStatus};

fn fake_tool(dir: &Path, name: &str, version: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\necho \"{name} version {version} Copyright (c) test\"\necho \"built with gcc\"\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn broken_tool(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "#!/bin/sh\nexit 3\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn options(install: &TempDir) -> BootstrapOptions {
    BootstrapOptions {
        install_dirs: vec![install.path().display().to_string()],
        fallback_dirs: vec![],
        cwd: install.path().to_path_buf(),
    }
}

fn env_with_path(path: &str) -> ProcessEnv {
    [("PATH", path)].into_iter().collect()
}

#[tokio::test]
async fn test_both_tools_found() {
    let install = tempfile::tempdir().unwrap();
    let ffmpeg = fake_tool(install.path(), "ffmpeg", "6.1.1");
    let ffprobe = fake_tool(install.path(), "ffprobe", "6.1.1");

    let outcome = Bootstrap::new(options(&install)).run(&env_with_path("")).await;

    assert!(outcome.all_found());
    assert_eq!(outcome.path_of(Tool::Ffmpeg), ffmpeg.display().to_string());
    assert_eq!(outcome.path_of(Tool::Ffprobe), ffprobe.display().to_string());

    let report = outcome.report(Tool::Ffmpeg).unwrap();
    assert_eq!(report.version(), Some("ffmpeg version 6.1.1 Copyright (c) test"));
    assert_eq!(report.version_number(), Some("6.1.1"));
    assert!(outcome.search_path.starts_with(&install.path().display().to_string()));
}

#[tokio::test]
async fn test_neither_tool_found_exports_bare_names() {
    let install = tempfile::tempdir().unwrap();
    let empty = tempfile::tempdir().unwrap();
    let env = env_with_path(&empty.path().display().to_string());

    let outcome = Bootstrap::new(options(&install)).run(&env).await;

    assert!(!outcome.all_found());
    assert_eq!(outcome.path_of(Tool::Ffmpeg), "ffmpeg");
    assert_eq!(outcome.path_of(Tool::Ffprobe), "ffprobe");
    for tool in Tool::ALL {
        let report = outcome.report(tool).unwrap();
        assert!(matches!(report.status, ToolStatus::Missing { .. }));
        assert_eq!(report.version(), None);
    }
}

#[tokio::test]
async fn test_tools_resolve_independently() {
    let install = tempfile::tempdir().unwrap();
    let ffprobe = fake_tool(install.path(), "ffprobe", "5.1");

    let outcome = Bootstrap::new(options(&install)).run(&env_with_path("")).await;

    assert!(!outcome.report(Tool::Ffmpeg).unwrap().is_found());
    assert_eq!(outcome.path_of(Tool::Ffmpeg), "ffmpeg");
    assert!(outcome.report(Tool::Ffprobe).unwrap().is_found());
    assert_eq!(outcome.path_of(Tool::Ffprobe), ffprobe.display().to_string());
}

#[tokio::test]
async fn test_found_without_version_is_still_exported() {
    let install = tempfile::tempdir().unwrap();
    let ffmpeg = broken_tool(install.path(), "ffmpeg");

    let outcome = Bootstrap::new(options(&install)).run(&env_with_path("")).await;

    let report = outcome.report(Tool::Ffmpeg).unwrap();
    assert!(report.is_found());
    assert_eq!(report.version(), None);
    assert_eq!(report.exported, ffmpeg.display().to_string());
}

#[tokio::test]
async fn test_rerun_on_applied_env_is_stable() {
    let install = tempfile::tempdir().unwrap();
    let system = tempfile::tempdir().unwrap();
    fake_tool(install.path(), "ffmpeg", "6.0");
    fake_tool(system.path(), "ffprobe", "6.0");

    let bootstrap = Bootstrap::new(options(&install));
    let mut env = env_with_path(&format!("/bin:{}", system.path().display()));

    let first = bootstrap.run(&env).await;
    first.apply(&mut env);
    let second = bootstrap.run(&env).await;

    assert_eq!(first.exports(), second.exports());
    assert_eq!(first.to_shell(), second.to_shell());
}

#[tokio::test]
async fn test_rerun_with_missing_tools_is_stable() {
    let install = tempfile::tempdir().unwrap();
    let bootstrap = Bootstrap::new(options(&install));
    let mut env = env_with_path("/nonexistent");

    let first = bootstrap.run(&env).await;
    first.apply(&mut env);
    let second = bootstrap.run(&env).await;

    assert_eq!(first.exports(), second.exports());
    assert_eq!(env.get("FFMPEG_PATH"), Some("ffmpeg"));
}

#[tokio::test]
async fn test_override_is_tried_first() {
    let install = tempfile::tempdir().unwrap();
    let custom = tempfile::tempdir().unwrap();
    fake_tool(install.path(), "ffmpeg", "4.4");
    let pinned = fake_tool(custom.path(), "ffmpeg", "7.0");

    let mut env = env_with_path("");
    env.set("FFMPEG_PATH", pinned.display().to_string());

    let outcome = Bootstrap::new(options(&install)).run(&env).await;

    let report = outcome.report(Tool::Ffmpeg).unwrap();
    assert_eq!(report.exported, pinned.display().to_string());
    assert_eq!(report.version(), Some("ffmpeg version 7.0 Copyright (c) test"));
    assert_eq!(report.candidates, vec![pinned.display().to_string(), "ffmpeg".to_string()]);
}

#[tokio::test]
async fn test_unusable_override_falls_back_to_search() {
    let install = tempfile::tempdir().unwrap();
    let ffmpeg = fake_tool(install.path(), "ffmpeg", "6.0");

    let mut env = env_with_path("");
    env.set("FFMPEG_PATH", "/nonexistent/ffmpeg");

    let outcome = Bootstrap::new(options(&install)).run(&env).await;

    assert_eq!(outcome.path_of(Tool::Ffmpeg), ffmpeg.display().to_string());
}

#[tokio::test]
async fn test_apply_to_command_passes_exports() {
    let install = tempfile::tempdir().unwrap();
    let empty = tempfile::tempdir().unwrap();
    fake_tool(install.path(), "ffmpeg", "6.0");

    let env = env_with_path(&empty.path().display().to_string());
    let outcome = Bootstrap::new(options(&install)).run(&env).await;

    let mut cmd = tokio::process::Command::new("/bin/sh");
    cmd.arg("-c").arg("printf '%s\\n%s' \"$FFMPEG_PATH\" \"$FFPROBE_PATH\"");
    outcome.apply_to_command(&mut cmd);
    let output = cmd.output().await.unwrap();

    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some(outcome.path_of(Tool::Ffmpeg)));
    assert_eq!(lines.next(), Some("ffprobe"));
}
