//! Real subprocess behaviour. Unix only: these drive `/bin/sh`.

#![cfg(unix)]

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use coconut_core::process::{run_captured, spawn_detached};
use coconut_core::{CommandKind, LaunchRequest, ToolCommand, ToolError};

fn sh(script: &str, timeout: Duration) -> ToolCommand {
    ToolCommand {
        kind: CommandKind::InstallDependencies,
        program: PathBuf::from("/bin/sh"),
        args: vec!["-c".to_string(), script.to_string()],
        cwd: std::env::temp_dir(),
        timeout,
    }
}

#[tokio::test]
async fn captured_run_returns_stdout() {
    let output = run_captured(&sh("echo installed", Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(output.stdout.trim(), "installed");
    assert!(output.stderr.is_empty());
}

#[tokio::test]
async fn non_zero_exit_carries_status_and_stderr() {
    let err = run_captured(&sh(
        "echo 'ERROR: No matching distribution' >&2; exit 3",
        Duration::from_secs(10),
    ))
    .await
    .unwrap_err();

    match err {
        ToolError::Failed { status, stderr, .. } => {
            assert_eq!(status, Some(3));
            assert!(stderr.contains("No matching distribution"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn slow_command_times_out() {
    let started = Instant::now();
    let err = run_captured(&sh("sleep 30", Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::TimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn timeout_kills_background_children_of_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("grandchild.pid");
    let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

    let err = run_captured(&sh(&script, Duration::from_millis(300)))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::TimedOut { .. }));

    let pid: u32 = fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while is_running(pid) {
        assert!(
            Instant::now() < deadline,
            "background child {pid} survived the timeout"
        );
        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Whether `pid` is alive. Zombies waiting to be reaped count as dead.
fn is_running(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        match fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| !rest.trim_start().starts_with('Z')),
            Err(_) => false,
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }
}

#[tokio::test]
async fn unknown_program_is_not_found() {
    let command = ToolCommand {
        program: PathBuf::from("coconut-no-such-python"),
        ..sh("", Duration::from_secs(1))
    };
    let err = run_captured(&command).await.unwrap_err();
    assert!(matches!(err, ToolError::NotFound { .. }));
}

#[test]
fn detached_spawn_returns_without_waiting() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("started.txt");
    let script = dir.path().join("entry.sh");
    fs::write(
        &script,
        format!(
            "echo \"$HOST:$PORT $BROWSER_URL\" > '{}'\nsleep 3\n",
            marker.display()
        ),
    )
    .unwrap();

    let request = LaunchRequest {
        program: PathBuf::from("/bin/sh"),
        entry_point: script,
        cwd: dir.path().to_path_buf(),
        env: vec![
            ("HOST".to_string(), "127.0.0.1".to_string()),
            ("PORT".to_string(), "8000".to_string()),
            (
                "BROWSER_URL".to_string(),
                "http://127.0.0.1:8000/".to_string(),
            ),
        ],
        windowless: false,
        title: "Coconut Billing".to_string(),
    };

    let started = Instant::now();
    let pid = spawn_detached(&request).unwrap();
    assert!(pid > 0);
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "spawn must not wait for the child"
    );

    let deadline = Instant::now() + Duration::from_secs(10);
    let contents = loop {
        if let Ok(contents) = fs::read_to_string(&marker)
            && !contents.is_empty()
        {
            break contents;
        }
        assert!(Instant::now() < deadline, "child never wrote its marker");
        std::thread::sleep(Duration::from_millis(50));
    };
    assert_eq!(contents.trim(), "127.0.0.1:8000 http://127.0.0.1:8000/");
}

#[test]
fn detached_spawn_of_missing_interpreter_fails() {
    let dir = tempfile::tempdir().unwrap();
    let request = LaunchRequest {
        program: dir.path().join(".venv").join("bin").join("python"),
        entry_point: dir.path().join("wsgi.py"),
        cwd: dir.path().to_path_buf(),
        env: Vec::new(),
        windowless: false,
        title: "Coconut Billing".to_string(),
    };
    let err = spawn_detached(&request).unwrap_err();
    assert!(matches!(err, ToolError::Spawn { .. }));
}
