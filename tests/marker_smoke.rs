use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use tokio::process::Command;

const RUBRIC: &str = "1, A\n2, B\n";

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new(exams: &[(&str, &str)]) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut list = String::new();
        for (name, contents) in exams {
            std::fs::write(dir.path().join(name), contents)?;
            list.push_str(name);
            list.push('\n');
        }
        std::fs::write(dir.path().join("exams.txt"), list)?;
        std::fs::write(dir.path().join("rubric.txt"), RUBRIC)?;
        Ok(Self { dir })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn rubric(&self) -> anyhow::Result<String> {
        Ok(std::fs::read_to_string(self.path().join("rubric.txt"))?)
    }
}

fn worker_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_exam-marker-worker"))
}

async fn run_marker(workspace: &Workspace, args: &[&str]) -> anyhow::Result<Output> {
    run_marker_with(workspace, args, &[]).await
}

async fn run_marker_with(
    workspace: &Workspace,
    args: &[&str],
    overrides: &[(&str, &str)],
) -> anyhow::Result<Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_exam-marker"));
    command
        .args(args)
        .current_dir(workspace.path())
        .env("MARKER_WORKER_BIN", worker_bin())
        .env("MARKER_REVIEW_DELAY_MS", "0")
        .env("MARKER_GRADING_DELAY_MS", "0-2")
        .env("MARKER_CHANGE_PROBABILITY", "0.5")
        .env("MARKER_IDLE_BACKOFF_MS", "1")
        .env("MARKER_LOG_LEVEL", "info")
        .env_remove("RUST_LOG")
        .env_remove("MARKER_LOG_JSON");
    for (key, value) in overrides {
        command.env(key, value);
    }

    let output = tokio::time::timeout(Duration::from_secs(30), command.output()).await??;
    Ok(output)
}

#[tokio::test]
async fn two_exams_are_marked_and_every_worker_exits() -> anyhow::Result<()> {
    let workspace = Workspace::new(&[("examA.txt", "101\nanswers\n"), ("examB.txt", "202\n")])?;

    let output = run_marker(&workspace, &["2", "rubric.txt", "exams.txt"]).await?;
    let logs = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "supervisor failed: {logs}");
    assert!(logs.contains("student_id=101"));
    assert!(logs.contains("student_id=202"));
    assert_eq!(logs.matches("Question marked").count(), 10);
    assert_eq!(logs.matches("Worker finished").count(), 2);
    assert!(logs.contains("All workers finished"));

    let rubric = workspace.rubric()?;
    assert_eq!(rubric.lines().count(), 5);
    assert!(rubric.ends_with('\n'));
    Ok(())
}

#[tokio::test]
async fn empty_exam_stops_run_without_marking() -> anyhow::Result<()> {
    let workspace = Workspace::new(&[("empty.txt", "")])?;

    let output = run_marker(&workspace, &["3", "rubric.txt", "exams.txt"]).await?;
    let logs = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "supervisor failed: {logs}");
    assert!(logs.contains("student_id=9999"));
    assert_eq!(logs.matches("Question marked").count(), 0);
    assert_eq!(logs.matches("Worker finished").count(), 3);
    assert_eq!(workspace.rubric()?, RUBRIC);
    Ok(())
}

#[tokio::test]
async fn single_worker_is_rejected() -> anyhow::Result<()> {
    let workspace = Workspace::new(&[("examA.txt", "101\n")])?;

    let output = run_marker(&workspace, &["1", "rubric.txt", "exams.txt"]).await?;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("exam-marker fatal"));
    Ok(())
}

#[tokio::test]
async fn missing_rubric_fails_before_spawning() -> anyhow::Result<()> {
    let workspace = Workspace::new(&[("examA.txt", "101\n")])?;

    let output = run_marker(&workspace, &["2", "missing.txt", "exams.txt"]).await?;
    let logs = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.txt"));
    assert!(!logs.contains("Worker finished"));
    Ok(())
}

#[tokio::test]
async fn worker_refuses_unknown_region() -> anyhow::Result<()> {
    let output = Command::new(worker_bin())
        .args(["--shm", "/exam_marker_does_not_exist", "--id", "0"])
        .env_remove("MARKER_WORKER_BIN")
        .output()
        .await?;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("exam-marker-worker fatal"));
    Ok(())
}

#[tokio::test]
async fn missing_worker_binary_fails_run() -> anyhow::Result<()> {
    let workspace = Workspace::new(&[("examA.txt", "101\n")])?;

    let output = run_marker_with(
        &workspace,
        &["2", "rubric.txt", "exams.txt"],
        &[("MARKER_WORKER_BIN", "/nonexistent/exam-marker-worker")],
    )
    .await?;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to spawn"));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn killed_worker_stops_the_run() -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let workspace = Workspace::new(&[("examA.txt", "101\n")])?;

    // Worker 0 is killed mid-grading, leaving its claimed question uncounted.
    let wrapper = workspace.path().join("flaky-worker.sh");
    std::fs::write(
        &wrapper,
        "#!/bin/sh\n\
         if [ \"$4\" = \"0\" ]; then\n\
         \"$EXAM_MARKER_REAL_WORKER\" \"$@\" &\n\
         sleep 0.5\n\
         kill -9 $!\n\
         exit 1\n\
         fi\n\
         exec \"$EXAM_MARKER_REAL_WORKER\" \"$@\"\n",
    )?;
    std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755))?;

    let real_worker = worker_bin();
    let wrapper = wrapper.display().to_string();
    let output = run_marker_with(
        &workspace,
        &["2", "rubric.txt", "exams.txt"],
        &[
            ("MARKER_WORKER_BIN", wrapper.as_str()),
            ("EXAM_MARKER_REAL_WORKER", real_worker.to_str().unwrap_or_default()),
            ("MARKER_GRADING_DELAY_MS", "1500"),
        ],
    )
    .await?;
    let logs = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success(), "supervisor should fail: {logs}");
    assert!(logs.contains("stopping the remaining workers"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 of 2 workers failed"));
    Ok(())
}
