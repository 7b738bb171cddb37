//! Parent process: prepares the shared region, launches the workers, and waits them out.

use std::io;
use std::path::Path;
use std::process::ExitStatus;

use anyhow::{bail, Context, Result};
use tokio::process::{Child, Command};
use tokio::task::{JoinError, JoinSet};
use uuid::Uuid;

use crate::core::cli::MarkerArgs;
use crate::core::config::Settings;
use crate::core::shutdown::shutdown_signal;
use crate::shm::SharedRegion;
use crate::state::{load_exam_list, load_rubric, SharedState};
use crate::tasks::grading;

pub(crate) async fn run(settings: &Settings, args: &MarkerArgs) -> Result<()> {
    let exams = load_exam_list(&args.exam_list_path)?;
    let rubric = load_rubric(&args.rubric_path)?;
    let worker_bin = settings.runtime().worker_bin().context("Failed to locate worker binary")?;

    let name = format!("{}_{}", settings.runtime().shm_prefix, Uuid::new_v4().simple());
    let mut region = SharedRegion::<SharedState>::create(&name)?;
    {
        // Nothing else has the region mapped yet.
        let state = unsafe { region.get_mut() };
        state.init_locks().context("Failed to initialise shared locks")?;
        state.install(exams, rubric, &args.rubric_path)?;
    }
    grading::load_first_exam(region.get())?;

    tracing::info!(
        shm = %name,
        workers = args.workers,
        exams = region.get().exams().len(),
        "Shared state ready"
    );

    let mut children = Vec::with_capacity(args.workers);
    let mut spawn_error = None;
    for id in 0..args.workers {
        match spawn_worker(&worker_bin, &name, id) {
            Ok(child) => children.push((id, child)),
            Err(err) => {
                tracing::error!(worker = id, error = %err, "Failed to spawn worker");
                spawn_error = Some(err);
                break;
            }
        }
    }
    if spawn_error.is_some() {
        stop_workers(region.get())?;
    }

    let spawned = children.len();
    let failures = wait_for_workers(region.get(), children).await?;

    // Every worker has exited, so the region is exclusively ours again.
    if let Err(err) = unsafe { region.get_mut() }.destroy_locks() {
        tracing::warn!(error = %err, "Failed to destroy shared locks");
    }
    drop(region);

    tracing::info!(workers = spawned, failures, "All workers finished");

    if let Some(err) = spawn_error {
        return Err(err);
    }
    if failures > 0 {
        bail!("{failures} of {spawned} workers failed");
    }

    Ok(())
}

fn spawn_worker(worker_bin: &Path, shm_name: &str, id: usize) -> Result<Child> {
    let mut command = Command::new(worker_bin);
    command.arg("--shm").arg(shm_name).arg("--id").arg(id.to_string());

    // Keep terminal Ctrl+C away from workers; the supervisor stops them through `terminate`.
    #[cfg(unix)]
    command.process_group(0);

    command
        .spawn()
        .with_context(|| format!("Failed to spawn {} for worker {id}", worker_bin.display()))
}

fn stop_workers(state: &SharedState) -> Result<()> {
    let cursor = state.cursor().lock().context("Failed to acquire exam lock")?;
    state.request_termination(&cursor);
    Ok(())
}

/// Waits for every child and returns how many did not exit successfully.
///
/// The first failed worker stops the run, since its claimed question would otherwise never be
/// counted and the survivors would never see an elector.
async fn wait_for_workers(state: &SharedState, children: Vec<(usize, Child)>) -> Result<usize> {
    let mut waits = JoinSet::new();
    for (id, mut child) in children {
        waits.spawn(async move { (id, child.wait().await) });
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut signalled = false;
    let mut stopped = false;
    let mut failures = 0;

    loop {
        tokio::select! {
            joined = waits.join_next() => {
                let Some(joined) = joined else {
                    return Ok(failures);
                };
                if !worker_succeeded(joined) {
                    failures += 1;
                    if !stopped {
                        stopped = true;
                        tracing::warn!("Worker failed; stopping the remaining workers");
                        stop_workers(state)?;
                    }
                }
            }
            signal = &mut shutdown, if !signalled => {
                signalled = true;
                tracing::info!(signal, "Shutdown requested; waiting for workers to finish");
                stop_workers(state)?;
            }
        }
    }
}

fn worker_succeeded(joined: Result<(usize, io::Result<ExitStatus>), JoinError>) -> bool {
    match joined {
        Ok((id, Ok(status))) if status.success() => {
            tracing::debug!(worker = id, "Worker exited");
            true
        }
        Ok((id, Ok(status))) => {
            tracing::warn!(worker = id, status = %status, "Worker exited with failure");
            false
        }
        Ok((id, Err(err))) => {
            tracing::error!(worker = id, error = %err, "Failed to wait for worker");
            false
        }
        Err(err) => {
            tracing::error!(error = %err, "Worker wait task failed");
            false
        }
    }
}
