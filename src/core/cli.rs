use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

pub(crate) const MIN_WORKERS: usize = 2;

const SUPERVISOR_USAGE: &str = "Usage: exam-marker <num_workers> <rubric_file> <exam_list_file>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MarkerArgs {
    pub(crate) workers: usize,
    pub(crate) rubric_path: PathBuf,
    pub(crate) exam_list_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorkerArgs {
    pub(crate) shm_name: String,
    pub(crate) worker_id: u32,
}

impl MarkerArgs {
    pub(crate) fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let [workers, rubric_path, exam_list_path] = args.as_slice() else {
            bail!(SUPERVISOR_USAGE);
        };

        let workers: usize = workers
            .parse()
            .with_context(|| format!("num_workers must be an integer, got {workers:?}"))?;
        if workers < MIN_WORKERS {
            bail!("num_workers must be >= {MIN_WORKERS}, got {workers}");
        }

        Ok(Self {
            workers,
            rubric_path: PathBuf::from(rubric_path),
            exam_list_path: PathBuf::from(exam_list_path),
        })
    }
}

impl WorkerArgs {
    pub(crate) fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut shm_name = None;
        let mut worker_id = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--shm" => {
                    shm_name = Some(args.next().ok_or_else(|| anyhow!("--shm missing value"))?);
                }
                "--id" => {
                    let value = args.next().ok_or_else(|| anyhow!("--id missing value"))?;
                    let id = value
                        .parse::<u32>()
                        .with_context(|| format!("--id must be an integer, got {value:?}"))?;
                    worker_id = Some(id);
                }
                _ => return Err(anyhow!("Unknown argument: {arg}")),
            }
        }

        Ok(Self {
            shm_name: shm_name.ok_or_else(|| anyhow!("--shm is required"))?,
            worker_id: worker_id.ok_or_else(|| anyhow!("--id is required"))?,
        })
    }
}
