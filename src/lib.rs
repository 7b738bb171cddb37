pub(crate) mod core;
pub(crate) mod shm;
pub(crate) mod state;
pub(crate) mod supervisor;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use crate::core::cli::{MarkerArgs, WorkerArgs};
use crate::core::{config::Settings, telemetry};
use crate::shm::SharedRegion;
use crate::state::SharedState;
use crate::tasks::scheduler::{self, WorkerContext};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let args = MarkerArgs::parse(std::env::args().skip(1))?;
    supervisor::run(&settings, &args).await
}

pub fn run_worker() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let args = WorkerArgs::parse(std::env::args().skip(1))?;
    let region = SharedRegion::<SharedState>::open(&args.shm_name)?;

    let ctx = WorkerContext { id: args.worker_id, timing: settings.timing().clone() };
    let mut rng = ctx.rng();
    scheduler::run(region.get(), &ctx, &mut rng)?;

    drop(region);
    Ok(())
}
