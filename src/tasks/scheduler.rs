use std::thread;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::config::WorkerTiming;
use crate::state::SharedState;
use crate::tasks::grading::{self, AdvanceOutcome, Claim};

pub(crate) struct WorkerContext {
    pub(crate) id: u32,
    pub(crate) timing: WorkerTiming,
}

/// What one worker did over the whole run.
#[derive(Debug, Default)]
pub(crate) struct WorkerSummary {
    pub(crate) claims: Vec<Claim>,
    pub(crate) rubric_edits: usize,
    pub(crate) elections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reviewing,
    Claiming,
}

impl WorkerContext {
    /// Per-worker RNG: reproducible when a seed is configured, distinct across worker ids.
    pub(crate) fn rng(&self) -> StdRng {
        match self.timing.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ u64::from(self.id)),
            None => StdRng::from_entropy(),
        }
    }
}

/// Runs the worker loop against the mapped state until the run terminates.
pub(crate) fn run<R: Rng + ?Sized>(
    state: &SharedState,
    ctx: &WorkerContext,
    rng: &mut R,
) -> Result<WorkerSummary> {
    let span = tracing::info_span!("worker", worker = ctx.id);
    let _entered = span.enter();

    tracing::debug!(student_id = state.student_id(), "Worker started");

    let mut summary = WorkerSummary::default();
    let mut phase = Phase::Reviewing;

    while !state.should_exit() {
        phase = match phase {
            Phase::Reviewing => {
                summary.rubric_edits += grading::review_rubric(state, &ctx.timing, rng)?;
                Phase::Claiming
            }
            Phase::Claiming => match grading::select_question(state)? {
                Some(claim) => mark_question(state, ctx, rng, claim, &mut summary)?,
                None => {
                    thread::sleep(ctx.timing.idle_backoff);
                    Phase::Reviewing
                }
            },
        };
    }

    tracing::info!(
        questions_marked = summary.claims.len(),
        rubric_edits = summary.rubric_edits,
        elections = summary.elections,
        "Worker finished"
    );

    Ok(summary)
}

fn mark_question<R: Rng + ?Sized>(
    state: &SharedState,
    ctx: &WorkerContext,
    rng: &mut R,
    claim: Claim,
    summary: &mut WorkerSummary,
) -> Result<Phase> {
    thread::sleep(ctx.timing.grading.sample(rng));

    tracing::info!(student_id = state.student_id(), question = claim.slot + 1, "Question marked");
    summary.claims.push(claim);

    if !grading::complete_question(state)? {
        return Ok(Phase::Claiming);
    }

    summary.elections += 1;
    match grading::advance_exam(state)? {
        AdvanceOutcome::Loaded { index } => {
            tracing::debug!(exam_index = index, "Elected to load next exam");
        }
        AdvanceOutcome::Exhausted => {
            tracing::debug!("Elected with no exams left");
        }
        AdvanceOutcome::AlreadyTerminated => {
            tracing::debug!("Elected after the run already ended");
        }
    }

    Ok(Phase::Reviewing)
}
