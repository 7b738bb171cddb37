use anyhow::{Context, Result};

use super::loader::load_exam;
use crate::state::SharedState;

/// A question slot handed to exactly one worker for one exam load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Claim {
    pub(crate) exam_index: usize,
    pub(crate) slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdvanceOutcome {
    AlreadyTerminated,
    Exhausted,
    Loaded { index: usize },
}

/// Claims the lowest free slot of the loaded exam, or `None` once every slot is taken.
pub(crate) fn select_question(state: &SharedState) -> Result<Option<Claim>> {
    let mut board = state.board().lock().context("Failed to acquire question lock")?;
    Ok(board.claim_next().map(|slot| Claim { exam_index: board.exam_index(), slot }))
}

/// Counts a graded question. `true` means the caller is this exam's elector.
pub(crate) fn complete_question(state: &SharedState) -> Result<bool> {
    let mut board = state.board().lock().context("Failed to acquire question lock")?;
    Ok(board.record_done())
}

/// Moves the run to the next exam, or ends it when the list is exhausted.
pub(crate) fn advance_exam(state: &SharedState) -> Result<AdvanceOutcome> {
    let mut cursor = state.cursor().lock().context("Failed to acquire exam lock")?;

    if state.is_terminated() {
        return Ok(AdvanceOutcome::AlreadyTerminated);
    }

    let next = cursor.step();
    if next >= state.exams().len() {
        state.request_termination(&cursor);
        tracing::info!(exams = state.exams().len(), "Exam list exhausted");
        return Ok(AdvanceOutcome::Exhausted);
    }

    load_exam(state, &cursor, next)?;
    Ok(AdvanceOutcome::Loaded { index: next })
}
