use std::thread;

use anyhow::{Context, Result};
use rand::Rng;

use crate::core::config::WorkerTiming;
use crate::state::{SharedState, QUESTION_SLOTS};

/// Walks every rubric slot once, pausing to "review" each and sometimes amending its mark.
///
/// Returns how many records this pass changed.
pub(crate) fn review_rubric<R: Rng + ?Sized>(
    state: &SharedState,
    timing: &WorkerTiming,
    rng: &mut R,
) -> Result<usize> {
    let mut edits = 0;

    for slot in 0..QUESTION_SLOTS {
        thread::sleep(timing.review.sample(rng));

        if rng.gen_bool(timing.change_probability) && edit_rubric_line(state, slot)? {
            edits += 1;
        }
    }

    Ok(edits)
}

/// Advances the mark of one record and rewrites the rubric file in the same critical section.
///
/// The file is rewritten even when the record has no mark, so a padded rubric reaches disk.
/// Returns whether the mark changed.
pub(crate) fn edit_rubric_line(state: &SharedState, slot: usize) -> Result<bool> {
    let mut rubric = state.rubric().lock().context("Failed to acquire rubric lock")?;

    let changed = rubric.advance_mark(slot);
    if changed {
        tracing::info!(
            student_id = state.student_id(),
            question = slot + 1,
            line = rubric.line(slot),
            "Rubric changed"
        );
    } else {
        tracing::debug!(question = slot + 1, "Rubric line has no mark to change");
    }

    let path = state.rubric_path();
    if let Err(err) = rubric.persist(path) {
        tracing::error!(rubric_file = %path.display(), error = %err, "Failed to persist rubric");
    }

    Ok(changed)
}
