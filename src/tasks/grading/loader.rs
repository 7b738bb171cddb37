use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::state::{ExamCursor, SharedState, SENTINEL_STUDENT_ID};

/// Loads exam `index` into the shared state.
///
/// Takes the exam-advance guard as proof that the caller holds that lock. An index outside the
/// exam list only sets `terminate`. An unusable exam file records the sentinel student id, still
/// resets the board, and then sets `terminate`.
pub(crate) fn load_exam(state: &SharedState, cursor: &ExamCursor, index: usize) -> Result<()> {
    let Some(exam_file) = state.exams().get(index) else {
        tracing::debug!(index, exam_count = state.exams().len(), "Exam index out of range");
        state.request_termination(cursor);
        return Ok(());
    };

    let student_id = read_student_id(Path::new(exam_file));
    state.set_student_id(cursor, student_id);

    state.board().lock().context("Failed to acquire question lock")?.reset(index);

    tracing::info!(exam_file, student_id, "Loaded exam");

    if student_id == SENTINEL_STUDENT_ID {
        state.request_termination(cursor);
    }

    Ok(())
}

/// Puts the first exam in place before any worker starts.
pub(crate) fn load_first_exam(state: &SharedState) -> Result<()> {
    let mut cursor = state.cursor().lock().context("Failed to acquire exam lock")?;
    cursor.set_current(0);
    load_exam(state, &cursor, 0)
}

/// First line of the exam file as the student id, or the sentinel when that is impossible.
fn read_student_id(path: &Path) -> i32 {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(exam_file = %path.display(), error = %err, "Exam file unreadable");
            return SENTINEL_STUDENT_ID;
        }
    };

    let Some(first_line) = content.lines().next() else {
        tracing::warn!(exam_file = %path.display(), "Exam file is empty");
        return SENTINEL_STUDENT_ID;
    };

    match first_line.trim().parse::<i32>() {
        Ok(student_id) => student_id,
        Err(_) => {
            tracing::warn!(
                exam_file = %path.display(),
                first_line,
                "Exam file does not start with a student id"
            );
            SENTINEL_STUDENT_ID
        }
    }
}
