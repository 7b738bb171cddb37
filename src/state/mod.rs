//! Layout of the grading state shared by the supervisor and every worker process.
//!
//! Each mutable concern sits behind its own [`ProcessMutex`]:
//!
//! | lock     | guards                                             |
//! |----------|----------------------------------------------------|
//! | `rubric` | rubric records and their file copy                 |
//! | `board`  | per-slot claim flags and the completed counter     |
//! | `cursor` | the current exam index, `student_id`, `terminate`  |
//!
//! `student_id` and `terminate` are atomics so loop-exit checks can read them without a lock,
//! but writing them requires a borrowed [`ExamCursor`], i.e. holding the exam-advance lock.
//! Locks are only ever nested as `cursor` then `board`.

mod exams;
mod rubric;
mod text;

pub(crate) use exams::{load_exam_list, ExamList};
pub(crate) use rubric::{load_rubric, Rubric};

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use thiserror::Error;

use crate::shm::{ProcessMutex, ZeroInit};
use text::FixedText;

pub(crate) const QUESTION_SLOTS: usize = 5;
pub(crate) const RUBRIC_LINE_CAPACITY: usize = 256;
pub(crate) const EXAM_CAPACITY: usize = 50;
pub(crate) const PATH_CAPACITY: usize = 256;

/// Student id recorded when an exam cannot be loaded; seeing it stops the run.
pub(crate) const SENTINEL_STUDENT_ID: i32 = 9999;

#[derive(Debug, Error)]
pub(crate) enum SetupError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("no exams listed in {0}")]
    EmptyExamList(String),
    #[error("{path} lists more than {capacity} exams")]
    TooManyExams { path: String, capacity: usize },
    #[error("{what} is longer than {capacity} bytes: {value}")]
    TooLong { what: &'static str, capacity: usize, value: String },
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),
}

/// Which slots of the loaded exam have been claimed and how many are graded.
#[repr(C)]
#[derive(Debug)]
pub(crate) struct QuestionBoard {
    exam_index: u32,
    claimed: [bool; QUESTION_SLOTS],
    done: u32,
}

unsafe impl ZeroInit for QuestionBoard {}

impl QuestionBoard {
    pub(crate) fn reset(&mut self, exam_index: usize) {
        self.exam_index = exam_index as u32;
        self.claimed = [false; QUESTION_SLOTS];
        self.done = 0;
    }

    /// Claims the lowest unclaimed slot.
    pub(crate) fn claim_next(&mut self) -> Option<usize> {
        let slot = self.claimed.iter().position(|claimed| !claimed)?;
        self.claimed[slot] = true;
        Some(slot)
    }

    /// Counts one graded question. Returns `true` only for the call that completes the exam.
    pub(crate) fn record_done(&mut self) -> bool {
        if self.done as usize >= QUESTION_SLOTS {
            return false;
        }
        self.done += 1;
        self.done as usize == QUESTION_SLOTS
    }

    pub(crate) fn exam_index(&self) -> usize {
        self.exam_index as usize
    }

    #[cfg(test)]
    pub(crate) fn questions_done(&self) -> usize {
        self.done as usize
    }
}

/// Position in the exam list. Only reachable through the exam-advance lock.
#[repr(C)]
#[derive(Debug)]
pub(crate) struct ExamCursor {
    current: u32,
}

unsafe impl ZeroInit for ExamCursor {}

impl ExamCursor {
    #[cfg(test)]
    pub(crate) fn current(&self) -> usize {
        self.current as usize
    }

    pub(crate) fn set_current(&mut self, index: usize) {
        self.current = index as u32;
    }

    pub(crate) fn step(&mut self) -> usize {
        self.current += 1;
        self.current as usize
    }
}

#[repr(C)]
pub(crate) struct SharedState {
    rubric: ProcessMutex<Rubric>,
    board: ProcessMutex<QuestionBoard>,
    cursor: ProcessMutex<ExamCursor>,
    exams: ExamList,
    rubric_path: FixedText<PATH_CAPACITY>,
    student_id: AtomicI32,
    terminate: AtomicBool,
}

unsafe impl ZeroInit for SharedState {}

impl SharedState {
    pub(crate) fn init_locks(&mut self) -> io::Result<()> {
        self.rubric.init()?;
        self.board.init()?;
        self.cursor.init()
    }

    pub(crate) fn destroy_locks(&mut self) -> io::Result<()> {
        self.rubric.destroy()?;
        self.board.destroy()?;
        self.cursor.destroy()
    }

    /// Stores the write-once inputs. Only valid before any worker maps the region.
    pub(crate) fn install(
        &mut self,
        exams: ExamList,
        rubric: Rubric,
        rubric_path: &Path,
    ) -> Result<(), SetupError> {
        let path = rubric_path
            .to_str()
            .ok_or_else(|| SetupError::NonUtf8Path(rubric_path.display().to_string()))?;
        self.rubric_path.set(path).map_err(|err| SetupError::TooLong {
            what: "rubric path",
            capacity: err.capacity,
            value: path.to_string(),
        })?;

        self.exams = exams;
        *self.rubric.get_mut() = rubric;
        Ok(())
    }

    pub(crate) fn rubric(&self) -> &ProcessMutex<Rubric> {
        &self.rubric
    }

    pub(crate) fn board(&self) -> &ProcessMutex<QuestionBoard> {
        &self.board
    }

    pub(crate) fn cursor(&self) -> &ProcessMutex<ExamCursor> {
        &self.cursor
    }

    pub(crate) fn exams(&self) -> &ExamList {
        &self.exams
    }

    pub(crate) fn rubric_path(&self) -> &Path {
        Path::new(self.rubric_path.as_str())
    }

    pub(crate) fn student_id(&self) -> i32 {
        self.student_id.load(Ordering::Acquire)
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    /// Lock-free exit check. May lag a concurrent writer by one loop iteration.
    pub(crate) fn should_exit(&self) -> bool {
        self.is_terminated() || self.student_id() == SENTINEL_STUDENT_ID
    }

    pub(crate) fn set_student_id(&self, _held: &ExamCursor, student_id: i32) {
        self.student_id.store(student_id, Ordering::Release);
    }

    /// Sets `terminate`. The flag is never cleared.
    pub(crate) fn request_termination(&self, _held: &ExamCursor) {
        self.terminate.store(true, Ordering::Release);
    }
}
