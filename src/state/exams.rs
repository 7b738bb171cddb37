use std::fs;
use std::path::Path;

use super::text::FixedText;
use super::{SetupError, EXAM_CAPACITY, PATH_CAPACITY};
use crate::shm::ZeroInit;

pub(crate) type ExamPath = FixedText<PATH_CAPACITY>;

/// The exam files to grade, in order. Written once before workers start.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExamList {
    count: u32,
    files: [ExamPath; EXAM_CAPACITY],
}

unsafe impl ZeroInit for ExamList {}

impl ExamList {
    pub(crate) fn len(&self) -> usize {
        (self.count as usize).min(EXAM_CAPACITY)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&str> {
        self.files[..self.len()].get(index).map(ExamPath::as_str)
    }
}

pub(crate) fn load_exam_list(path: &Path) -> Result<ExamList, SetupError> {
    let content = fs::read_to_string(path)
        .map_err(|source| SetupError::Read { path: path.display().to_string(), source })?;
    parse_exam_list(&content, &path.display().to_string())
}

fn parse_exam_list(content: &str, origin: &str) -> Result<ExamList, SetupError> {
    let mut list = ExamList { count: 0, files: [ExamPath::EMPTY; EXAM_CAPACITY] };

    for entry in content.lines().map(|line| line.trim_end_matches('\r')) {
        if entry.is_empty() {
            continue;
        }

        let slot = list.files.get_mut(list.count as usize).ok_or_else(|| {
            SetupError::TooManyExams { path: origin.to_string(), capacity: EXAM_CAPACITY }
        })?;
        slot.set(entry).map_err(|err| SetupError::TooLong {
            what: "exam file path",
            capacity: err.capacity,
            value: entry.to_string(),
        })?;
        list.count += 1;
    }

    if list.count == 0 {
        return Err(SetupError::EmptyExamList(origin.to_string()));
    }

    Ok(list)
}
