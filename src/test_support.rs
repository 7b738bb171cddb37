use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};

use tempfile::TempDir;

use crate::shm::SharedRegion;
use crate::state::{load_exam_list, load_rubric, SharedState};
use crate::tasks::grading;

/// Serialises tests that mutate process environment variables.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exam files, an exam list and a rubric laid out in a temporary directory.
pub(crate) struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub(crate) const DEFAULT_RUBRIC: &'static str = "1, A\n2, B\n3, C\n4, D\n5, E\n";

    /// Writes each `(file name, contents)` exam and lists them by absolute path.
    pub(crate) fn new(exams: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut list = String::new();
        for (name, contents) in exams {
            let path = dir.path().join(name);
            fs::write(&path, contents).expect("write exam");
            list.push_str(&path.display().to_string());
            list.push('\n');
        }
        fs::write(dir.path().join("exams.txt"), list).expect("write exam list");
        fs::write(dir.path().join("rubric.txt"), Self::DEFAULT_RUBRIC).expect("write rubric");
        Self { dir }
    }

    /// Lists the given paths verbatim without creating them.
    pub(crate) fn with_listed_paths(paths: &[&str]) -> Self {
        let fixture = Self::new(&[]);
        let list: String = paths.iter().map(|path| format!("{path}\n")).collect();
        fs::write(fixture.exam_list_path(), list).expect("write exam list");
        fixture
    }

    pub(crate) fn with_rubric(self, contents: &str) -> Self {
        fs::write(self.rubric_path(), contents).expect("write rubric");
        self
    }

    pub(crate) fn rubric_path(&self) -> PathBuf {
        self.dir.path().join("rubric.txt")
    }

    pub(crate) fn exam_list_path(&self) -> PathBuf {
        self.dir.path().join("exams.txt")
    }
}

/// An anonymous shared mapping initialised from the fixture with the first exam loaded.
pub(crate) fn prepared_state(fixture: &Fixture) -> SharedRegion<SharedState> {
    let exams = load_exam_list(&fixture.exam_list_path()).expect("exam list");
    let rubric = load_rubric(&fixture.rubric_path()).expect("rubric");

    let mut region = SharedRegion::<SharedState>::anonymous().expect("anonymous mapping");
    let state = unsafe { region.get_mut() };
    state.init_locks().expect("locks");
    state.install(exams, rubric, &fixture.rubric_path()).expect("install");

    grading::load_first_exam(region.get()).expect("first exam");
    region
}
