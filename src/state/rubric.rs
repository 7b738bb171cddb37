use std::fs;
use std::io;
use std::path::Path;

use super::text::FixedText;
use super::{SetupError, QUESTION_SLOTS, RUBRIC_LINE_CAPACITY};
use crate::shm::ZeroInit;

pub(crate) type RubricLine = FixedText<RUBRIC_LINE_CAPACITY>;

/// One rubric record per question slot, e.g. `"3, C"`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rubric {
    lines: [RubricLine; QUESTION_SLOTS],
}

unsafe impl ZeroInit for Rubric {}

impl Rubric {
    pub(crate) fn line(&self, slot: usize) -> &str {
        self.lines[slot].as_str()
    }

    /// Advances the mark after the first comma of `slot` to the next character.
    ///
    /// Returns `false` when the record has no mark, or the successor would not fit.
    pub(crate) fn advance_mark(&mut self, slot: usize) -> bool {
        let Some(next) = next_mark(self.lines[slot].as_str()) else {
            return false;
        };
        self.lines[slot].set(&next).is_ok()
    }

    /// File form of the rubric: every record followed by exactly one newline.
    pub(crate) fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line.as_str());
            out.push('\n');
        }
        out
    }

    pub(crate) fn persist(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.render())
    }
}

pub(crate) fn load_rubric(path: &Path) -> Result<Rubric, SetupError> {
    let content = fs::read_to_string(path)
        .map_err(|source| SetupError::Read { path: path.display().to_string(), source })?;
    parse_rubric(&content)
}

fn parse_rubric(content: &str) -> Result<Rubric, SetupError> {
    let mut lines = [RubricLine::EMPTY; QUESTION_SLOTS];
    let mut source = content.lines();

    for (slot, line) in lines.iter_mut().enumerate() {
        let record = match source.next() {
            Some(text) => text.to_string(),
            None => format!("{}, X", slot + 1),
        };
        line.set(&record).map_err(|err| SetupError::TooLong {
            what: "rubric line",
            capacity: err.capacity,
            value: record.clone(),
        })?;
    }

    Ok(Rubric { lines })
}

fn next_mark(line: &str) -> Option<String> {
    let comma = line.find(',')?;
    let after = &line[comma + 1..];
    let offset = comma + 1 + (after.len() - after.trim_start_matches(' ').len());

    let mark = line[offset..].chars().next()?;
    if mark == '\n' || mark == '\r' {
        return None;
    }
    let next = char::from_u32(mark as u32 + 1)?;

    let mut updated = String::with_capacity(line.len() + 4);
    updated.push_str(&line[..offset]);
    updated.push(next);
    updated.push_str(&line[offset + mark.len_utf8()..]);
    Some(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_missing_lines_with_placeholders() {
        let rubric = parse_rubric("1, A\n2, B\n").expect("rubric");
        assert_eq!(rubric.line(0), "1, A");
        assert_eq!(rubric.line(1), "2, B");
        assert_eq!(rubric.line(2), "3, X");
        assert_eq!(rubric.line(4), "5, X");
    }

    #[test]
    fn ignores_lines_beyond_slot_count() {
        let rubric = parse_rubric("1, A\n2, B\n3, C\n4, D\n5, E\n6, F\n").expect("rubric");
        assert_eq!(rubric.render(), "1, A\n2, B\n3, C\n4, D\n5, E\n");
    }

    #[test]
    fn strips_carriage_returns() {
        let rubric = parse_rubric("1, A\r\n2, B\r\n").expect("rubric");
        assert_eq!(rubric.line(1), "2, B");
    }

    #[test]
    fn rejects_overlong_line() {
        let long = format!("1, {}", "A".repeat(RUBRIC_LINE_CAPACITY));
        let err = parse_rubric(&long).expect_err("too long");
        assert!(matches!(err, SetupError::TooLong { what: "rubric line", .. }));
    }

    #[test]
    fn next_mark_skips_spaces_after_comma() {
        assert_eq!(next_mark("1, A").as_deref(), Some("1, B"));
        assert_eq!(next_mark("2,   Q rest").as_deref(), Some("2,   R rest"));
        assert_eq!(next_mark("3,Z").as_deref(), Some("3,["));
    }

    #[test]
    fn next_mark_needs_comma_and_mark() {
        assert_eq!(next_mark("no comma here"), None);
        assert_eq!(next_mark("4,"), None);
        assert_eq!(next_mark("5,    "), None);
    }

    #[test]
    fn advance_mark_only_touches_one_slot() {
        let mut rubric = parse_rubric("1, A\n2, B\n").expect("rubric");
        assert!(rubric.advance_mark(1));
        assert!(rubric.advance_mark(1));
        assert_eq!(rubric.line(0), "1, A");
        assert_eq!(rubric.line(1), "2, D");
    }

    #[test]
    fn advance_mark_reports_unchanged_record() {
        let mut rubric = parse_rubric("plain text\n").expect("rubric");
        assert!(!rubric.advance_mark(0));
        assert_eq!(rubric.line(0), "plain text");
    }

    #[test]
    fn persisted_file_matches_render() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rubric.txt");
        fs::write(&path, "1, A\n").expect("seed");

        let mut rubric = load_rubric(&path).expect("load");
        rubric.advance_mark(0);
        rubric.persist(&path).expect("persist");

        let written = fs::read_to_string(&path).expect("read back");
        assert_eq!(written, "1, B\n2, X\n3, X\n4, X\n5, X\n");
        assert_eq!(load_rubric(&path).expect("reload").render(), written);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_rubric(Path::new("/nonexistent/rubric.txt")).expect_err("missing");
        assert!(matches!(err, SetupError::Read { .. }));
    }
}
