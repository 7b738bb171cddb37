mod loader;
mod review;
mod worker;

pub(crate) use loader::load_first_exam;
pub(crate) use review::review_rubric;
pub(crate) use worker::{advance_exam, complete_question, select_question, AdvanceOutcome, Claim};
