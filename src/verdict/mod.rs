//! Evidence-backed verdict classification
//!
//! Derives verdicts as pure functions over immutable evidence bundles and
//! defines the single failure signal handed back to grading scripts.

pub mod failure;
pub mod verdict;
