//! Unit tests - crate-level invariant checks over the public API.

mod invariant_tests;
mod write_plan_tests;
