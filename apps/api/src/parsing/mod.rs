//! Resilient parsing of model output.
//! Responses are expected to be JSON but may arrive truncated, fenced, or wrapped in prose.

pub mod repair;
pub mod structured;
