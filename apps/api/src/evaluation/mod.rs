//! Interview evaluation: per-group evaluation, holistic skills assessment,
//! merging, and the HTTP handlers that drive them.

pub mod evaluator;
pub mod handlers;
pub mod merger;
pub mod persistence;
pub mod pipeline;
pub mod prompts;
pub mod skills;
