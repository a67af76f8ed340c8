//! Transcript segmentation: splits a raw transcript into the question groups
//! the evaluation pipeline consumes.

pub mod handlers;
pub mod questions;
pub mod segmenter;
