pub mod handlers;
pub mod questions;
