//! Cover letter writing and the end-to-end generation pipeline.

pub mod generator;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
