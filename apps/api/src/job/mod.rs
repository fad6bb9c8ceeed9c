//! Job description resolution: pasted text is used as is, screenshots are
//! read by the multimodal completion model.

pub mod handlers;
pub mod prompts;
pub mod resolver;
