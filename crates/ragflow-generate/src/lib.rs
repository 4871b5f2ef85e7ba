//! ragflow-generate
//!
//! Answer generation over retrieved context.

pub mod chat;
pub mod prompt;

pub use chat::ChatCompletionsGenerator;
pub use prompt::{build_prompt, NO_CONTEXT};
