//! Prompt templating and assembly

mod assembler;
pub mod template;

pub use assembler::{Prompt, PromptAssembler};
