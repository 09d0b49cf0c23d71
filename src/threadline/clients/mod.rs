//! Provider client implementations.

pub mod common;
pub mod openai;
