// src/types/mod.rs

pub mod input_kinds;
pub mod responses;

pub use input_kinds::InputCategory;
pub use responses::*;
