pub mod constraints;
pub mod details;
pub mod evaluator;
pub mod variants;
