//! Data model: error taxonomy and core types

pub mod errors;
pub mod types;
