//! Shared utilities: static tables, TTL cache, input validation

pub mod cache;
pub mod constants;
pub mod validation;
