//! Analysis core: security engine, risk scoring, fallback selection

pub mod fallback;
pub mod risk_score;
pub mod security;
