//! Section processors: each consumes one raw replay section and produces
//! an immutable analysis. All processors are pure functions.

pub mod state_diff;
pub mod token;
pub mod trace;
pub mod vm_trace;
