//! Network layer: JSON-RPC transport and the replay client

pub mod replay;
pub mod rpc;
