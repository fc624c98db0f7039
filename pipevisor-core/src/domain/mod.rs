//! Core domain types
//!
//! These structures are produced by the agent and consumed by the client
//! and CLI. They are the wire representation of the agent's state.

pub mod capabilities;
pub mod host;
pub mod pipeline;
