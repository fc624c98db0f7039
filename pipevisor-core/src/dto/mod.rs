//! Data Transfer Objects for the management API

pub mod pipeline;
