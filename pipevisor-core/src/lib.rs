//! Pipevisor Core
//!
//! Core types shared by the Pipevisor agent, client and CLI.
//!
//! This crate contains:
//! - Domain types: pipeline representation, host report, capability catalog
//! - DTOs: request bodies for the management API

pub mod domain;
pub mod dto;
