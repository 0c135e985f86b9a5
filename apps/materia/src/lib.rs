//! # Materia
//!
//! Application layer over `materia-core`: the HTTP API, the CLI and
//! configuration loading. The binary in `main.rs` only installs logging and
//! dispatches to [`cli::execute`].

pub mod api;
pub mod cli;
pub mod config;
