//! Verum is a terminal client for a forensic chat assistant served by an
//! OpenAI-compatible API.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns hashing and document seals, response parsing, the
//!   streaming adapter, the conversation controller and case persistence.
//! - [`api`] defines the chat completion payloads sent to and read from the
//!   provider.
//! - [`cli`] parses arguments and drives the interactive and one-shot
//!   commands.
//! - [`utils`] holds URL helpers and the transcript log.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
