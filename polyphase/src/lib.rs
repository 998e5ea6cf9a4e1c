//! polyphase - an autonomous multi-phase software development orchestrator.
//!
//! The binary entry point lives in `main.rs`; this library crate hosts the
//! orchestration engine itself so `tests/integration_test.rs` and the
//! `polyphase` binary share one implementation.

pub mod analysis;
pub mod config;
pub mod conversation;
pub mod coordinator;
pub mod domain;
pub mod errors;
pub mod llm;
pub mod loopdetect;
pub mod mailbox;
pub mod phase_runner;
pub mod phases;
pub mod tools;
pub mod verifier;

pub use errors::{ExitCode, PipelineError};
