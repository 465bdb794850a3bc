//! AI Integration Module for tcforge
//!
//! Generates and modifies test cases through an external AI command line
//! integration.

pub mod client;
pub mod prompts;
pub mod responses;

pub use client::{AiClient, AiError, AiMode};
pub use responses::{parse_generated_cases, parse_raw_cases, RawTestCase};
