//! Pinewright: natural-language to Pine Script generation.
//!
//! A staged pipeline turns a description (or a source document) into a
//! TradingView script, and a refinement session iterates on the result
//! conversationally. The completion service is reached through an injected
//! [`providers::LlmProvider`].
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;
pub mod pipeline;
pub mod providers;
