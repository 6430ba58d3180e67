//! Scenario Identifier Module
//!
//! Synthesizes compact, unique, format-constrained scenario identifiers
//! from requirement text via LLM component extraction.

mod generator;

pub use generator::{ScenarioIdComponents, ScenarioIdError, ScenarioIdGenerator};
