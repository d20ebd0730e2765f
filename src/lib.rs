//! Testsmith: automated browser tests from recorded UI actions.
//!
//! A recorded list of interactions and a free-text scenario become a
//! prompt ([`prompt`]), the prompt is sent to one of several LLM providers
//! ([`providers`]) and the answer is cleaned down to bare source code
//! ([`cleaner`]). [`generator`] ties the three together; [`templates`]
//! renders code offline without any model call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cleaner;
pub mod config;
pub mod framework;
pub mod generator;
pub mod logging;
pub mod prompt;
pub mod providers;
pub mod templates;
pub mod types;
pub mod usage;
