//! Document fetching and parsing.
//!
//! This module provides:
//! - [`DocumentLoader`]: fetches one URL with merged default headers and
//!   returns the status code plus raw body.
//! - [`WebDocument`]: the parsed, queryable form handed to the inspectors,
//!   rebuilt on every tick.

mod loader;
mod web;

pub use loader::DocumentLoader;
pub use web::{NodeCapture, WebDocument};
