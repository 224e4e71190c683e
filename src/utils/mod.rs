//! Utility functions for the fix pipeline
//!
//! Provides environment variable handling and API key validation.

pub mod env;

pub use env::{get_api_key, load_env, validate_api_key};
