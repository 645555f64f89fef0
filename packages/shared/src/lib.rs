//! Shared utilities for the Kakehashi bridge: logging setup and time helpers.

pub mod logger;
pub mod time;
