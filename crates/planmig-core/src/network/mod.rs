//! Network utilities for the REST store API.
//!
//! This module provides:
//! - Retry logic with exponential backoff
//! - HTTP client bound to one PostgREST-style store

mod client;
mod retry;

pub use client::RestClient;
pub use retry::{retry_async, RetryConfig, RetryStats};
