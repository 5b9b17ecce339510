//! Shared test utilities for wabridge integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring the router over a temp uploads dir and an
//!   in-memory database
//! - `FakeFetcher` serving canned attachment bytes
//! - Builders for webhook deliveries

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{FakeFetcher, TestHarness};
