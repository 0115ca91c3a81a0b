//! Streaming signal processing module
//!
//! This module contains the per-channel history and statistics engine:
//! - Exponential smoothing filter ([`filter`])
//! - Derived metrics and window statistics ([`metrics`])
//! - Bounded history, filtering, and query surface ([`processor`])

pub mod filter;
pub mod metrics;
pub mod processor;
