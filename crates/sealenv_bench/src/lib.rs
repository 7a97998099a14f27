//! Benchmark helpers for SealEnv.

#![warn(missing_docs)]

pub mod utils;
