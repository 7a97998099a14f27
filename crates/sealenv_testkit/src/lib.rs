//! # SealEnv Testkit
//!
//! Test utilities for SealEnv.
//!
//! This crate provides:
//! - Test ciphers: index-keyed XOR, AES-256-GCM, failing and counting wrappers
//! - Fixtures for encrypted environments on disk and in memory
//! - Property-based test generators using proptest
//! - Fault injection for file system operations
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use sealenv_testkit::prelude::*;
//!
//! with_mem_env(|env| {
//!     let file = env.open_file(std::path::Path::new("000001.log")).unwrap();
//!     file.write_at(0, b"record").unwrap();
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ciphers;
pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ciphers::*;
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use sealenv_core::{BlockAccessCipherStream, FileSystem, RandomAccessFile};
}

pub use ciphers::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
