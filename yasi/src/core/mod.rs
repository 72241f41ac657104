//! Deterministic, pure logic shared by the idler.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod budget;
pub mod classifier;
pub mod entry;
pub mod target;
pub mod types;
