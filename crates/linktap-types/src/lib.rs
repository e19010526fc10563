//! Pure data types for the linktap LinkedIn Ads tap.
//!
//! Kept free of I/O so the engine, state, and client crates can share
//! them without circular dependencies.

#![warn(clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod state;
pub mod stream;
