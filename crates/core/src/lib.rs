//! StyleSwap Core - Shared domain types.
//!
//! This crate provides the types and pricing rules used across all StyleSwap
//! components:
//! - `studio` - The HTTP service (generation, checkout, admin API)
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and lets the pricing rules
//! be tested in isolation.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, credentials, coupons, styles and quotes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
