//! # estatehub-core
//!
//! Core crate for the EstateHub background services. Contains the
//! configuration schema and the unified error system shared by every
//! other EstateHub crate.
//!
//! This crate has **no** internal dependencies on other EstateHub crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
