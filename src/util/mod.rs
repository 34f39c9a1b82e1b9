//! Utility types for upkg.
//!
//! - [`Error`] / [`Result`] - Error taxonomy shared by the whole crate

pub mod error;

pub use error::{Error, Result};
