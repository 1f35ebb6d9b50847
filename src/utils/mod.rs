//! Utilities
//!
//! - [`interner`]: global string interner backing shader define symbols

pub mod interner;
