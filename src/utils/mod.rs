//! Utility functions and helpers
//!
//! This module contains utility functions used throughout the application.

pub mod appstate;
pub mod version;

pub use appstate::{AppStateFile, get_appstate_path};
pub use version::{VERSION, get_version};
