//! Configuration management for the session bootstrapper
//!
//! This module handles loading and merging configuration settings for both
//! library and CLI use.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::Settings;
