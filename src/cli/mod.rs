//! Command-line interface modules
//!
//! Contains the interactive login mode driven by the `redfox` binary.

pub mod login;
