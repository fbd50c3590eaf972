//! `mrp-domain`: types shared by the probe client and the CLI.

pub mod config;
pub mod error;
pub mod trace;
