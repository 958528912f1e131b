//! CLI module for cutout-studio
//!
//! This module is only available when the "cli" feature is enabled.

mod backend_factory;
mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{main, Cli, CliBackground, CliOrientation};
