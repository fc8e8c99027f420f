#![forbid(unsafe_code)]

//! `uci-gauntlet`: plays self-play matches between UCI chess engines and
//! checks every returned move for legality.

pub mod build;
pub mod config;
pub mod engine;
pub mod errors;
pub mod game;
pub mod runner;

pub use config::HarnessConfig;
pub use errors::{HarnessError, Result};
