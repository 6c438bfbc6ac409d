//! # Contact Scout Common Library
//!
//! Shared code for the Contact Scout workspace:
//! - Error type and configuration loading
//! - Logging initialisation
//! - Push channel protocol and event bus
//! - Reconnecting client-side progress channel

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod progress;

pub use error::{Error, Result};
