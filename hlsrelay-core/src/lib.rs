// hlsrelay-core - shared configuration, logging and error types

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{Error, Result};
