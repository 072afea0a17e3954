//! Configuration module for dbvault
//!
//! Configuration is read once from environment variables into an explicit
//! [`Settings`] value which is then handed to the orchestrators.

pub mod settings;

pub use settings::{DatabaseTarget, RetentionPolicy, Settings};
