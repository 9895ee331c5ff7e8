//! pvedisk Common Library
//!
//! Shared error type, Proxmox datastore wire types and size helpers.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// pvedisk version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default directory for provider files
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".pvedisk")
}

/// Default provider configuration file
pub fn default_config_path() -> std::path::PathBuf {
    default_store_path().join("config.toml")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
