//! Proxmox VE Disk Provider
//!
//! This crate implements an infrastructure-as-code provider resource that
//! manages virtual disk image files on Proxmox VE datastores.

pub mod client;
pub mod config;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod state;

pub use client::{DatastoreApi, ProxmoxClient};
pub use config::ProviderConfig;
pub use provider::{Diagnostic, PveProvider};
pub use resources::disk::{DiskResource, DiskState};
