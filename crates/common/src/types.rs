//! Core types for pvedisk

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// Request body for creating a file on a datastore.
///
/// `node_id` and `storage_id` address the datastore and travel in the URL
/// path, so they are not part of the form body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatastoreFileCreateRequest {
    pub filename: String,
    #[serde(skip)]
    pub node_id: String,
    #[serde(skip)]
    pub storage_id: String,
    /// Size in kilobytes, or with an `M`/`G` suffix
    pub size: String,
    #[serde(rename = "vmid")]
    pub vm_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// A file as reported by the datastore content API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreFile {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, rename = "size")]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default, rename = "used")]
    pub space_used: Option<u64>,
}

/// Envelope wrapping every Proxmox API response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub data: T,
}

/// Parse a size quantity into bytes.
///
/// Without a suffix the quantity is in kilobytes. `K`, `M` and `G`
/// (either case) select kilobytes, megabytes and gigabytes.
pub fn parse_size(size: &str) -> Result<u64> {
    let trimmed = size.trim();
    let (digits, unit) = match trimmed.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => {
            let unit = match c.to_ascii_uppercase() {
                'K' => KIB,
                'M' => MIB,
                'G' => GIB,
                other => {
                    return Err(Error::invalid_attribute(
                        "size",
                        format!("unknown unit suffix '{other}', expected K, M or G"),
                    ))
                }
            };
            (&trimmed[..idx], unit)
        }
        Some(_) => (trimmed, KIB),
        None => return Err(Error::invalid_attribute("size", "must not be empty")),
    };

    let quantity: u64 = digits.parse().map_err(|_| {
        Error::invalid_attribute("size", format!("{size:?} is not a whole number"))
    })?;
    if quantity == 0 {
        return Err(Error::invalid_attribute("size", "must be greater than zero"));
    }

    quantity
        .checked_mul(unit)
        .ok_or_else(|| Error::invalid_attribute("size", format!("{size:?} is too large")))
}

/// Render a byte count as the shortest size string that reproduces it.
pub fn format_size(bytes: u64) -> String {
    if bytes != 0 && bytes % GIB == 0 {
        format!("{}G", bytes / GIB)
    } else if bytes != 0 && bytes % MIB == 0 {
        format!("{}M", bytes / MIB)
    } else {
        bytes.to_string()
    }
}
