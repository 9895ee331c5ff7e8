//! Datastore disk image resource
//!
//! A disk is a virtual disk image file named `vm-<vm_id>-<suffix>` on a
//! storage pool of a cluster node. Its identity is `<node>:<volume id>`,
//! where the volume id the API hands back is `<storage>:<name>`.
//!
//! Every configurable attribute forces replacement, so there is no in-place
//! update: `update` always fails.

use std::str::FromStr;

use tracing::{debug, info, warn};

use pvedisk_common::{
    format_size, parse_size, DatastoreFile, DatastoreFileCreateRequest, Error, Result, GIB, MIB,
};

use super::Resource;
use crate::client::DatastoreApi;
use crate::provider::Diagnostic;
use crate::schema::{self, Schema};
use crate::state::{
    get_optional_int_attr, get_optional_string_attr, get_required_string_attr, int_value,
    make_state, optional_string_value, optional_uint_value, string_value, DynamicValue,
};

pub const TYPE_NAME: &str = "proxmox_virtual_environment_disk";
pub const DEFAULT_VM_ID: u32 = 999;
pub const DEFAULT_FORMAT: &str = "raw";

/// File name of a disk owned by `vm_id`
pub fn disk_name(vm_id: u32, suffix: &str) -> String {
    format!("vm-{}-{}", vm_id, suffix)
}

/// Typed attribute set of one disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskState {
    /// `<node>:<storage>:<name>`; `None` once the disk is gone
    pub id: Option<String>,
    pub suffix: String,
    pub name: Option<String>,
    pub node_id: String,
    pub storage_id: String,
    pub size: String,
    pub vm_id: u32,
    /// `None` leaves the choice to the datastore
    pub format: Option<String>,
    pub path: Option<String>,
    pub space_used: Option<u64>,
    pub size_bytes: Option<u64>,
    pub size_mb: Option<u64>,
    pub size_gb: Option<u64>,
}

impl DiskState {
    pub fn new(
        node_id: impl Into<String>,
        storage_id: impl Into<String>,
        suffix: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            suffix: suffix.into(),
            name: None,
            node_id: node_id.into(),
            storage_id: storage_id.into(),
            size: size.into(),
            vm_id: DEFAULT_VM_ID,
            format: None,
            path: None,
            space_used: None,
            size_bytes: None,
            size_mb: None,
            size_gb: None,
        }
    }

    /// Decode an attribute map as stored in state.
    ///
    /// Values are taken as recorded; only planned configuration goes
    /// through [`DiskState::from_config`].
    pub fn from_value(value: &DynamicValue) -> Result<Self> {
        let size = get_required_string_attr(value, "size")?;
        let vm_id = match get_optional_int_attr(value, "vm_id")? {
            None => DEFAULT_VM_ID,
            Some(id) => u32::try_from(id)
                .map_err(|_| Error::invalid_attribute("vm_id", format!("{} is not a valid VM id", id)))?,
        };

        Ok(Self {
            id: get_optional_string_attr(value, "id"),
            suffix: get_required_string_attr(value, "suffix")?,
            name: get_optional_string_attr(value, "name"),
            node_id: get_required_string_attr(value, "node_id")?,
            storage_id: get_required_string_attr(value, "storage_id")?,
            size,
            vm_id,
            format: get_optional_string_attr(value, "format"),
            path: get_optional_string_attr(value, "path"),
            space_used: get_optional_uint_attr(value, "space_used")?,
            size_bytes: get_optional_uint_attr(value, "size_bytes")?,
            size_mb: get_optional_uint_attr(value, "size_mb")?,
            size_gb: get_optional_uint_attr(value, "size_gb")?,
        })
    }

    /// Decode planned configuration and check the values a create would send
    pub fn from_config(value: &DynamicValue) -> Result<Self> {
        let disk = Self::from_value(value)?;
        parse_size(&disk.size)?;
        if disk.vm_id == 0 {
            return Err(Error::invalid_attribute("vm_id", "0 is not a valid VM id"));
        }
        Ok(disk)
    }

    pub fn to_value(&self) -> DynamicValue {
        make_state(vec![
            ("id", optional_string_value(self.id.as_deref())),
            ("suffix", string_value(&self.suffix)),
            ("name", optional_string_value(self.name.as_deref())),
            ("node_id", string_value(&self.node_id)),
            ("storage_id", string_value(&self.storage_id)),
            ("size", string_value(&self.size)),
            ("vm_id", int_value(i64::from(self.vm_id))),
            ("format", string_value(self.format.as_deref().unwrap_or(DEFAULT_FORMAT))),
            ("path", optional_string_value(self.path.as_deref())),
            ("space_used", optional_uint_value(self.space_used)),
            ("size_bytes", optional_uint_value(self.size_bytes)),
            ("size_mb", optional_uint_value(self.size_mb)),
            ("size_gb", optional_uint_value(self.size_gb)),
        ])
    }

    /// Stored name, or the one derived from vm id and suffix
    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| disk_name(self.vm_id, &self.suffix))
    }

    fn apply_file(&mut self, file: &DatastoreFile) {
        if let Some(bytes) = file.size_bytes {
            self.size_bytes = Some(bytes);
            self.size_mb = Some(bytes / MIB);
            self.size_gb = Some(bytes / GIB);
        }
        if file.format.is_some() {
            self.format = file.format.clone();
        }
        self.path = file.path.clone();
        self.space_used = file.space_used;
    }
}

fn get_optional_uint_attr(value: &DynamicValue, key: &str) -> Result<Option<u64>> {
    get_optional_int_attr(value, key)?
        .map(|n| u64::try_from(n).map_err(|_| Error::invalid_attribute(key, "must not be negative")))
        .transpose()
}

/// Parsed import identifier `<node>:<storage>:vm-<vm_id>-<suffix>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskId {
    pub node_id: String,
    pub storage_id: String,
    pub name: String,
    pub vm_id: u32,
    pub suffix: String,
}

impl FromStr for DiskId {
    type Err = Error;

    fn from_str(id: &str) -> Result<Self> {
        let parts: Vec<&str> = id.splitn(3, ':').collect();
        let [node_id, storage_id, name] = parts[..] else {
            return Err(Error::malformed_id(id, "expected <node>:<storage>:<name>"));
        };
        if node_id.is_empty() || storage_id.is_empty() || name.is_empty() {
            return Err(Error::malformed_id(id, "node, storage and name must not be empty"));
        }

        let name_parts: Vec<&str> = name.splitn(3, '-').collect();
        let ["vm", vm_id, suffix] = name_parts[..] else {
            return Err(Error::malformed_id(id, "expected a name of the form vm-<vm_id>-<suffix>"));
        };
        let vm_id: u32 = vm_id
            .parse()
            .map_err(|_| Error::malformed_id(id, format!("{:?} is not a VM id", vm_id)))?;
        if suffix.is_empty() {
            return Err(Error::malformed_id(id, "suffix must not be empty"));
        }

        Ok(Self {
            node_id: node_id.to_string(),
            storage_id: storage_id.to_string(),
            name: name.to_string(),
            vm_id,
            suffix: suffix.to_string(),
        })
    }
}

/// Create the disk file, then refresh computed attributes from the datastore.
///
/// The generated name is stored before the remote call, so it is visible
/// even when creation fails.
pub async fn create_disk(client: &dyn DatastoreApi, disk: &mut DiskState) -> Result<()> {
    let name = disk_name(disk.vm_id, &disk.suffix);
    disk.name = Some(name.clone());

    let request = DatastoreFileCreateRequest {
        filename: name,
        node_id: disk.node_id.clone(),
        storage_id: disk.storage_id.clone(),
        size: disk.size.clone(),
        vm_id: disk.vm_id,
        format: disk.format.clone(),
    };

    info!(
        "Creating disk {} ({}) on {}/{}",
        request.filename, request.size, request.node_id, request.storage_id
    );
    let volume_id = client.create_datastore_file(&request).await?;

    disk.id = Some(format!("{}:{}", disk.node_id, volume_id));
    read_disk(client, disk).await
}

/// Refresh computed attributes; clears the identity if the file is gone
pub async fn read_disk(client: &dyn DatastoreApi, disk: &mut DiskState) -> Result<()> {
    let name = disk.name();
    debug!("Reading disk {} on {}/{}", name, disk.node_id, disk.storage_id);

    match client
        .get_datastore_file(&disk.node_id, &disk.storage_id, &name)
        .await
    {
        Ok(file) => {
            disk.name = Some(name);
            disk.apply_file(&file);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            warn!("Disk {} no longer exists, removing from state", name);
            disk.id = None;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub async fn update_disk(_client: &dyn DatastoreApi, _disk: &mut DiskState) -> Result<()> {
    Err(update_not_supported())
}

fn update_not_supported() -> Error {
    Error::UpdateNotSupported {
        kind: "disk".to_string(),
    }
}

/// Delete the disk file. A file that is already gone counts as deleted.
pub async fn delete_disk(client: &dyn DatastoreApi, disk: &mut DiskState) -> Result<()> {
    let name = disk.name();
    info!("Deleting disk {} on {}/{}", name, disk.node_id, disk.storage_id);

    match client
        .delete_datastore_file(&disk.node_id, &disk.storage_id, &name)
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_not_found() => debug!("Disk {} already deleted", name),
        Err(e) => return Err(e),
    }

    disk.id = None;
    Ok(())
}

/// Rebuild the full state of an existing disk from its identifier
pub async fn import_disk(client: &dyn DatastoreApi, id: &str) -> Result<DiskState> {
    let parsed: DiskId = id.parse()?;
    info!("Importing disk {}", id);

    let file = client
        .get_datastore_file(&parsed.node_id, &parsed.storage_id, &parsed.name)
        .await?;
    let size_bytes = file.size_bytes.ok_or_else(|| {
        Error::Internal(format!("datastore file {} reported no size", parsed.name))
    })?;

    let mut disk = DiskState {
        id: Some(id.to_string()),
        name: Some(parsed.name),
        vm_id: parsed.vm_id,
        ..DiskState::new(parsed.node_id, parsed.storage_id, parsed.suffix, format_size(size_bytes))
    };
    disk.apply_file(&file);

    Ok(disk)
}

pub struct DiskResource;

#[async_trait::async_trait]
impl Resource for DiskResource {
    fn type_name() -> &'static str {
        TYPE_NAME
    }

    fn schema() -> Schema {
        schema::disk_schema()
    }

    fn validate(config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Self::schema().validate(config);
        // an empty size is already reported as missing
        let size = config.get("size").and_then(|v| v.as_string()).filter(|s| !s.is_empty());
        if let Some(Err(e)) = size.map(parse_size) {
            diagnostics.push(Diagnostic::from_error("Invalid disk size", &e));
        }
        diagnostics
    }

    async fn create(client: &dyn DatastoreApi, config: &DynamicValue) -> Result<Option<DynamicValue>> {
        let mut disk = DiskState::from_config(config)?;
        create_disk(client, &mut disk).await?;
        Ok(disk.id.is_some().then(|| disk.to_value()))
    }

    async fn read(client: &dyn DatastoreApi, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let mut disk = DiskState::from_value(state)?;
        read_disk(client, &mut disk).await?;
        Ok(disk.id.is_some().then(|| disk.to_value()))
    }

    async fn update(_client: &dyn DatastoreApi, _state: &DynamicValue, _config: &DynamicValue) -> Result<DynamicValue> {
        Err(update_not_supported())
    }

    async fn delete(client: &dyn DatastoreApi, state: &DynamicValue) -> Result<()> {
        let mut disk = DiskState::from_value(state)?;
        delete_disk(client, &mut disk).await
    }

    async fn import_state(client: &dyn DatastoreApi, id: &str) -> Result<DynamicValue> {
        Ok(import_disk(client, id).await?.to_value())
    }
}
