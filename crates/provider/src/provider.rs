//! Proxmox VE Disk Provider Implementation
//!
//! Routes orchestrator calls to resource implementations by type name and
//! turns every failure into a diagnostic.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use pvedisk_common::Error;

use crate::client::{DatastoreApi, ProxmoxClient};
use crate::config::ProviderConfig;
use crate::resources::{disk::DiskResource, Resource};
use crate::schema::{self, Schema};
use crate::state::DynamicValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
}

/// A problem reported back to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn from_error(summary: impl Into<String>, err: &Error) -> Self {
        Self {
            attribute: err.attribute().map(str::to_string),
            ..Self::error(summary, err.to_string())
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderSchema {
    pub provider: Schema,
    pub resource_schemas: HashMap<String, Schema>,
}

/// Outcome of reading, creating or updating a resource.
///
/// `new_state` is `None` when the resource is gone or the call failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateResponse {
    pub new_state: Option<DynamicValue>,
    pub diagnostics: Vec<Diagnostic>,
}

impl StateResponse {
    fn failed(diagnostic: Diagnostic) -> Self {
        Self {
            new_state: None,
            diagnostics: vec![diagnostic],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResponse {
    pub imported_resources: Vec<ImportedResource>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedResource {
    pub type_name: String,
    pub state: DynamicValue,
}

/// Proxmox VE disk provider
pub struct PveProvider {
    /// Client for the Proxmox API, set by `configure_provider`
    client: Arc<RwLock<Option<Arc<dyn DatastoreApi>>>>,
    /// Settings from the config file and environment
    config: Arc<RwLock<ProviderConfig>>,
}

impl PveProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Arc::new(RwLock::new(None)),
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Provider with an already connected client
    pub fn with_client(client: Arc<dyn DatastoreApi>) -> Self {
        Self {
            client: Arc::new(RwLock::new(Some(client))),
            config: Arc::new(RwLock::new(ProviderConfig::default())),
        }
    }

    async fn get_client(&self) -> Result<Arc<dyn DatastoreApi>, Diagnostic> {
        self.client.read().await.clone().ok_or_else(|| {
            Diagnostic::error(
                "Provider not configured",
                "configure_provider must succeed before resources can be managed",
            )
        })
    }

    pub fn get_provider_schema(&self) -> ProviderSchema {
        info!("GetProviderSchema called");

        ProviderSchema {
            provider: schema::provider_schema(),
            resource_schemas: [(DiskResource::type_name().to_string(), DiskResource::schema())]
                .into_iter()
                .collect(),
        }
    }

    pub async fn configure_provider(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        info!("ConfigureProvider called");

        let mut settings = self.config.read().await.clone();
        if let Err(e) = settings.merge(config) {
            return vec![Diagnostic::from_error("Invalid provider configuration", &e)];
        }

        let client = match ProxmoxClient::new(&settings) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to build Proxmox client: {}", e);
                return vec![Diagnostic::from_error(
                    "Failed to configure Proxmox VE client",
                    &e,
                )];
            }
        };

        info!(
            "Using Proxmox VE endpoint {}",
            settings.endpoint.as_deref().unwrap_or_default()
        );
        *self.client.write().await = Some(Arc::new(client));
        *self.config.write().await = settings;

        vec![]
    }

    pub fn validate_resource_config(&self, type_name: &str, config: &DynamicValue) -> Vec<Diagnostic> {
        debug!("ValidateResourceConfig called for {}", type_name);

        match type_name {
            t if t == DiskResource::type_name() => DiskResource::validate(config),
            _ => vec![unknown_type(type_name)],
        }
    }

    pub async fn read_resource(&self, type_name: &str, current_state: &DynamicValue) -> StateResponse {
        info!("ReadResource called for {}", type_name);

        let client = match self.get_client().await {
            Ok(client) => client,
            Err(d) => return StateResponse::failed(d),
        };

        let result = match type_name {
            t if t == DiskResource::type_name() => DiskResource::read(client.as_ref(), current_state).await,
            _ => return StateResponse::failed(unknown_type(type_name)),
        };

        match result {
            Ok(new_state) => StateResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => StateResponse::failed(Diagnostic::from_error("Failed to read resource", &e)),
        }
    }

    /// Create, update or delete depending on which of the states are null
    pub async fn apply_resource_change(
        &self,
        type_name: &str,
        prior_state: &DynamicValue,
        planned_state: &DynamicValue,
    ) -> StateResponse {
        info!("ApplyResourceChange called for {}", type_name);

        if type_name != DiskResource::type_name() {
            return StateResponse::failed(unknown_type(type_name));
        }

        let client = match self.get_client().await {
            Ok(client) => client,
            Err(d) => return StateResponse::failed(d),
        };
        let client = client.as_ref();

        let result = match (prior_state.is_null(), planned_state.is_null()) {
            // Create
            (true, false) => DiskResource::create(client, planned_state).await,
            // Delete
            (false, true) => DiskResource::delete(client, prior_state).await.map(|_| None),
            // Update
            (false, false) => DiskResource::update(client, prior_state, planned_state)
                .await
                .map(Some),
            // No change
            (true, true) => Ok(None),
        };

        match result {
            Ok(new_state) => StateResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => {
                error!("Failed to apply {} change: {}", type_name, e);
                StateResponse::failed(Diagnostic::from_error("Failed to apply resource change", &e))
            }
        }
    }

    pub async fn import_resource_state(&self, type_name: &str, id: &str) -> ImportResponse {
        info!("ImportResourceState called for {} with ID {}", type_name, id);

        let client = match self.get_client().await {
            Ok(client) => client,
            Err(d) => {
                return ImportResponse {
                    imported_resources: vec![],
                    diagnostics: vec![d],
                }
            }
        };

        let state = match type_name {
            t if t == DiskResource::type_name() => DiskResource::import_state(client.as_ref(), id).await,
            _ => {
                return ImportResponse {
                    imported_resources: vec![],
                    diagnostics: vec![unknown_type(type_name)],
                }
            }
        };

        match state {
            Ok(state) => ImportResponse {
                imported_resources: vec![ImportedResource {
                    type_name: type_name.to_string(),
                    state,
                }],
                diagnostics: vec![],
            },
            Err(e) => ImportResponse {
                imported_resources: vec![],
                diagnostics: vec![Diagnostic::from_error("Failed to import resource", &e)],
            },
        }
    }

    pub fn stop_provider(&self) {
        info!("StopProvider called");
    }
}

fn unknown_type(type_name: &str) -> Diagnostic {
    Diagnostic::error(
        "Unknown resource type",
        format!("Unknown resource type: {}", type_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::FakeDatastore;
    use crate::resources::disk::TYPE_NAME;
    use crate::state::{int_value, make_state, string_value};

    fn planned_disk() -> DynamicValue {
        make_state(vec![
            ("suffix", string_value("disk-0")),
            ("node_id", string_value("pve")),
            ("storage_id", string_value("local")),
            ("size", string_value("2G")),
            ("vm_id", int_value(100)),
        ])
    }

    fn provider() -> (PveProvider, Arc<FakeDatastore>) {
        let fake = Arc::new(FakeDatastore::new());
        (PveProvider::with_client(fake.clone()), fake)
    }

    #[test]
    fn test_schema_lists_disk_resource() {
        let (provider, _) = provider();
        let schema = provider.get_provider_schema();

        assert!(schema.resource_schemas.contains_key(TYPE_NAME));
        assert!(schema.provider.attribute("endpoint").is_some());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_reports_diagnostic() {
        let provider = PveProvider::new(ProviderConfig::default());

        let response = provider.read_resource(TYPE_NAME, &planned_disk()).await;
        assert!(response.new_state.is_none());
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn test_configure_requires_endpoint() {
        let provider = PveProvider::new(ProviderConfig::default());

        let diagnostics = provider.configure_provider(&DynamicValue::Null).await;
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.contains("endpoint"));

        let config = make_state(vec![("endpoint", string_value("https://pve:8006"))]);
        assert!(provider.configure_provider(&config).await.is_empty());
        assert!(provider.get_client().await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let (provider, _) = provider();

        let response = provider
            .apply_resource_change("proxmox_virtual_environment_vm", &DynamicValue::Null, &planned_disk())
            .await;
        assert_eq!(response.diagnostics[0].summary, "Unknown resource type");
        assert_eq!(
            provider.validate_resource_config("nope", &planned_disk())[0].summary,
            "Unknown resource type"
        );
    }

    #[tokio::test]
    async fn test_apply_dispatches_lifecycle() {
        let (provider, fake) = provider();

        let created = provider
            .apply_resource_change(TYPE_NAME, &DynamicValue::Null, &planned_disk())
            .await;
        assert!(created.diagnostics.is_empty());
        let state = created.new_state.unwrap();
        assert_eq!(
            state.get("id").and_then(|v| v.as_string()),
            Some("pve:local:vm-100-disk-0")
        );

        let updated = provider.apply_resource_change(TYPE_NAME, &state, &state).await;
        assert!(updated.new_state.is_none());
        assert_eq!(updated.diagnostics[0].detail, "Cannot update a disk in-place");

        let deleted = provider
            .apply_resource_change(TYPE_NAME, &state, &DynamicValue::Null)
            .await;
        assert!(deleted.diagnostics.is_empty());
        assert!(deleted.new_state.is_none());
        assert!(!fake.contains("pve", "local", "vm-100-disk-0").await);

        let gone = provider.read_resource(TYPE_NAME, &state).await;
        assert!(gone.diagnostics.is_empty());
        assert!(gone.new_state.is_none());
    }

    #[tokio::test]
    async fn test_apply_reports_invalid_config() {
        let (provider, fake) = provider();
        let mut planned = planned_disk();
        planned.set("size", DynamicValue::Null);

        let response = provider
            .apply_resource_change(TYPE_NAME, &DynamicValue::Null, &planned)
            .await;
        assert_eq!(response.diagnostics[0].attribute.as_deref(), Some("size"));
        assert!(fake.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_import_resource_state() {
        let (provider, _) = provider();
        provider
            .apply_resource_change(TYPE_NAME, &DynamicValue::Null, &planned_disk())
            .await;

        let response = provider
            .import_resource_state(TYPE_NAME, "pve:local:vm-100-disk-0")
            .await;
        assert!(response.diagnostics.is_empty());
        let state = &response.imported_resources[0].state;
        assert_eq!(state.get("size").and_then(|v| v.as_string()), Some("2G"));
        assert_eq!(state.get("suffix").and_then(|v| v.as_string()), Some("disk-0"));

        let bad = provider.import_resource_state(TYPE_NAME, "pve-only").await;
        assert!(bad.imported_resources.is_empty());
        assert_eq!(bad.diagnostics[0].summary, "Failed to import resource");
    }

    #[test]
    fn test_diagnostic_wire_format() {
        let diagnostic = Diagnostic::from_error("Invalid disk size", &Error::invalid_attribute("size", "must not be empty"));

        assert_eq!(
            serde_json::to_value(&diagnostic).unwrap(),
            serde_json::json!({
                "severity": "error",
                "summary": "Invalid disk size",
                "detail": diagnostic.detail,
                "attribute": "size",
            })
        );
    }
}
