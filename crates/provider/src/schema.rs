//! Resource and provider schemas
//!
//! Declares every attribute with its type, requiredness, replacement
//! behaviour and default, and validates configuration against it.

use serde::Serialize;

use crate::provider::Diagnostic;
use crate::state::{bool_value, int_value, string_value, DynamicValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Number,
    Bool,
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeType::String => write!(f, "string"),
            AttributeType::Number => write!(f, "number"),
            AttributeType::Bool => write!(f, "bool"),
        }
    }
}

impl AttributeType {
    fn matches(self, value: &DynamicValue) -> bool {
        match self {
            AttributeType::String => value.as_string().is_some(),
            AttributeType::Number => value.as_i64().is_some(),
            AttributeType::Bool => value.as_bool().is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: AttributeType,
    pub description: &'static str,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    /// Changing the value replaces the resource
    pub force_new: bool,
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DynamicValue>,
}

impl Attribute {
    fn new(name: &'static str, ty: AttributeType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            description,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
        }
    }

    pub fn required(name: &'static str, ty: AttributeType, description: &'static str) -> Self {
        Self { required: true, ..Self::new(name, ty, description) }
    }

    pub fn optional(name: &'static str, ty: AttributeType, description: &'static str) -> Self {
        Self { optional: true, ..Self::new(name, ty, description) }
    }

    pub fn computed(name: &'static str, ty: AttributeType, description: &'static str) -> Self {
        Self { computed: true, ..Self::new(name, ty, description) }
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, value: DynamicValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Only the provider may set this attribute
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub version: i64,
    pub description: &'static str,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn required_attributes(&self) -> Vec<&'static str> {
        self.names(|a| a.required)
    }

    pub fn optional_attributes(&self) -> Vec<&'static str> {
        self.names(|a| a.optional)
    }

    pub fn computed_attributes(&self) -> Vec<&'static str> {
        self.names(|a| a.computed)
    }

    pub fn force_new_attributes(&self) -> Vec<&'static str> {
        self.names(|a| a.force_new)
    }

    fn names(&self, filter: impl Fn(&Attribute) -> bool) -> Vec<&'static str> {
        self.attributes.iter().filter(|a| filter(a)).map(|a| a.name).collect()
    }

    /// Check a configuration block against the schema
    pub fn validate(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let Some(map) = config.as_map() else {
            return vec![Diagnostic::error(
                "Invalid configuration",
                "Expected an object of attributes",
            )];
        };

        let mut diagnostics = Vec::new();

        for attr in &self.attributes {
            match config.get(attr.name) {
                None => {
                    if attr.required {
                        diagnostics.push(missing_argument(attr.name));
                    }
                }
                Some(_) if attr.is_read_only() => {
                    diagnostics.push(
                        Diagnostic::error(
                            "Value for unconfigurable attribute",
                            format!("Can't configure a value for \"{}\": its value will be decided automatically", attr.name),
                        )
                        .with_attribute(attr.name),
                    );
                }
                Some(value) if !attr.ty.matches(value) => {
                    diagnostics.push(
                        Diagnostic::error(
                            "Incorrect attribute value type",
                            format!("Attribute \"{}\" must be a {}", attr.name, attr.ty),
                        )
                        .with_attribute(attr.name),
                    );
                }
                Some(DynamicValue::String(s)) if attr.required && s.is_empty() => {
                    diagnostics.push(missing_argument(attr.name));
                }
                Some(_) => {}
            }
        }

        let mut unknown: Vec<&String> = map
            .keys()
            .filter(|key| self.attribute(key).is_none())
            .collect();
        unknown.sort();
        for key in unknown {
            diagnostics.push(
                Diagnostic::error(
                    "Unsupported argument",
                    format!("An argument named \"{}\" is not expected here", key),
                )
                .with_attribute(key.as_str()),
            );
        }

        diagnostics
    }
}

fn missing_argument(name: &str) -> Diagnostic {
    Diagnostic::error(
        "Missing required argument",
        format!("The argument \"{}\" is required, but no definition was found.", name),
    )
    .with_attribute(name)
}

/// Provider configuration block
pub fn provider_schema() -> Schema {
    use AttributeType::*;

    Schema {
        version: 0,
        description: "Proxmox VE datastore disk provider",
        attributes: vec![
            Attribute::optional("endpoint", String, "The Proxmox VE API endpoint, e.g. https://pve.example.com:8006"),
            Attribute::optional("api_token", String, "API token in the form USER@REALM!TOKENID=SECRET").sensitive(),
            Attribute::optional("insecure", Bool, "Skip TLS certificate verification")
                .with_default(bool_value(false)),
            Attribute::optional("timeout_seconds", Number, "HTTP request timeout in seconds")
                .with_default(int_value(60)),
        ],
    }
}

/// Datastore disk image resource
pub fn disk_schema() -> Schema {
    use crate::resources::disk::{DEFAULT_FORMAT, DEFAULT_VM_ID};
    use AttributeType::*;

    Schema {
        version: 0,
        description: "A virtual disk image file on a Proxmox VE datastore",
        attributes: vec![
            Attribute::computed("id", String, "ID of the disk in the format <node>:<datastore>:vm-<vmid>-<suffix>"),
            Attribute::required("suffix", String, "The name of the file to create").force_new(),
            Attribute::computed("name", String, "Generated disk name, vm-<vm_id>-<suffix>"),
            Attribute::required("node_id", String, "The cluster node name").force_new(),
            Attribute::required("storage_id", String, "The storage identifier").force_new(),
            Attribute::required(
                "size",
                String,
                "Size in kilobyte (1024 bytes). Optional suffixes 'M' (megabyte, 1024K) and 'G' (gigabyte, 1024M)",
            )
            .force_new(),
            Attribute::optional("vm_id", Number, "Specify owner VM")
                .with_default(int_value(i64::from(DEFAULT_VM_ID)))
                .force_new(),
            Attribute::optional("format", String, "Disk image format")
                .with_default(string_value(DEFAULT_FORMAT))
                .force_new(),
            Attribute::computed("path", String, "Filesystem path of the disk image"),
            Attribute::computed("space_used", Number, "Space used by the disk image in bytes"),
            Attribute::computed("size_bytes", Number, "Disk size in bytes"),
            Attribute::computed("size_mb", Number, "Disk size in megabytes"),
            Attribute::computed("size_gb", Number, "Disk size in gigabytes"),
        ],
    }
}
