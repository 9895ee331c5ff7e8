//! Resource Implementations
//!
//! Implements the lifecycle operations for each resource type.

pub mod disk;

use pvedisk_common::Result;

use crate::client::DatastoreApi;
use crate::provider::Diagnostic;
use crate::schema::Schema;
use crate::state::DynamicValue;

/// Trait for resource operations
///
/// `create` and `read` return `None` when the resource no longer exists
/// remotely and should be dropped from state.
#[async_trait::async_trait]
pub trait Resource {
    /// Resource type name
    fn type_name() -> &'static str;

    fn schema() -> Schema;

    /// Validate a configuration block
    fn validate(config: &DynamicValue) -> Vec<Diagnostic> {
        Self::schema().validate(config)
    }

    /// Create a new resource
    async fn create(client: &dyn DatastoreApi, config: &DynamicValue) -> Result<Option<DynamicValue>>;

    /// Read an existing resource
    async fn read(client: &dyn DatastoreApi, state: &DynamicValue) -> Result<Option<DynamicValue>>;

    /// Update an existing resource
    async fn update(client: &dyn DatastoreApi, state: &DynamicValue, config: &DynamicValue) -> Result<DynamicValue>;

    /// Delete a resource
    async fn delete(client: &dyn DatastoreApi, state: &DynamicValue) -> Result<()>;

    /// Build the state of an existing resource from its identifier
    async fn import_state(client: &dyn DatastoreApi, id: &str) -> Result<DynamicValue>;
}
