//! Client for the Proxmox VE datastore content API

use std::time::Duration;

use async_trait::async_trait;
use hyper::ext::ReasonPhrase;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use pvedisk_common::{
    ApiResponse, DatastoreFile, DatastoreFileCreateRequest, Error, Result,
};

use crate::config::ProviderConfig;

/// Remote operations the disk resource needs from a datastore
#[async_trait]
pub trait DatastoreApi: Send + Sync {
    /// Create a file and return its volume id (`<storage>:<name>`)
    async fn create_datastore_file(&self, request: &DatastoreFileCreateRequest) -> Result<String>;

    async fn get_datastore_file(
        &self,
        node_id: &str,
        storage_id: &str,
        name: &str,
    ) -> Result<DatastoreFile>;

    async fn delete_datastore_file(&self, node_id: &str, storage_id: &str, name: &str) -> Result<()>;
}

/// HTTP client for a Proxmox VE cluster
pub struct ProxmoxClient {
    http: reqwest::Client,
    endpoint: Url,
    api_token: Option<String>,
}

impl ProxmoxClient {
    /// Build a client from the provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::InvalidConfig("endpoint is required".to_string()))?;
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::InvalidConfig(format!("invalid endpoint {:?}: {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!("invalid endpoint {:?}", endpoint.as_str())));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            api_token: config.api_token.clone(),
        })
    }

    /// `.../nodes/{node}/storage/{storage}/content[/{name}]`, each segment percent-encoded
    fn content_url(&self, node_id: &str, storage_id: &str, name: Option<&str>) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidConfig(format!("invalid endpoint {:?}", self.endpoint.as_str())))?
            .pop_if_empty()
            .extend(["api2", "json", "nodes", node_id, "storage", storage_id, "content"])
            .extend(name);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.header(AUTHORIZATION, format!("PVEAPIToken={}", token)),
            None => builder,
        }
    }

    /// Send a request and unwrap the `data` envelope.
    ///
    /// `volume` names the file for not-found errors.
    async fn send<T: DeserializeOwned + Default>(
        &self,
        builder: RequestBuilder,
        volume: &str,
    ) -> Result<T> {
        let response = self.authorize(builder).send().await?;
        let status = response.status();

        if status.is_success() {
            let body: ApiResponse<T> = response.json().await?;
            return Ok(body.data);
        }

        // Proxmox puts the error message in the status line, not the body
        let reason = reason_phrase(&response);
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND
            || reason.contains("does not exist")
            || body.contains("does not exist")
        {
            return Err(Error::not_found("datastore file", volume));
        }

        let body = body.trim();
        let message = if body.is_empty() {
            reason
        } else {
            format!("{}: {}", reason, body)
        };
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn reason_phrase(response: &Response) -> String {
    response
        .extensions()
        .get::<ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| response.status().canonical_reason().map(str::to_string))
        .unwrap_or_default()
}

#[async_trait]
impl DatastoreApi for ProxmoxClient {
    async fn create_datastore_file(&self, request: &DatastoreFileCreateRequest) -> Result<String> {
        let url = self.content_url(&request.node_id, &request.storage_id, None)?;
        debug!("POST {} filename={} size={}", url, request.filename, request.size);

        let volume_id: String = self
            .send(self.http.post(url).form(request), &request.filename)
            .await?;
        if volume_id.is_empty() {
            return Err(Error::Internal(format!(
                "no volume id returned for {}",
                request.filename
            )));
        }

        Ok(volume_id)
    }

    async fn get_datastore_file(
        &self,
        node_id: &str,
        storage_id: &str,
        name: &str,
    ) -> Result<DatastoreFile> {
        let url = self.content_url(node_id, storage_id, Some(name))?;
        debug!("GET {}", url);

        self.send(self.http.get(url), name).await
    }

    async fn delete_datastore_file(&self, node_id: &str, storage_id: &str, name: &str) -> Result<()> {
        let url = self.content_url(node_id, storage_id, Some(name))?;
        debug!("DELETE {}", url);

        let _task: serde_json::Value = self.send(self.http.delete(url), name).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory datastore used by the lifecycle tests

    use std::collections::HashMap;

    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeDatastore {
        files: Mutex<HashMap<String, DatastoreFile>>,
        calls: Mutex<Vec<String>>,
        failure: Mutex<Option<String>>,
    }

    fn key(node_id: &str, storage_id: &str, name: &str) -> String {
        format!("{}/{}/{}", node_id, storage_id, name)
    }

    impl FakeDatastore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn insert(&self, node_id: &str, storage_id: &str, name: &str, file: DatastoreFile) {
            self.files.lock().await.insert(key(node_id, storage_id, name), file);
        }

        pub async fn contains(&self, node_id: &str, storage_id: &str, name: &str) -> bool {
            self.files.lock().await.contains_key(&key(node_id, storage_id, name))
        }

        /// Make every following call fail with a 500
        pub async fn fail_with(&self, message: &str) {
            *self.failure.lock().await = Some(message.to_string());
        }

        pub async fn calls(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }

        async fn record(&self, call: String) -> Result<()> {
            self.calls.lock().await.push(call);
            match self.failure.lock().await.as_ref() {
                Some(message) => Err(Error::Api {
                    status: 500,
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl DatastoreApi for FakeDatastore {
        async fn create_datastore_file(&self, request: &DatastoreFileCreateRequest) -> Result<String> {
            self.record(format!(
                "create {}/{}/{} size={} vmid={} format={:?}",
                request.node_id,
                request.storage_id,
                request.filename,
                request.size,
                request.vm_id,
                request.format
            ))
            .await?;

            let size_bytes = pvedisk_common::parse_size(&request.size)?;
            let format = request.format.clone().unwrap_or_else(|| "raw".to_string());
            let file = DatastoreFile {
                path: Some(format!(
                    "/var/lib/vz/images/{}/{}.{}",
                    request.vm_id, request.filename, format
                )),
                size_bytes: Some(size_bytes),
                format: Some(format),
                space_used: Some(0),
            };
            self.insert(&request.node_id, &request.storage_id, &request.filename, file)
                .await;

            Ok(format!("{}:{}", request.storage_id, request.filename))
        }

        async fn get_datastore_file(
            &self,
            node_id: &str,
            storage_id: &str,
            name: &str,
        ) -> Result<DatastoreFile> {
            self.record(format!("get {}/{}/{}", node_id, storage_id, name)).await?;

            self.files
                .lock()
                .await
                .get(&key(node_id, storage_id, name))
                .cloned()
                .ok_or_else(|| Error::not_found("datastore file", name))
        }

        async fn delete_datastore_file(&self, node_id: &str, storage_id: &str, name: &str) -> Result<()> {
            self.record(format!("delete {}/{}/{}", node_id, storage_id, name)).await?;

            self.files
                .lock()
                .await
                .remove(&key(node_id, storage_id, name))
                .map(|_| ())
                .ok_or_else(|| Error::not_found("datastore file", name))
        }
    }
}
