//! JSON-lines request loop
//!
//! Each input line is one request object tagged by `method`; each request
//! gets exactly one response line.

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use pvedisk_common::Result;

use crate::provider::{Diagnostic, PveProvider};
use crate::state::DynamicValue;

#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    GetProviderSchema,
    ConfigureProvider {
        #[serde(default)]
        config: DynamicValue,
    },
    ValidateResourceConfig {
        type_name: String,
        #[serde(default)]
        config: DynamicValue,
    },
    ReadResource {
        type_name: String,
        #[serde(default)]
        current_state: DynamicValue,
    },
    ApplyResourceChange {
        type_name: String,
        #[serde(default)]
        prior_state: DynamicValue,
        #[serde(default)]
        planned_state: DynamicValue,
    },
    ImportResourceState {
        type_name: String,
        id: String,
    },
    StopProvider,
}

/// Run one request against the provider
pub async fn handle(provider: &PveProvider, request: Request) -> Result<Value> {
    let response = match request {
        Request::GetProviderSchema => serde_json::to_value(provider.get_provider_schema())?,
        Request::ConfigureProvider { config } => {
            json!({ "diagnostics": provider.configure_provider(&config).await })
        }
        Request::ValidateResourceConfig { type_name, config } => {
            json!({ "diagnostics": provider.validate_resource_config(&type_name, &config) })
        }
        Request::ReadResource {
            type_name,
            current_state,
        } => serde_json::to_value(provider.read_resource(&type_name, &current_state).await)?,
        Request::ApplyResourceChange {
            type_name,
            prior_state,
            planned_state,
        } => serde_json::to_value(
            provider
                .apply_resource_change(&type_name, &prior_state, &planned_state)
                .await,
        )?,
        Request::ImportResourceState { type_name, id } => {
            serde_json::to_value(provider.import_resource_state(&type_name, &id).await)?
        }
        Request::StopProvider => {
            provider.stop_provider();
            json!({ "diagnostics": [] })
        }
    };

    Ok(response)
}

/// Serve requests until EOF or `stop_provider`
pub async fn serve<R, W>(provider: &PveProvider, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let (response, stop) = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let stop = matches!(request, Request::StopProvider);
                let response = handle(provider, request).await.unwrap_or_else(|e| {
                    error_response(Diagnostic::from_error("Internal provider error", &e))
                });
                (response, stop)
            }
            Err(e) => {
                warn!("Rejecting malformed request: {}", e);
                let response = error_response(Diagnostic::error("Malformed request", e.to_string()));
                (response, false)
            }
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;

        if stop {
            break;
        }
    }

    Ok(())
}

fn error_response(diagnostic: Diagnostic) -> Value {
    json!({ "diagnostics": [diagnostic] })
}
