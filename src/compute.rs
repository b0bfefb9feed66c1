//! Google Compute Engine implementation of the disk provider.
//!
//! Control-plane calls go straight to the `compute/v1` REST surface with a
//! shared HTTP client. Every mutating call returns a zone operation which is
//! polled to completion under a bounded deadline, so callers never block
//! indefinitely on a resource transition.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::{ConfigError, DriverConfig};
use crate::disk::DiskConfig;
use crate::provider::{Disk, DiskProvider, ProviderFuture};

const COMPUTE_API_BASE: &str = "https://compute.googleapis.com/compute/v1";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const WAIT_TIMEOUT: Duration = Duration::from_secs(100);

const OPERATION_DONE: &str = "DONE";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Errors raised by the Compute Engine provider.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ComputeProviderError {
    /// Raised when the driver configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Wrapper for control-plane failures, propagated verbatim.
    #[error("provider error: {message}")]
    Provider {
        /// Message returned by the control plane.
        message: String,
    },
    /// Raised when a zone operation completes with an error payload.
    #[error("{action} failed: {message}")]
    OperationFailed {
        /// Operation the provider was performing.
        action: String,
        /// Error detail reported by the operation.
        message: String,
    },
    /// Raised when a zone operation exceeds the bounded wait.
    #[error("timeout waiting for {action} on {resource}")]
    Timeout {
        /// Operation the provider was performing.
        action: String,
        /// Disk or instance the operation targeted.
        resource: String,
    },
}

impl From<ConfigError> for ComputeProviderError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDiskRequest<'a> {
    name: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    disk_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_gb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_snapshot: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_image: Option<&'a str>,
}

impl<'a> CreateDiskRequest<'a> {
    fn from_config(config: &'a DiskConfig) -> Self {
        Self {
            name: &config.name,
            disk_type: config.disk_type.as_deref(),
            size_gb: config.size_gb,
            source_snapshot: config.source_snapshot.as_deref(),
            source_image: config.source_image.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachDiskRequest {
    source: String,
    device_name: String,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    status: String,
    #[serde(default)]
    error: Option<OperationErrors>,
}

#[derive(Debug, Deserialize)]
struct OperationErrors {
    #[serde(default)]
    errors: Vec<OperationErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OperationErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct DiskListResponse {
    #[serde(default)]
    items: Vec<DiskResource>,
}

#[derive(Debug, Deserialize)]
struct DiskResource {
    name: String,
    #[serde(default)]
    status: String,
}

/// Disk provider backed by the Compute Engine API.
#[derive(Clone, Debug)]
pub struct ComputeProvider {
    project: String,
    zone: String,
    instance: String,
    access_token: String,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl ComputeProvider {
    /// Constructs a new provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeProviderError::Config`] when the provided
    /// configuration fails validation.
    pub fn new(config: &DriverConfig) -> Result<Self, ComputeProviderError> {
        config.validate()?;
        Ok(Self {
            project: config.project.clone(),
            zone: config.zone.clone(),
            instance: config.instance.clone(),
            access_token: config.access_token.clone(),
            poll_interval: POLL_INTERVAL,
            wait_timeout: WAIT_TIMEOUT,
        })
    }

    fn zone_url(&self) -> String {
        format!(
            "{COMPUTE_API_BASE}/projects/{}/zones/{}",
            self.project, self.zone
        )
    }

    fn disk_url(&self, name: &str) -> String {
        format!("{}/disks/{name}", self.zone_url())
    }

    async fn send_for_operation(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Operation, ComputeProviderError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|err| ComputeProviderError::Provider {
                message: err.to_string(),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ComputeProviderError::Provider {
                message: err.to_string(),
            })?;

        if !status.is_success() {
            return Err(ComputeProviderError::Provider {
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        serde_json::from_slice(&body).map_err(|err| ComputeProviderError::Provider {
            message: err.to_string(),
        })
    }

    async fn fetch_operation(&self, name: &str) -> Result<Operation, ComputeProviderError> {
        let url = format!("{}/operations/{name}", self.zone_url());
        self.send_for_operation(HTTP_CLIENT.get(url)).await
    }

    /// Polls a zone operation until it reports `DONE` or the deadline
    /// passes.
    async fn wait_for_operation(
        &self,
        mut operation: Operation,
        action: &str,
        resource: &str,
    ) -> Result<(), ComputeProviderError> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            if operation.status == OPERATION_DONE {
                return operation_outcome(&operation, action);
            }

            if Instant::now() > deadline {
                return Err(ComputeProviderError::Timeout {
                    action: action.to_owned(),
                    resource: resource.to_owned(),
                });
            }

            sleep(self.poll_interval).await;
            operation = self.fetch_operation(&operation.name).await?;
        }
    }

    async fn run_operation(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
        resource: &str,
    ) -> Result<(), ComputeProviderError> {
        let operation = self.send_for_operation(request).await?;
        self.wait_for_operation(operation, action, resource).await
    }

    async fn list_disks(&self) -> Result<Vec<Disk>, ComputeProviderError> {
        let url = format!("{}/disks", self.zone_url());
        let response = HTTP_CLIENT
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|err| ComputeProviderError::Provider {
                message: err.to_string(),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ComputeProviderError::Provider {
                message: err.to_string(),
            })?;

        if !status.is_success() {
            return Err(ComputeProviderError::Provider {
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let parsed: DiskListResponse =
            serde_json::from_slice(&body).map_err(|err| ComputeProviderError::Provider {
                message: err.to_string(),
            })?;

        Ok(parsed
            .items
            .into_iter()
            .map(|item| Disk {
                name: item.name,
                status: item.status,
            })
            .collect())
    }
}

fn operation_outcome(operation: &Operation, action: &str) -> Result<(), ComputeProviderError> {
    let Some(error) = &operation.error else {
        return Ok(());
    };

    let message = error
        .errors
        .iter()
        .map(|detail| detail.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    Err(ComputeProviderError::OperationFailed {
        action: action.to_owned(),
        message,
    })
}

fn request_id() -> String {
    Uuid::new_v4().simple().to_string()
}

impl DiskProvider for ComputeProvider {
    type Error = ComputeProviderError;

    fn create<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = format!("{}/disks?requestId={}", self.zone_url(), request_id());
            let body = CreateDiskRequest::from_config(config);
            self.run_operation(
                HTTP_CLIENT.post(url).json(&body),
                "create_disk",
                &config.name,
            )
            .await
        })
    }

    fn delete<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = format!(
                "{}?requestId={}",
                self.disk_url(&config.name),
                request_id()
            );
            self.run_operation(HTTP_CLIENT.delete(url), "delete_disk", &config.name)
                .await
        })
    }

    fn attach<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = format!(
                "{}/instances/{}/attachDisk?requestId={}",
                self.zone_url(),
                self.instance,
                request_id()
            );
            let body = AttachDiskRequest {
                source: self.disk_url(&config.name),
                device_name: config.device_name(),
            };
            self.run_operation(HTTP_CLIENT.post(url).json(&body), "attach_disk", &config.name)
                .await
        })
    }

    fn detach<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = format!(
                "{}/instances/{}/detachDisk?deviceName={}&requestId={}",
                self.zone_url(),
                self.instance,
                config.device_name(),
                request_id()
            );
            self.run_operation(HTTP_CLIENT.post(url), "detach_disk", &config.name)
                .await
        })
    }

    fn list(&self) -> ProviderFuture<'_, Vec<Disk>, Self::Error> {
        Box::pin(async move { self.list_disks().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_fixture() -> ComputeProvider {
        ComputeProvider {
            project: String::from("proj"),
            zone: String::from("europe-west1-b"),
            instance: String::from("host-1"),
            access_token: String::from("token"),
            poll_interval: Duration::from_millis(1),
            wait_timeout: Duration::ZERO,
        }
    }

    #[test]
    fn create_body_serialises_only_set_fields() {
        let config = DiskConfig {
            name: String::from("vol1"),
            size_gb: Some(10),
            ..DiskConfig::default()
        };
        let json = serde_json::to_string(&CreateDiskRequest::from_config(&config))
            .expect("serialise");

        assert_eq!(json, r#"{"name":"vol1","sizeGb":10}"#);
    }

    #[test]
    fn create_body_renames_the_type_field() {
        let config = DiskConfig {
            name: String::from("vol1"),
            disk_type: Some(String::from("pd-ssd")),
            source_snapshot: Some(String::from("snap-1")),
            ..DiskConfig::default()
        };
        let json = serde_json::to_string(&CreateDiskRequest::from_config(&config))
            .expect("serialise");

        assert!(json.contains(r#""type":"pd-ssd""#));
        assert!(json.contains(r#""sourceSnapshot":"snap-1""#));
        assert!(!json.contains("sourceImage"));
    }

    #[test]
    fn attach_body_uses_camel_case_device_name() {
        let body = AttachDiskRequest {
            source: String::from("projects/proj/zones/z/disks/vol1"),
            device_name: String::from("cloudvol-vol1"),
        };
        let json = serde_json::to_string(&body).expect("serialise");

        assert!(json.contains(r#""deviceName":"cloudvol-vol1""#));
    }

    #[test]
    fn operation_outcome_surfaces_error_payloads() {
        let operation = Operation {
            name: String::from("op-1"),
            status: String::from("DONE"),
            error: Some(OperationErrors {
                errors: vec![OperationErrorDetail {
                    message: String::from("quota exceeded"),
                }],
            }),
        };

        let err = operation_outcome(&operation, "create_disk").expect_err("should fail");
        assert_eq!(
            err,
            ComputeProviderError::OperationFailed {
                action: String::from("create_disk"),
                message: String::from("quota exceeded"),
            }
        );
    }

    #[tokio::test]
    async fn wait_times_out_on_a_pending_operation() {
        let provider = provider_fixture();
        let operation = Operation {
            name: String::from("op-1"),
            status: String::from("PENDING"),
            error: None,
        };

        let err = provider
            .wait_for_operation(operation, "attach_disk", "vol1")
            .await
            .expect_err("zero deadline should time out");

        assert_eq!(
            err,
            ComputeProviderError::Timeout {
                action: String::from("attach_disk"),
                resource: String::from("vol1"),
            }
        );
    }

    #[test]
    fn disk_list_parses_missing_items_as_empty() {
        let parsed: DiskListResponse =
            serde_json::from_str(r#"{"kind":"compute#diskList"}"#).expect("parse");
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn disk_urls_follow_the_zone_layout() {
        let provider = provider_fixture();
        assert_eq!(
            provider.disk_url("vol1"),
            "https://compute.googleapis.com/compute/v1/projects/proj/zones/europe-west1-b/disks/vol1"
        );
    }
}
