use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use leasekeeper_core::registry::{
    HeartbeatResult, InstancePayload, RegisterResult, RegistryClient, RegistryEndpoint, STATUS_OK,
};
use leasekeeper_core::{LeaseError, Result, ServiceInstance};

use super::resolve::resolve_ip;

const APPLICATION_XML: &str = "application/xml";

/// Registry client speaking the Eureka REST protocol over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    http: reqwest::Client,
}

impl HttpRegistryClient {
    /// Create a client whose every call is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LeaseError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn register(
        &self,
        instance: &ServiceInstance,
        endpoint: &RegistryEndpoint,
    ) -> RegisterResult {
        let ip = resolve_ip(instance.host_address()).await;
        let body = InstancePayload::new(instance, ip).to_xml();
        let url = endpoint.app_url(instance.name());

        tracing::debug!(
            url = %url,
            ip = %ip,
            active_port = instance.active_port(),
            data_center = instance.data_center(),
            ssl = instance.ssl_preferred(),
            "Sending register request"
        );
        tracing::trace!(payload = %body, "Register payload");

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, APPLICATION_XML)
            .header(ACCEPT, APPLICATION_XML)
            .body(body)
            .send()
            .await;

        match response {
            Ok(response) => {
                let result = RegisterResult::from_status(response.status().as_u16());
                if !result.ok {
                    let text = response.text().await.unwrap_or_default();
                    tracing::debug!(url = %url, body = %text, "Register rejected");
                }
                result
            }
            Err(e) => RegisterResult::transport_failure(e.to_string()),
        }
    }

    async fn heartbeat(
        &self,
        instance: &ServiceInstance,
        endpoint: &RegistryEndpoint,
    ) -> HeartbeatResult {
        let url = endpoint.instance_url(instance.name(), &instance.instance_id());

        match self.http.put(&url).send().await {
            Ok(response) => {
                let result = HeartbeatResult::from_status(response.status().as_u16());
                if !result.ok && !result.not_found {
                    let text = response.text().await.unwrap_or_default();
                    tracing::debug!(url = %url, body = %text, "Heartbeat rejected");
                }
                result
            }
            Err(e) => HeartbeatResult::transport_failure(e.to_string()),
        }
    }

    async fn deregister(&self, instance: &ServiceInstance, endpoint: &RegistryEndpoint) -> bool {
        let url = endpoint.instance_url(instance.name(), &instance.instance_id());

        match self.http.delete(&url).send().await {
            Ok(response) if response.status().as_u16() == STATUS_OK => true,
            Ok(response) => {
                tracing::warn!(url = %url, status = response.status().as_u16(), "Deregister rejected");
                false
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Deregister request failed");
                false
            }
        }
    }
}
