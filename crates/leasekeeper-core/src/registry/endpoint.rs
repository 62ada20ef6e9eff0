use serde::{Deserialize, Serialize};

/// Default registry base URL when nothing is configured.
pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:8761/eureka/apps/";

/// Base URL of one registry server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RegistryEndpoint(String);

impl RegistryEndpoint {
    /// Create an endpoint, dropping trailing slashes and surrounding whitespace.
    pub fn new(url: impl AsRef<str>) -> Self {
        Self(url.as_ref().trim().trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL of an application collection: `{base}/{app}`.
    pub fn app_url(&self, app: &str) -> String {
        format!("{}/{}", self.0, app)
    }

    /// URL of one registered instance: `{base}/{app}/{instance_id}`.
    pub fn instance_url(&self, app: &str, instance_id: &str) -> String {
        format!("{}/{}/{}", self.0, app, instance_id)
    }
}

impl Default for RegistryEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_URL)
    }
}

impl From<String> for RegistryEndpoint {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

impl From<&str> for RegistryEndpoint {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<RegistryEndpoint> for String {
    fn from(endpoint: RegistryEndpoint) -> Self {
        endpoint.0
    }
}

impl std::fmt::Display for RegistryEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
