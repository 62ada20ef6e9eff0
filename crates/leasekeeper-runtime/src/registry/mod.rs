mod http;
mod resolve;

pub use http::HttpRegistryClient;
pub use resolve::{resolve_ip, FALLBACK_IP};
