use std::fmt::Write;
use std::net::IpAddr;

use crate::instance::ServiceInstance;

const DATA_CENTER_CLASS: &str = "com.netflix.appinfo.InstanceInfo$DefaultDataCenterInfo";

/// XML instance representation sent with a register call.
#[derive(Debug, Clone)]
pub struct InstancePayload<'a> {
    instance: &'a ServiceInstance,
    ip_address: IpAddr,
}

impl<'a> InstancePayload<'a> {
    pub fn new(instance: &'a ServiceInstance, ip_address: IpAddr) -> Self {
        Self {
            instance,
            ip_address,
        }
    }

    /// Render the `<instance>` document.
    pub fn to_xml(&self) -> String {
        let i = self.instance;
        let ssl = i.ssl_preferred();
        let vip = i.vip_address();

        let mut xml = String::from("<?xml version='1.0' encoding='utf-8'?>\n<instance>");
        element(&mut xml, "instanceId", &i.instance_id());
        element(&mut xml, "hostName", i.host_address());
        element(&mut xml, "app", i.name());
        element(&mut xml, "ipAddr", &self.ip_address.to_string());
        element(&mut xml, "vipAddress", &vip);
        element(&mut xml, "secureVipAddress", &vip);
        element(&mut xml, "status", "UP");
        let _ = write!(
            xml,
            "<port enabled=\"{}\">{}</port>",
            !ssl,
            i.http_port()
        );
        let _ = write!(
            xml,
            "<securePort enabled=\"{}\">{}</securePort>",
            ssl,
            i.secure_port()
        );
        element(&mut xml, "homePageUrl", &i.home_page_url());
        element(&mut xml, "statusPageUrl", &i.status_page_url());
        element(&mut xml, "healthCheckUrl", &i.health_check_url());
        let _ = write!(xml, "<dataCenterInfo class=\"{}\">", DATA_CENTER_CLASS);
        element(&mut xml, "name", i.data_center());
        xml.push_str("</dataCenterInfo></instance>");
        xml
    }
}

fn element(out: &mut String, tag: &str, text: &str) {
    let _ = write!(out, "<{tag}>{}</{tag}>", escape(text));
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn loopback() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn test_plain_payload() {
        let instance = ServiceInstance::new("orders", "host-a", 8080)
            .with_health_check_path("/health")
            .with_info_path("/info");
        let xml = InstancePayload::new(&instance, loopback()).to_xml();

        assert!(xml.contains("<instanceId>host-a:ORDERS:8080</instanceId>"));
        assert!(xml.contains("<app>ORDERS</app>"));
        assert!(xml.contains("<ipAddr>127.0.0.1</ipAddr>"));
        assert!(xml.contains("<vipAddress>orders</vipAddress>"));
        assert!(xml.contains("<secureVipAddress>orders</secureVipAddress>"));
        assert!(xml.contains("<status>UP</status>"));
        assert!(xml.contains("<port enabled=\"true\">8080</port>"));
        assert!(xml.contains("<securePort enabled=\"false\">443</securePort>"));
        assert!(xml.contains("<healthCheckUrl>http://host-a:8080/health</healthCheckUrl>"));
        assert!(xml.contains("<name>MyOwn</name>"));
        assert!(xml.ends_with("</dataCenterInfo></instance>"));
    }

    #[test]
    fn test_ssl_payload() {
        let instance = ServiceInstance::new("orders", "host-a", 8080)
            .with_secure_port(8443)
            .with_ssl_preferred(true);
        let xml = InstancePayload::new(&instance, loopback()).to_xml();

        assert!(xml.contains("<port enabled=\"false\">8080</port>"));
        assert!(xml.contains("<securePort enabled=\"true\">8443</securePort>"));
        assert!(xml.contains("<homePageUrl>https://host-a:8443/</homePageUrl>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let instance = ServiceInstance::new("orders", "host-a", 8080).with_data_center("A&B <dc>");
        let xml = InstancePayload::new(&instance, loopback()).to_xml();
        assert!(xml.contains("<name>A&amp;B &lt;dc&gt;</name>"));
    }
}
