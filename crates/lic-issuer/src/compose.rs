//! Rendering a certificate's enabled Docker services into a Compose
//! descriptor (spec.md §3's activation bundle: "a Docker Compose descriptor
//! text" alongside the certificate and sealed credentials).
//!
//! `lic-enforcer`'s `ServiceSupervisor` is the thing that actually shells
//! out to `docker compose`; this module only produces the text it runs
//! against.

use std::fmt::Write as _;

use lic_cert::Certificate;

/// Render `cert`'s enabled Docker services as a Compose v3 YAML document.
pub fn render_compose(cert: &Certificate) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "version: \"3.8\"");
    let _ = writeln!(out, "services:");

    let mut enabled: Vec<(&String, &lic_cert::document::DockerServiceEntry)> =
        cert.docker.services.iter().filter(|(_, s)| s.enabled).collect();
    enabled.sort_by_key(|(name, _)| name.as_str());

    if enabled.is_empty() {
        let _ = writeln!(out, "  {{}}");
        return out;
    }

    for (name, service) in enabled {
        let _ = writeln!(out, "  {name}:");
        let _ = writeln!(out, "    image: {}:{}", service.image, service.tag);
        let _ = writeln!(out, "    restart: {}", if service.required { "always" } else { "unless-stopped" });
        let _ = writeln!(out, "    ports:");
        let _ = writeln!(out, "      - \"{}:{}\"", service.host_port, service.container_port);
        let _ = writeln!(out, "    environment:");
        let _ = writeln!(out, "      LICENTIA_REGISTRY: \"{}\"", cert.docker.registry_url);
        let _ = writeln!(out, "      LICENTIA_CUSTOMER: \"{}\"", cert.customer.id);
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::test_support::{mint_test_certificate, test_keypair};

    #[test]
    fn renders_one_block_per_enabled_service() {
        let kp = test_keypair();
        let cert = mint_test_certificate(&kp, &["frontend".to_string(), "backend".to_string()]);
        let yaml = render_compose(&cert);
        assert!(yaml.contains("frontend:"));
        assert!(yaml.contains("backend:"));
        assert!(!yaml.contains("analytics:"));
    }

    #[test]
    fn empty_service_set_still_produces_valid_shape() {
        let kp = test_keypair();
        let cert = mint_test_certificate(&kp, &[]);
        let yaml = render_compose(&cert);
        assert!(yaml.starts_with("version:"));
    }
}
