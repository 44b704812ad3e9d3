//! Placeholder resolution and binding validation.
//!
//! Turns a [`ServiceDescriptor`] into a [`ResolvedDescriptor`]: every
//! template is rendered against the environment layers, volume specs are
//! rooted under the data directory, and port specs are parsed.

use std::path::{Component, Path, PathBuf};

use hearth_common::error::{ErrorClass, HearthError, Result};
use hearth_common::types::{PortBinding, Protocol, RestartPolicy, VolumeBinding};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ServiceDescriptor};
use crate::env::EnvironmentLayers;
use crate::template::Template;

/// A service descriptor with every placeholder expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDescriptor {
    /// Service name.
    pub name: String,
    /// Concrete image reference.
    pub image: String,
    /// Environment variables, in declaration order.
    pub environment: Vec<(String, String)>,
    /// Volume mounts.
    pub volumes: Vec<VolumeBinding>,
    /// Published ports.
    pub ports: Vec<PortBinding>,
    /// Restart policy.
    pub restart: RestartPolicy,
    /// Services that must be reconciled first.
    pub depends_on: Vec<String>,
}

/// A service whose placeholders could not be resolved.
#[derive(Debug)]
pub struct UnresolvedService {
    /// Service name.
    pub name: String,
    /// Why resolution failed.
    pub error: HearthError,
}

/// The resolved form of a whole catalog.
#[derive(Debug, Default)]
pub struct ResolvedCatalog {
    /// Resolved services, in deployment order.
    pub services: Vec<ResolvedDescriptor>,
    /// Leaf services that failed resolution; reported as failed.
    pub unresolved: Vec<UnresolvedService>,
}

impl ResolvedCatalog {
    /// Looks a resolved service up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Returns `true` if `name` is declared, resolved or not.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.get(name).is_some() || self.unresolved.iter().any(|u| u.name == name)
    }
}

/// Resolves descriptors against a fixed set of layers and a data directory.
#[derive(Debug, Clone)]
pub struct Resolver {
    layers: EnvironmentLayers,
    data_dir: PathBuf,
}

impl Resolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(layers: EnvironmentLayers, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            layers,
            data_dir: data_dir.into(),
        }
    }

    fn render(&self, service: &str, field: &str, template: &Template) -> Result<String> {
        template
            .render(|key| self.layers.lookup(key))
            .map_err(|key| HearthError::UnresolvedPlaceholder {
                service: service.to_string(),
                field: field.to_string(),
                key,
            })
    }

    /// Resolves one descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::UnresolvedPlaceholder`] for a placeholder
    /// without default that no layer defines, or
    /// [`HearthError::Malformed`] for a volume or port spec that is invalid
    /// once expanded.
    pub fn resolve(&self, descriptor: &ServiceDescriptor) -> Result<ResolvedDescriptor> {
        let name = descriptor.name.as_str();
        let image = self.render(name, "image", &descriptor.image)?;

        let environment = descriptor
            .environment
            .iter()
            .map(|binding| {
                let field = format!("environment.{}", binding.key);
                Ok((binding.key.clone(), self.render(name, &field, &binding.value)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let volumes = descriptor
            .volumes
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let field = format!("volumes[{i}]");
                let text = self.render(name, &field, spec)?;
                parse_volume(&text, &self.data_dir).map_err(|message| HearthError::Malformed {
                    service: name.to_string(),
                    field,
                    message,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let ports = descriptor
            .ports
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let field = format!("ports[{i}]");
                let text = self.render(name, &field, spec)?;
                parse_port(&text).map_err(|message| HearthError::Malformed {
                    service: name.to_string(),
                    field,
                    message,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(service = name, %image, "resolved service");
        Ok(ResolvedDescriptor {
            name: descriptor.name.clone(),
            image,
            environment,
            volumes,
            ports,
            restart: descriptor.restart,
            depends_on: descriptor.depends_on.clone(),
        })
    }

    /// Resolves every service of a catalog in deployment order.
    ///
    /// A service with a missing placeholder is set aside as unresolved
    /// when nothing depends on it; otherwise the whole catalog fails.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error, or a resolution error for a
    /// service that other services depend on.
    pub fn resolve_catalog(&self, catalog: &Catalog) -> Result<ResolvedCatalog> {
        let mut resolved = ResolvedCatalog::default();
        for name in catalog.deployment_order() {
            let Some(descriptor) = catalog.get(name) else {
                continue;
            };
            match self.resolve(descriptor) {
                Ok(svc) => resolved.services.push(svc),
                Err(e) if e.class() == ErrorClass::Resolution && !catalog.has_dependents(name) => {
                    tracing::warn!(service = %name, error = %e, "service left unresolved");
                    resolved.unresolved.push(UnresolvedService {
                        name: name.clone(),
                        error: e,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(resolved)
    }
}

/// Parses `host:container[:ro|rw]`, rooting `host` under `data_dir`.
fn parse_volume(spec: &str, data_dir: &Path) -> std::result::Result<VolumeBinding, String> {
    let parts: Vec<&str> = spec.split(':').collect();
    let (host, container, read_only) = match parts.as_slice() {
        [host, container] => (*host, *container, false),
        [host, container, "ro"] => (*host, *container, true),
        [host, container, "rw"] => (*host, *container, false),
        [_, _, mode] => return Err(format!("unknown mount mode \"{mode}\" (expected ro or rw)")),
        _ => return Err(format!("expected host:container[:ro|rw], got \"{spec}\"")),
    };
    if host.is_empty() {
        return Err("host path is empty".into());
    }
    if !container.starts_with('/') {
        return Err(format!("container path \"{container}\" must be absolute"));
    }

    let host_path = Path::new(host);
    if host_path.components().any(|c| c == Component::ParentDir) {
        return Err(format!("host path \"{host}\" must not contain `..`"));
    }
    let host = if host_path.is_absolute() {
        if !host_path.starts_with(data_dir) {
            return Err(format!(
                "host path \"{host}\" is outside the data directory {}",
                data_dir.display()
            ));
        }
        host_path.to_path_buf()
    } else {
        data_dir.join(host_path)
    };

    Ok(VolumeBinding {
        host,
        container: container.to_string(),
        read_only,
    })
}

/// Parses `[ip:]host:container[/tcp|/udp]`.
fn parse_port(spec: &str) -> std::result::Result<PortBinding, String> {
    let (mapping, protocol) = match spec.rsplit_once('/') {
        Some((mapping, proto)) => (mapping, proto.parse::<Protocol>()?),
        None => (spec, Protocol::Tcp),
    };
    let parts: Vec<&str> = mapping.split(':').collect();
    let (host_ip, host, container) = match parts.as_slice() {
        [host, container] => (None, *host, *container),
        [ip, host, container] if !ip.is_empty() => (Some((*ip).to_string()), *host, *container),
        _ => return Err(format!("expected [ip:]host:container[/proto], got \"{spec}\"")),
    };
    Ok(PortBinding {
        host_ip,
        host: parse_port_number(host)?,
        container: parse_port_number(container)?,
        protocol,
    })
}

fn parse_port_number(text: &str) -> std::result::Result<u16, String> {
    match text.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("\"{text}\" is not a port number (1-65535)")),
        Ok(port) => Ok(port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvironmentLayer;

    const DATA_DIR: &str = "/srv/hearth";

    fn resolver(layers: Vec<EnvironmentLayer>) -> Resolver {
        Resolver::new(layers.into_iter().collect(), DATA_DIR)
    }

    fn single_service(yaml_body: &str) -> Catalog {
        Catalog::load(&format!("services:\n{yaml_body}")).expect("catalog")
    }

    #[test]
    fn machine_layer_overrides_default_port() {
        let catalog = single_service(
            "  - name: jupyter\n    image: jupyter/base-notebook\n    \
             ports:\n      - \"${PORT}:8888\"\n",
        );
        let r = resolver(vec![
            EnvironmentLayer::new("defaults").with("PORT", "8888"),
            EnvironmentLayer::new("machine").with("PORT", "8889"),
        ]);
        let svc = r.resolve(&catalog.services()[0]).expect("resolve");
        assert_eq!(svc.ports[0].host, 8889);
        assert_eq!(svc.ports[0].container, 8888);
    }

    #[test]
    fn literal_default_used_when_no_layer_defines_key() {
        let catalog = single_service(
            "  - name: jupyter\n    image: jupyter/base-notebook\n    \
             ports:\n      - \"${PORT:-8888}:8888\"\n",
        );
        let svc = resolver(Vec::new())
            .resolve(&catalog.services()[0])
            .expect("resolve");
        assert_eq!(svc.ports[0].host, 8888);
    }

    #[test]
    fn resolution_ignores_unrelated_keys() {
        let catalog = single_service(
            "  - name: app\n    image: \"app:${TAG}\"\n    environment:\n      - TZ=${TZ:-UTC}\n",
        );
        let base = resolver(vec![EnvironmentLayer::new("d").with("TAG", "1.2")])
            .resolve(&catalog.services()[0])
            .expect("resolve");
        let noisy = resolver(vec![
            EnvironmentLayer::new("d")
                .with("TAG", "1.2")
                .with("UNRELATED", "x")
                .with("TAGS", "9.9"),
            EnvironmentLayer::new("m").with("OTHER", "y"),
        ])
        .resolve(&catalog.services()[0])
        .expect("resolve");
        assert_eq!(base, noisy);
        assert_eq!(base.image, "app:1.2");
        assert_eq!(base.environment, vec![("TZ".to_string(), "UTC".to_string())]);
    }

    #[test]
    fn missing_key_names_service_field_and_key() {
        let catalog = single_service(
            "  - name: db\n    image: postgres\n    environment:\n      - POSTGRES_PASSWORD\n",
        );
        let err = resolver(Vec::new())
            .resolve(&catalog.services()[0])
            .unwrap_err();
        assert!(
            matches!(
                err,
                HearthError::UnresolvedPlaceholder { ref service, ref field, ref key }
                    if service == "db"
                        && field == "environment.POSTGRES_PASSWORD"
                        && key == "POSTGRES_PASSWORD"
            ),
            "got: {err}"
        );
    }

    #[test]
    fn volumes_are_rooted_under_data_dir() {
        let catalog = single_service(
            "  - name: media\n    image: jellyfin\n    volumes:\n      \
             - jellyfin/config:/config\n      - /srv/hearth/media:/media:ro\n",
        );
        let svc = resolver(Vec::new())
            .resolve(&catalog.services()[0])
            .expect("resolve");
        assert_eq!(svc.volumes[0].host, PathBuf::from("/srv/hearth/jellyfin/config"));
        assert!(!svc.volumes[0].read_only);
        assert_eq!(svc.volumes[1].host, PathBuf::from("/srv/hearth/media"));
        assert!(svc.volumes[1].read_only);
    }

    #[test]
    fn volume_escaping_data_dir_is_malformed() {
        for spec in ["/etc:/etc", "../secrets:/s", "data:relative", "a:/b:rx", "nocolon"] {
            let catalog = single_service(&format!(
                "  - name: bad\n    image: img\n    volumes:\n      - \"{spec}\"\n"
            ));
            let err = resolver(Vec::new())
                .resolve(&catalog.services()[0])
                .unwrap_err();
            assert!(
                matches!(err, HearthError::Malformed { ref field, .. } if field == "volumes[0]"),
                "{spec}: got {err}"
            );
        }
    }

    #[test]
    fn ports_accept_ip_and_protocol() {
        assert_eq!(
            parse_port("127.0.0.1:5353:53/udp").expect("port"),
            PortBinding {
                host_ip: Some("127.0.0.1".into()),
                host: 5353,
                container: 53,
                protocol: Protocol::Udp,
            }
        );
        assert!(parse_port("80").is_err());
        assert!(parse_port("0:80").is_err());
        assert!(parse_port("70000:80").is_err());
        assert!(parse_port("80:80/sctp").is_err());
    }

    fn chain_catalog() -> Catalog {
        Catalog::load(
            "services:\n  \
             - name: db\n    image: postgres\n    environment:\n      - PASSWORD\n  \
             - name: app\n    image: app\n    depends_on: [db]\n  \
             - name: extra\n    image: \"extra:${EXTRA_TAG}\"\n",
        )
        .expect("catalog")
    }

    #[test]
    fn unresolved_leaf_is_set_aside() {
        let r = resolver(vec![EnvironmentLayer::new("d").with("PASSWORD", "pw")]);
        let resolved = r.resolve_catalog(&chain_catalog()).expect("resolve");
        let names: Vec<&str> = resolved.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["db", "app"]);
        assert_eq!(resolved.unresolved.len(), 1);
        assert_eq!(resolved.unresolved[0].name, "extra");
        assert!(resolved.declares("extra"));
        assert!(!resolved.declares("ghost"));
    }

    #[test]
    fn unresolved_service_with_dependents_aborts() {
        let r = resolver(vec![EnvironmentLayer::new("d").with("EXTRA_TAG", "1")]);
        let err = r.resolve_catalog(&chain_catalog()).unwrap_err();
        assert_eq!(err.service(), Some("db"));
        assert_eq!(err.class(), ErrorClass::Resolution);
    }
}
