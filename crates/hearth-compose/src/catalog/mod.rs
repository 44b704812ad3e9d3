//! Service catalog: the declarative list of desired services.
//!
//! The catalog is read from YAML, converted into [`ServiceDescriptor`]s
//! whose string values are parsed as placeholder [`Template`]s, validated,
//! and ordered by dependency. Loading is pure: nothing touches the engine.
//!
//! ```yaml
//! services:
//!   - name: postgres
//!     image: postgres:16-alpine
//!     environment:
//!       - POSTGRES_PASSWORD
//!     volumes:
//!       - postgres:/var/lib/postgresql/data
//!   - name: nextcloud
//!     image: nextcloud:29-apache
//!     ports:
//!       - "${NEXTCLOUD_PORT:-8080}:80"
//!     depends_on: [postgres]
//! ```

pub mod raw;
pub mod validator;

use std::path::Path;

use hearth_common::error::{HearthError, Result};
use hearth_common::types::RestartPolicy;

use self::raw::{RawCatalog, RawEnvironment, RawService};
use crate::graph::DependencyGraph;
use crate::template::Template;

/// One environment binding of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvBinding {
    /// Variable name inside the container.
    pub key: String,
    /// Value, possibly deferred to the environment layers.
    pub value: Template,
}

/// Declarative desired state of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Unique service name.
    pub name: String,
    /// Image reference.
    pub image: Template,
    /// Environment bindings, in declaration order.
    pub environment: Vec<EnvBinding>,
    /// Unresolved `host:container[:mode]` volume specs.
    pub volumes: Vec<Template>,
    /// Unresolved `[ip:]host:container[/proto]` port specs.
    pub ports: Vec<Template>,
    /// Restart policy.
    pub restart: RestartPolicy,
    /// Names of services that must be reconciled first.
    pub depends_on: Vec<String>,
}

fn malformed(service: &str, field: impl Into<String>, message: impl Into<String>) -> HearthError {
    HearthError::Malformed {
        service: service.to_string(),
        field: field.into(),
        message: message.into(),
    }
}

fn parse_template(service: &str, field: impl Into<String>, source: &str) -> Result<Template> {
    Template::parse(source).map_err(|message| malformed(service, field, message))
}

/// Converts one `KEY=value` or bare `KEY` entry.
fn parse_env_entry(service: &str, entry: &str) -> Result<EnvBinding> {
    let (key, value) = match entry.split_once('=') {
        Some((key, value)) => (key.trim(), Some(value)),
        None => (entry.trim(), None),
    };
    if key.is_empty() {
        return Err(malformed(service, "environment", format!("entry \"{entry}\" has no key")));
    }
    let field = format!("environment.{key}");
    let value = match value {
        Some(v) => parse_template(service, field, v)?,
        None => Template::placeholder(key),
    };
    Ok(EnvBinding {
        key: key.to_string(),
        value,
    })
}

fn parse_environment(service: &str, raw: RawEnvironment) -> Result<Vec<EnvBinding>> {
    match raw {
        RawEnvironment::List(entries) => entries
            .iter()
            .map(|entry| parse_env_entry(service, entry))
            .collect(),
        RawEnvironment::Map(map) => map
            .into_iter()
            .map(|(k, v)| {
                let serde_yaml::Value::String(key) = k else {
                    return Err(malformed(service, "environment", "keys must be strings"));
                };
                let field = format!("environment.{key}");
                let value = match v {
                    serde_yaml::Value::Null => Template::placeholder(key.as_str()),
                    serde_yaml::Value::String(s) => parse_template(service, field, &s)?,
                    serde_yaml::Value::Number(n) => parse_template(service, field, &n.to_string())?,
                    serde_yaml::Value::Bool(b) => parse_template(service, field, &b.to_string())?,
                    _ => return Err(malformed(service, field, "value must be a scalar")),
                };
                Ok(EnvBinding { key, value })
            })
            .collect(),
    }
}

impl TryFrom<RawService> for ServiceDescriptor {
    type Error = HearthError;

    fn try_from(raw: RawService) -> Result<Self> {
        let name = raw.name;
        let image = parse_template(&name, "image", &raw.image)?;
        let environment = parse_environment(&name, raw.environment)?;
        let volumes = raw
            .volumes
            .iter()
            .enumerate()
            .map(|(i, v)| parse_template(&name, format!("volumes[{i}]"), v))
            .collect::<Result<Vec<_>>>()?;
        let ports = raw
            .ports
            .iter()
            .enumerate()
            .map(|(i, p)| parse_template(&name, format!("ports[{i}]"), p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name,
            image,
            environment,
            volumes,
            ports,
            restart: raw.restart,
            depends_on: raw.depends_on,
        })
    }
}

/// A validated, dependency-ordered set of service descriptors.
#[derive(Debug, Clone)]
pub struct Catalog {
    services: Vec<ServiceDescriptor>,
    order: Vec<String>,
    graph: DependencyGraph,
}

impl Catalog {
    /// Loads a catalog from YAML source text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the YAML is malformed, a service
    /// is invalid, names collide, a dependency is undeclared, or the
    /// dependency graph has a cycle.
    pub fn load(source: &str) -> Result<Self> {
        Self::load_named("catalog", source)
    }

    /// Loads a catalog, naming `origin` in parse errors.
    ///
    /// # Errors
    ///
    /// See [`Catalog::load`].
    pub fn load_named(origin: &str, source: &str) -> Result<Self> {
        tracing::info!(origin, "loading service catalog");
        if source.trim().is_empty() {
            return Self::from_raw(RawCatalog::default());
        }
        let raw: RawCatalog = serde_yaml::from_str(source).map_err(|e| HearthError::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        Self::from_raw(raw)
    }

    /// Reads and loads a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to load.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| HearthError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::load_named(&path.display().to_string(), &content)
    }

    /// Builds a catalog from already-deserialized entries.
    ///
    /// # Errors
    ///
    /// See [`Catalog::load`].
    pub fn from_raw(raw: RawCatalog) -> Result<Self> {
        let services = raw
            .services
            .into_iter()
            .map(ServiceDescriptor::try_from)
            .collect::<Result<Vec<_>>>()?;
        validator::validate(&services)?;

        let mut graph = DependencyGraph::new();
        for svc in &services {
            let _ = graph.add_service(svc.name.as_str());
        }
        for svc in &services {
            let dependent = graph.add_service(svc.name.as_str());
            for dep in &svc.depends_on {
                let dependency = graph.add_service(dep.as_str());
                graph.add_dependency(dependent, dependency);
            }
        }
        let order = graph.resolve_order()?;
        tracing::debug!(?order, "deployment order resolved");

        Ok(Self {
            services,
            order,
            graph,
        })
    }

    /// Returns the services in catalog order.
    #[must_use]
    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    /// Looks a service up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Returns service names in deployment order: dependencies first,
    /// ties broken by catalog order.
    #[must_use]
    pub fn deployment_order(&self) -> &[String] {
        &self.order
    }

    /// Returns `true` if any other service depends on `name`.
    #[must_use]
    pub fn has_dependents(&self, name: &str) -> bool {
        self.graph.has_dependents(name)
    }

    /// Returns the number of services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if the catalog declares no services.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
