//! Static validation of catalog entries.
//!
//! Checks for duplicate names, invalid names, missing images, and
//! dependency references before any graph is built.

use std::collections::HashSet;

use hearth_common::error::{HearthError, Result};

use super::ServiceDescriptor;

/// Validates catalog entries for semantic correctness.
///
/// # Checks performed
///
/// 1. Every name is a valid container name.
/// 2. No duplicate service names.
/// 3. Every service declares a non-empty image.
/// 4. Every dependency names a declared service other than itself.
///
/// Cycles are detected later, when the dependency graph is ordered.
///
/// # Errors
///
/// Returns the first failing check.
pub fn validate(services: &[ServiceDescriptor]) -> Result<()> {
    tracing::debug!(services = services.len(), "validating catalog");
    check_names(services)?;
    check_duplicate_services(services)?;
    check_image_present(services)?;
    check_dependency_references(services)?;
    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn check_names(services: &[ServiceDescriptor]) -> Result<()> {
    for svc in services {
        if !is_valid_name(&svc.name) {
            return Err(HearthError::Malformed {
                service: svc.name.clone(),
                field: "name".into(),
                message: "must start with a letter or digit and contain only [A-Za-z0-9_.-]"
                    .into(),
            });
        }
    }
    Ok(())
}

fn check_duplicate_services(services: &[ServiceDescriptor]) -> Result<()> {
    let mut seen = HashSet::new();
    for svc in services {
        if !seen.insert(svc.name.as_str()) {
            return Err(HearthError::DuplicateService {
                name: svc.name.clone(),
            });
        }
    }
    Ok(())
}

fn check_image_present(services: &[ServiceDescriptor]) -> Result<()> {
    for svc in services {
        if svc.image.source().trim().is_empty() {
            return Err(HearthError::Malformed {
                service: svc.name.clone(),
                field: "image".into(),
                message: "image reference is empty".into(),
            });
        }
    }
    Ok(())
}

fn check_dependency_references(services: &[ServiceDescriptor]) -> Result<()> {
    let names: HashSet<&str> = services.iter().map(|s| s.name.as_str()).collect();

    for svc in services {
        for dep in &svc.depends_on {
            if *dep == svc.name {
                return Err(HearthError::DependencyCycle {
                    services: vec![svc.name.clone()],
                });
            }
            if !names.contains(dep.as_str()) {
                return Err(HearthError::UnknownDependency {
                    service: svc.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;

    fn make_service(name: &str, image: &str, deps: &[&str]) -> ServiceDescriptor {
        ServiceDescriptor {
            name: name.into(),
            image: Template::parse(image).expect("image"),
            environment: Vec::new(),
            volumes: Vec::new(),
            ports: Vec::new(),
            restart: hearth_common::types::RestartPolicy::default(),
            depends_on: deps.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn validate_empty_catalog_succeeds() {
        assert!(validate(&[]).is_ok());
    }

    #[test]
    fn validate_valid_catalog_succeeds() {
        let services = vec![
            make_service("postgres", "postgres:16", &[]),
            make_service("nextcloud", "nextcloud:29", &["postgres"]),
        ];
        assert!(validate(&services).is_ok());
    }

    #[test]
    fn validate_duplicate_name_fails() {
        let services = vec![
            make_service("web", "nginx", &[]),
            make_service("web", "caddy", &[]),
        ];
        let msg = validate(&services).unwrap_err().to_string();
        assert!(msg.contains("duplicate service name"), "got: {msg}");
    }

    #[test]
    fn validate_unknown_dependency_fails() {
        let services = vec![make_service("app", "app", &["ghost"])];
        let msg = validate(&services).unwrap_err().to_string();
        assert!(msg.contains("ghost"), "got: {msg}");
        assert!(msg.contains("app"), "got: {msg}");
    }

    #[test]
    fn validate_self_dependency_fails() {
        let services = vec![make_service("loop", "img", &["loop"])];
        let err = validate(&services).unwrap_err();
        assert!(matches!(err, HearthError::DependencyCycle { .. }), "got: {err}");
    }

    #[test]
    fn validate_empty_image_fails() {
        let services = vec![make_service("blank", "  ", &[])];
        let msg = validate(&services).unwrap_err().to_string();
        assert!(msg.contains("`image`"), "got: {msg}");
    }

    #[test]
    fn validate_invalid_name_fails() {
        for bad in ["", "-leading", "has space", "slash/name"] {
            let services = vec![make_service(bad, "img", &[])];
            assert!(validate(&services).is_err(), "{bad:?} should be rejected");
        }
    }
}
