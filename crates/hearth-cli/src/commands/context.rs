//! Loading shared by the subcommands: catalog, layers, engine.

use std::sync::Arc;

use anyhow::Context;
use hearth_common::config::HearthConfig;
use hearth_compose::catalog::Catalog;
use hearth_compose::env::EnvironmentLayers;
use hearth_compose::resolver::{ResolvedCatalog, Resolver};
use hearth_runtime::backend::EngineAdapter;
use hearth_runtime::backend::docker::DockerCli;
use hearth_runtime::reconciler::Reconciler;

use super::GlobalArgs;

/// The loaded catalog and the resolver it is expanded with.
pub struct Workspace {
    /// Effective configuration.
    pub config: HearthConfig,
    /// Validated catalog.
    pub catalog: Catalog,
    /// Resolver over the loaded environment layers.
    pub resolver: Resolver,
}

impl Workspace {
    /// Loads the catalog and environment layers `global` points at.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog or an explicit environment file is
    /// unreadable or invalid.
    pub fn load(global: &GlobalArgs) -> anyhow::Result<Self> {
        let config = global.config();
        let catalog = Catalog::from_file(&config.catalog_file)
            .with_context(|| format!("loading catalog {}", config.catalog_file.display()))?;
        let layers = EnvironmentLayers::load(
            &config.env_files,
            !global.explicit_env_files(),
            config.inherit_process_env,
        )
        .context("loading environment layers")?;
        tracing::info!(
            catalog = %config.catalog_file.display(),
            services = catalog.len(),
            layers = layers.layers().len(),
            "configuration loaded"
        );
        let resolver = Resolver::new(layers, config.data_dir.clone());
        Ok(Self {
            config,
            catalog,
            resolver,
        })
    }

    /// Resolves every service of the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if a service with dependents cannot be resolved.
    pub fn resolve(&self) -> anyhow::Result<ResolvedCatalog> {
        self.resolver
            .resolve_catalog(&self.catalog)
            .context("resolving environment placeholders")
    }
}

/// Connects to the configured engine.
///
/// # Errors
///
/// Returns an error if the engine binary is missing or unreachable.
pub fn engine(config: &HearthConfig) -> anyhow::Result<Arc<dyn EngineAdapter>> {
    let engine = DockerCli::locate(&config.engine)?;
    if !engine.is_available() {
        anyhow::bail!(
            "container engine `{}` is installed but not responding (is its daemon running?)",
            engine.binary().display()
        );
    }
    Ok(Arc::new(engine))
}

/// Builds a reconciler over the configured engine.
///
/// # Errors
///
/// As [`engine`].
pub fn reconciler(config: &HearthConfig) -> anyhow::Result<Reconciler> {
    Ok(Reconciler::from_config(engine(config)?, config))
}
