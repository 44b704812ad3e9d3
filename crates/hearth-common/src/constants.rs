//! System-wide constants and default paths.

/// Default base directory for service data on the home server.
pub const DEFAULT_DATA_DIR: &str = "/srv/hearth";

/// Default catalog file name, looked up in the working directory.
pub const DEFAULT_CATALOG_FILE: &str = "hearth.yaml";

/// Default environment layer holding shared defaults.
pub const DEFAULT_ENV_FILE: &str = "hearth.env";

/// Default environment layer holding machine-specific overrides.
pub const LOCAL_ENV_FILE: &str = "hearth.local.env";

/// Default container engine binary.
pub const DEFAULT_ENGINE: &str = "docker";

/// Default number of engine actions executed concurrently.
pub const DEFAULT_WORKERS: usize = 4;

/// Default per-action timeout in seconds.
pub const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 120;

/// Label marking a container as managed by Hearth.
pub const LABEL_MANAGED: &str = "hearth.managed";

/// Label carrying the service name of a managed container.
pub const LABEL_SERVICE: &str = "hearth.service";

/// Label carrying the serialized desired state a container was started with.
pub const LABEL_SPEC: &str = "hearth.spec";

