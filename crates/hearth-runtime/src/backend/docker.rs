//! Engine adapter that shells out to a Docker-compatible CLI.
//!
//! The desired state each container was started with is stored in the
//! `hearth.spec` label, so listing running instances never has to reverse
//! engineer environment or mounts from `docker inspect`.

use std::path::{Path, PathBuf};
use std::process::Command;

use hearth_common::constants::{LABEL_MANAGED, LABEL_SERVICE, LABEL_SPEC};
use hearth_common::error::{HearthError, Result};
use hearth_compose::resolver::ResolvedDescriptor;

use super::{EngineAdapter, InstanceState};

/// Adapter driving `docker` (or a CLI-compatible engine binary).
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    /// Locates `engine` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::NotFound`] if the binary cannot be found.
    pub fn locate(engine: &str) -> Result<Self> {
        let binary = which::which(engine).map_err(|_| HearthError::NotFound {
            kind: "container engine binary",
            id: format!("{engine} (install it or pass --engine)"),
        })?;
        tracing::debug!(binary = %binary.display(), "using container engine");
        Ok(Self { binary })
    }

    /// Uses an explicit binary path without looking it up.
    #[must_use]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Returns the engine binary path.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Runs the engine with `args`, returning its stdout.
    fn run(&self, operation: &'static str, target: &str, args: &[String]) -> Result<String> {
        tracing::debug!(binary = %self.binary.display(), ?args, "invoking engine");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| HearthError::Io {
                path: self.binary.clone(),
                source: e,
            })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(HearthError::Engine {
                operation,
                service: target.to_string(),
                message: format!("{} ({})", stderr.trim(), output.status),
            })
        }
    }
}

/// Builds the `run` arguments for `service`.
///
/// # Errors
///
/// Returns an error if the desired state cannot be serialized.
pub fn run_args(service: &ResolvedDescriptor) -> Result<Vec<String>> {
    let spec = serde_json::to_string(&InstanceState::desired(service))?;
    let mut args: Vec<String> = vec![
        "run".into(),
        "--detach".into(),
        "--name".into(),
        service.name.clone(),
        "--restart".into(),
        service.restart.engine_flag().into(),
        "--label".into(),
        format!("{LABEL_MANAGED}=true"),
        "--label".into(),
        format!("{LABEL_SERVICE}={}", service.name),
        "--label".into(),
        format!("{LABEL_SPEC}={spec}"),
    ];
    for (key, value) in &service.environment {
        args.push("--env".into());
        args.push(format!("{key}={value}"));
    }
    for volume in &service.volumes {
        args.push("--volume".into());
        args.push(volume.to_string());
    }
    for port in &service.ports {
        args.push("--publish".into());
        args.push(port.to_string());
    }
    args.push(service.image.clone());
    Ok(args)
}

/// Parses the output of `ps --format {{.Label "hearth.spec"}}`, one JSON
/// document per line. Lines without a readable spec are skipped.
#[must_use]
pub fn parse_ps_output(stdout: &str) -> Vec<InstanceState> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| match serde_json::from_str::<InstanceState>(line) {
            Ok(state) => Some(state.normalized()),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring managed container with unreadable spec label");
                None
            }
        })
        .collect()
}

impl EngineAdapter for DockerCli {
    fn name(&self) -> &str {
        self.binary
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("engine")
    }

    fn list_running(&self) -> Result<Vec<InstanceState>> {
        let stdout = self.run(
            "list",
            "*",
            &[
                "ps".into(),
                "--filter".into(),
                format!("label={LABEL_MANAGED}=true"),
                "--format".into(),
                format!("{{{{.Label \"{LABEL_SPEC}\"}}}}"),
            ],
        )?;
        Ok(parse_ps_output(&stdout))
    }

    fn start(&self, service: &ResolvedDescriptor) -> Result<()> {
        // A stopped container keeps its name reserved.
        let remove = ["rm".into(), "--force".into(), service.name.clone()];
        if let Err(e) = self.run("remove", &service.name, &remove) {
            tracing::debug!(service = %service.name, error = %e, "no leftover container to remove");
        }
        let _ = self.run("start", &service.name, &run_args(service)?)?;
        tracing::info!(service = %service.name, image = %service.image, "container started");
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<()> {
        let _ = self.run("stop", name, &["stop".into(), name.to_string()])?;
        let _ = self.run("remove", name, &["rm".into(), name.to_string()])?;
        tracing::info!(service = name, "container stopped");
        Ok(())
    }

    fn pull(&self, image: &str) -> Result<()> {
        let _ = self.run("pull", image, &["pull".into(), image.to_string()])?;
        tracing::info!(image, "image pulled");
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.run(
            "version",
            "*",
            &["version".into(), "--format".into(), "{{.Server.Version}}".into()],
        )
        .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use hearth_common::types::{PortBinding, Protocol, RestartPolicy, VolumeBinding};

    use super::*;

    fn service() -> ResolvedDescriptor {
        ResolvedDescriptor {
            name: "pihole".into(),
            image: "pihole/pihole:2024.07.0".into(),
            environment: vec![("TZ".into(), "UTC".into())],
            volumes: vec![VolumeBinding {
                host: PathBuf::from("/srv/hearth/pihole"),
                container: "/etc/pihole".into(),
                read_only: false,
            }],
            ports: vec![PortBinding {
                host_ip: None,
                host: 53,
                container: 53,
                protocol: Protocol::Udp,
            }],
            restart: RestartPolicy::Never,
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn run_args_map_every_binding() {
        let args = run_args(&service()).expect("args");
        let joined = args.join(" ");
        assert!(joined.starts_with("run --detach --name pihole --restart no"), "got: {joined}");
        assert!(joined.contains("--env TZ=UTC"), "got: {joined}");
        assert!(joined.contains("--volume /srv/hearth/pihole:/etc/pihole"), "got: {joined}");
        assert!(joined.contains("--publish 53:53/udp"), "got: {joined}");
        assert!(joined.contains("--label hearth.managed=true"), "got: {joined}");
        assert_eq!(args.last().map(String::as_str), Some("pihole/pihole:2024.07.0"));
    }

    #[test]
    fn spec_label_lists_back_as_desired_state() {
        let svc = service();
        let args = run_args(&svc).expect("args");
        let label = args
            .iter()
            .find_map(|a| a.strip_prefix("hearth.spec="))
            .expect("spec label");
        let listed = parse_ps_output(&format!("{label}\n\n"));
        assert_eq!(listed, vec![InstanceState::desired(&svc)]);
    }

    #[test]
    fn ps_output_skips_unlabelled_and_corrupt_lines() {
        let listed =
            parse_ps_output("\n<no value>\n{not json}\n{\"name\":\"a\",\"image\":\"img\"}\n");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "a");
        assert_eq!(listed[0].restart, RestartPolicy::UnlessStopped);
    }

    #[test]
    fn missing_engine_binary_is_not_found() {
        let err = DockerCli::locate("hearth-no-such-engine-binary").unwrap_err();
        assert!(err.to_string().contains("hearth-no-such-engine-binary"), "got: {err}");
    }

    #[test]
    fn failing_engine_command_surfaces_as_engine_error() {
        let engine = DockerCli::with_binary("false");
        let err = engine.pull("alpine:3.20").unwrap_err();
        assert!(
            matches!(err, HearthError::Engine { operation: "pull", .. }),
            "got: {err}"
        );
        assert!(!engine.is_available());
    }
}
