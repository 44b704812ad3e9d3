//! Domain primitive types used across the Hearth workspace.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of one reconciliation cycle, used to correlate log lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(String);

impl CycleId {
    /// Generates a random cycle ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container restart policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never restart the container.
    Never,
    /// Restart only when the process exits with a non-zero status.
    OnFailure,
    /// Always restart unless explicitly stopped.
    #[default]
    UnlessStopped,
}

impl RestartPolicy {
    /// Returns the value the container engine expects for `--restart`.
    #[must_use]
    pub const fn engine_flag(self) -> &'static str {
        match self {
            Self::Never => "no",
            Self::OnFailure => "on-failure",
            Self::UnlessStopped => "unless-stopped",
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => write!(f, "never"),
            Self::OnFailure => write!(f, "on-failure"),
            Self::UnlessStopped => write!(f, "unless-stopped"),
        }
    }
}

/// Transport protocol of a published port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP (the default).
    #[default]
    Tcp,
    /// UDP.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(format!("unknown protocol \"{other}\" (expected tcp or udp)")),
        }
    }
}

/// A host directory mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VolumeBinding {
    /// Absolute host path, always under the configured data directory.
    pub host: PathBuf,
    /// Mount point inside the container.
    pub container: String,
    /// Whether the mount is read-only.
    #[serde(default)]
    pub read_only: bool,
}

impl fmt::Display for VolumeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host.display(), self.container)?;
        if self.read_only {
            write!(f, ":ro")?;
        }
        Ok(())
    }
}

/// A container port published on the host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortBinding {
    /// Host interface to bind, all interfaces when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    /// Port on the host.
    pub host: u16,
    /// Port inside the container.
    pub container: u16,
    /// Transport protocol.
    #[serde(default)]
    pub protocol: Protocol,
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref ip) = self.host_ip {
            write!(f, "{ip}:")?;
        }
        write!(f, "{}:{}", self.host, self.container)?;
        if self.protocol == Protocol::Udp {
            write!(f, "/udp")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_policy_deserializes_kebab_case() {
        let policy: RestartPolicy = serde_json::from_str("\"on-failure\"").expect("parse");
        assert_eq!(policy, RestartPolicy::OnFailure);
        assert_eq!(RestartPolicy::default(), RestartPolicy::UnlessStopped);
    }

    #[test]
    fn restart_never_maps_to_engine_no() {
        assert_eq!(RestartPolicy::Never.engine_flag(), "no");
    }

    #[test]
    fn port_binding_display_matches_engine_syntax() {
        let port = PortBinding {
            host_ip: Some("127.0.0.1".into()),
            host: 5353,
            container: 53,
            protocol: Protocol::Udp,
        };
        assert_eq!(port.to_string(), "127.0.0.1:5353:53/udp");
    }

    #[test]
    fn volume_binding_display_marks_read_only() {
        let volume = VolumeBinding {
            host: PathBuf::from("/srv/hearth/media"),
            container: "/media".into(),
            read_only: true,
        };
        assert_eq!(volume.to_string(), "/srv/hearth/media:/media:ro");
    }

    #[test]
    fn cycle_ids_are_unique() {
        assert_ne!(CycleId::generate(), CycleId::generate());
    }
}
