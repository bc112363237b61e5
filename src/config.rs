use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ROTATIONS: usize = 14;
pub const DEFAULT_REMOTE_PATH: &str = "/var/log/nginx/access.log";

/// Connection settings for the remote host. The password is used for `sudo`.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub user: String,
    pub host: String,
    pub password: String,
    pub port: u16,
    pub timeout: Duration,
}

// Keep the password out of debug output.
impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Fully resolved run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// `None` when running against the local cache only.
    pub remote: Option<RemoteConfig>,
    pub remote_path: String,
    pub name: String,
    pub cache_dir: PathBuf,
    pub max_rotations: usize,
}

/// Raw settings as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub user: Option<String>,
    pub host: Option<String>,
    pub password: Option<String>,
    pub port: u16,
    pub timeout_secs: u64,
    pub remote_path: String,
    pub name: String,
    pub cache_dir: PathBuf,
    pub max_rotations: usize,
    pub local_only: bool,
}

impl Config {
    /// Resolve settings against the process environment.
    pub fn resolve(overrides: Overrides) -> Result<Self, ConfigError> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve settings, consulting `env` for anything not given explicitly.
    ///
    /// An explicit value always wins. Empty strings count as absent.
    pub fn resolve_with<F>(overrides: Overrides, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if overrides.max_rotations == 0 {
            return Err(ConfigError::NoRotations);
        }

        let remote = if overrides.local_only {
            None
        } else {
            if overrides.timeout_secs == 0 {
                return Err(ConfigError::ZeroTimeout);
            }
            let pick = |explicit: Option<String>, field: &'static str, var: &'static str| {
                explicit
                    .filter(|v| !v.is_empty())
                    .or_else(|| env(var).filter(|v| !v.is_empty()))
                    .ok_or(ConfigError::Missing { field, env: var })
            };
            Some(RemoteConfig {
                user: pick(overrides.user, "user", "USER")?,
                host: pick(overrides.host, "host", "HOST")?,
                password: pick(overrides.password, "password", "PASSWORD")?,
                port: overrides.port,
                timeout: Duration::from_secs(overrides.timeout_secs),
            })
        };

        Ok(Config {
            remote,
            remote_path: overrides.remote_path,
            name: overrides.name,
            cache_dir: overrides.cache_dir,
            max_rotations: overrides.max_rotations,
        })
    }
}
