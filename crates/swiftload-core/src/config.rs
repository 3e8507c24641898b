//! TOML run configuration and identity parsing.
//!
//! Every field is optional; the binary layers command-line flags on top of
//! whatever the file provides and falls back to built-in defaults.
//!
//! ```toml
//! [run]
//! label = "east"
//! batch = 3
//! dir = "uploads/small"
//! bucket = "loadtest"
//! parallelism = 64
//!
//! [swift]
//! endpoint = "https://auth-east.cloud.ca/v2.0"
//! identity = "tenant:user"
//! timeout_secs = 30
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub run: RunSection,
    pub swift: SwiftSection,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    pub label: Option<String>,
    pub batch: Option<u32>,
    pub dir: Option<PathBuf>,
    pub bucket: Option<String>,
    pub parallelism: Option<usize>,
    pub verify: Option<bool>,
    pub log_dir: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
}

#[derive(Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SwiftSection {
    pub endpoint: Option<String>,
    pub identity: Option<String>,
    pub password: Option<String>,
    pub insecure: Option<bool>,
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for SwiftSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwiftSection")
            .field("endpoint", &self.endpoint)
            .field("identity", &self.identity)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("insecure", &self.insecure)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

pub fn load_config_file(path: &Path) -> Result<FileConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str::<FileConfig>(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Keystone v2 identity, written `tenant:username` on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub tenant: String,
    pub username: String,
}

impl Identity {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once(':') {
            Some((tenant, username)) if !tenant.is_empty() && !username.is_empty() => Ok(Self {
                tenant: tenant.to_string(),
                username: username.to_string(),
            }),
            _ => bail!("The 'identity' needs to be formatted as '<tenant>:<username>'"),
        }
    }
}
