//! Error taxonomy for a load-test run.
//!
//! Errors fall into two groups:
//! - Setup: bad flags, bootstrap, authentication, container creation or
//!   traversal failures. These end the process with [`EXIT_FATAL`].
//! - Item: a single directory or object failed one of its steps. The item's
//!   remaining steps are abandoned; siblings and the batch carry on.
//!
//! Nothing is retried.

use std::fmt;

/// Exit status used for every fatal setup failure.
pub const EXIT_FATAL: i32 = 2;

/// The step of a per-item operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Hash,
    Stat,
    Open,
    Upload,
    Size,
    CreateLocal,
    Download,
    Verify,
    Delete,
    DirectoryCreate,
    DirectoryLocal,
    DirectoryDelete,
}

impl Stage {
    pub fn description(self) -> &'static str {
        match self {
            Stage::Hash => "creating object hash",
            Stage::Stat => "querying object",
            Stage::Open => "opening file",
            Stage::Upload => "uploading object",
            Stage::Size => "with the uploaded object",
            Stage::CreateLocal => "creating file",
            Stage::Download => "downloading object",
            Stage::Verify => "verifying downloaded object",
            Stage::Delete => "deleting object",
            Stage::DirectoryCreate => "creating directory",
            Stage::DirectoryLocal => "creating local directory",
            Stage::DirectoryDelete => "deleting directory object",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A per-directory or per-object failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub stage: Stage,
    /// Object path (or download path for local steps) of the failed item.
    pub path: String,
    /// Rendered cause chain.
    pub message: String,
}

impl ItemError {
    pub fn new(stage: Stage, path: impl Into<String>, err: eyre::Report) -> Self {
        Self {
            stage,
            path: path.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn msg(stage: Stage, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "problem {} '{}': {}",
            self.stage, self.path, self.message
        )
    }
}

impl std::error::Error for ItemError {}

/// The run phase a fatal error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    Flags,
    Bootstrap,
    Connect,
    Authenticate,
    CreateContainer,
    Walk,
}

impl SetupPhase {
    /// Operator-facing headline printed after `ERROR:`.
    pub fn headline(self) -> &'static str {
        match self {
            SetupPhase::Flags => "Invalid arguments",
            SetupPhase::Bootstrap => "Problem preparing the local 'logs' and 'downloads' directories",
            SetupPhase::Connect => "Problem setting up the storage connection",
            SetupPhase::Authenticate => "Authentication failed.",
            SetupPhase::CreateContainer => "Problem creating the specified bucket",
            SetupPhase::Walk => "Problem discovering a file",
        }
    }
}

/// A failure that aborts the whole run.
#[derive(Debug)]
pub struct SetupError {
    pub phase: SetupPhase,
    pub source: eyre::Report,
}

impl SetupError {
    pub fn new(phase: SetupPhase, source: eyre::Report) -> Self {
        Self { phase, source }
    }

    pub fn exit_code(&self) -> i32 {
        EXIT_FATAL
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.phase.headline(), self.source)
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let inner: &(dyn std::error::Error + 'static) = self.source.as_ref();
        Some(inner)
    }
}

/// Helper for tagging a fallible setup step with its phase.
pub trait SetupContext<T> {
    fn phase(self, phase: SetupPhase) -> Result<T, SetupError>;
}

impl<T> SetupContext<T> for eyre::Result<T> {
    fn phase(self, phase: SetupPhase) -> Result<T, SetupError> {
        self.map_err(|source| SetupError::new(phase, source))
    }
}
