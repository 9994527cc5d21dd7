use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub const EXIT_OK: i32 = 0;
pub const EXIT_NOT_SOURCED: i32 = 3;
pub const EXIT_CONFIGURATION: i32 = 4;
pub const EXIT_REGISTRY_UNCREATABLE: i32 = 5;
pub const EXIT_NO_ENVIRONMENT: i32 = 6;
pub const EXIT_LOCAL_MISSING: i32 = 7;
pub const EXIT_ACTIVATION_FAILED: i32 = 8;
pub const EXIT_NAMED_NOT_FOUND: i32 = 9;
pub const EXIT_MANAGER_UNAVAILABLE: i32 = 127;

#[derive(Debug, Error)]
pub enum BurrowError {
    #[error(
        "burrow must run through its shell function to change the session; \
         try: eval \"$(burrow --print-shim {shell})\""
    )]
    NotSourced { shell: String },
    #[error("config error: {0}")]
    Configuration(String),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("cannot create registry root {}: {source}", path.display())]
    RegistryUncreatable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no environment found: {0}")]
    NoEnvironment(String),
    #[error(
        "no local environment '{marker}' found in {} or any parent directory; create one with `burrow new --here`",
        cwd.display()
    )]
    LocalMissing { marker: String, cwd: PathBuf },
    #[error("cannot activate {name} ({}): {reason}", root.display())]
    ActivationFailed {
        name: String,
        root: PathBuf,
        reason: String,
    },
    #[error(
        "environment '{name}' not found in {}; list environments with `burrow list`",
        root.display()
    )]
    NamedNotFound { name: String, root: PathBuf },
    #[error("management command '{program}' is not available: {source}")]
    ManagerUnavailable {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl BurrowError {
    pub fn exit_code(&self) -> i32 {
        match self {
            BurrowError::NotSourced { .. } => EXIT_NOT_SOURCED,
            BurrowError::Configuration(_) | BurrowError::Yaml(_) => EXIT_CONFIGURATION,
            BurrowError::RegistryUncreatable { .. } => EXIT_REGISTRY_UNCREATABLE,
            BurrowError::NoEnvironment(_) => EXIT_NO_ENVIRONMENT,
            BurrowError::LocalMissing { .. } => EXIT_LOCAL_MISSING,
            BurrowError::ActivationFailed { .. } | BurrowError::Io(_) => EXIT_ACTIVATION_FAILED,
            BurrowError::NamedNotFound { .. } => EXIT_NAMED_NOT_FOUND,
            BurrowError::ManagerUnavailable { .. } => EXIT_MANAGER_UNAVAILABLE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BurrowError::NotSourced { .. } => "not_sourced",
            BurrowError::Configuration(_) | BurrowError::Yaml(_) => "configuration",
            BurrowError::RegistryUncreatable { .. } => "registry_uncreatable",
            BurrowError::NoEnvironment(_) => "no_environment",
            BurrowError::LocalMissing { .. } => "local_missing",
            BurrowError::ActivationFailed { .. } | BurrowError::Io(_) => "activation_failed",
            BurrowError::NamedNotFound { .. } => "named_not_found",
            BurrowError::ManagerUnavailable { .. } => "manager_unavailable",
        }
    }
}
