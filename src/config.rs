use crate::error::BurrowError;
use crate::locate::is_registry_name;
use crate::shell::Shell;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const CONFIG_VERSION: u32 = 1;

pub const VAR_CONFIG: &str = "BURROW_CONFIG";
pub const VAR_CONFIG_DIR: &str = "BURROW_CONFIG_DIR";
pub const VAR_ROOT: &str = "BURROW_ROOT";
pub const VAR_DEFAULT: &str = "BURROW_DEFAULT";
pub const VAR_LOCAL: &str = "BURROW_LOCAL";
pub const VAR_PYTHON: &str = "BURROW_PYTHON";
pub const VAR_TOGGLE: &str = "BURROW_TOGGLE";
pub const VAR_AUTOCREATE: &str = "BURROW_AUTOCREATE";
pub const VAR_MANAGER: &str = "BURROW_MANAGER";
pub const VAR_SHELL: &str = "BURROW_SHELL";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TogglePolicy {
    Local,
    Default,
    LocalThenDefault,
}

impl TogglePolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Some(TogglePolicy::Local),
            "default" => Some(TogglePolicy::Default),
            "local-then-default" => Some(TogglePolicy::LocalThenDefault),
            _ => None,
        }
    }

    pub fn searches_local(self) -> bool {
        matches!(self, TogglePolicy::Local | TogglePolicy::LocalThenDefault)
    }

    pub fn uses_default(self) -> bool {
        matches!(self, TogglePolicy::Default | TogglePolicy::LocalThenDefault)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    version: u32,
    registry_root: String,
    default_env: String,
    local_marker: String,
    interpreter: Option<String>,
    toggle: TogglePolicy,
    autocreate: bool,
    manager: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            registry_root: "~/.burrow".to_string(),
            default_env: "default".to_string(),
            local_marker: ".burrow".to_string(),
            interpreter: None,
            toggle: TogglePolicy::LocalThenDefault,
            autocreate: true,
            manager: "burrow-manage".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    registry_root: PathBuf,
    default_env: Option<String>,
    local_marker: String,
    interpreter: Option<PathBuf>,
    toggle: TogglePolicy,
    autocreate: bool,
    manager: String,
    source: Option<PathBuf>,
}

impl Settings {
    pub fn resolve<F>(config_path: &Path, vars: F) -> Result<Settings, BurrowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (mut file, source) = match fs::read_to_string(config_path) {
            Ok(content) => (read_config_from_str(&content)?, Some(config_path.to_path_buf())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => (FileConfig::default(), None),
            Err(err) => {
                return Err(BurrowError::Configuration(format!(
                    "cannot read {}: {err}",
                    config_path.display()
                )))
            }
        };
        debug!(path = %config_path.display(), loaded = source.is_some(), "config file");

        if let Some(value) = vars(VAR_ROOT) {
            file.registry_root = value;
        }
        if let Some(value) = vars(VAR_DEFAULT) {
            file.default_env = value;
        }
        if let Some(value) = vars(VAR_LOCAL) {
            file.local_marker = value;
        }
        if let Some(value) = vars(VAR_PYTHON) {
            file.interpreter = Some(value);
        }
        if let Some(value) = vars(VAR_TOGGLE) {
            file.toggle = TogglePolicy::parse(&value).ok_or_else(|| {
                BurrowError::Configuration(format!(
                    "{VAR_TOGGLE} must be one of local, default, local-then-default (got '{value}')"
                ))
            })?;
        }
        if let Some(value) = vars(VAR_AUTOCREATE) {
            file.autocreate = parse_flag(&value).ok_or_else(|| {
                BurrowError::Configuration(format!(
                    "{VAR_AUTOCREATE} must be a boolean (got '{value}')"
                ))
            })?;
        }
        if let Some(value) = vars(VAR_MANAGER) {
            file.manager = value;
        }

        let registry_root = expand_path(file.registry_root.trim());
        if registry_root.as_os_str().is_empty() {
            return Err(BurrowError::Configuration(
                "registry root must not be empty".to_string(),
            ));
        }
        let local_marker = file.local_marker.trim().to_string();
        if !is_single_component(&local_marker) {
            return Err(BurrowError::Configuration(format!(
                "local marker must be a plain directory name (got '{local_marker}')"
            )));
        }
        let default_env = Some(file.default_env.trim().to_string()).filter(|name| !name.is_empty());
        if let Some(name) = default_env.as_deref() {
            if !is_registry_name(name) {
                return Err(BurrowError::Configuration(format!(
                    "default environment must be a name inside the registry (got '{name}')"
                )));
            }
        }
        let interpreter = file
            .interpreter
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(expand_path);
        if file.manager.trim().is_empty() {
            return Err(BurrowError::Configuration(
                "management command must not be empty".to_string(),
            ));
        }

        Ok(Settings {
            registry_root,
            default_env,
            local_marker,
            interpreter,
            toggle: file.toggle,
            autocreate: file.autocreate,
            manager: file.manager.trim().to_string(),
            source,
        })
    }

    pub fn registry_root(&self) -> &Path {
        &self.registry_root
    }

    pub fn default_env(&self) -> Option<&str> {
        self.default_env.as_deref()
    }

    pub fn local_marker(&self) -> &str {
        &self.local_marker
    }

    pub fn toggle(&self) -> TogglePolicy {
        self.toggle
    }

    pub fn autocreate(&self) -> bool {
        self.autocreate
    }

    pub fn manager(&self) -> &str {
        &self.manager
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn interpreter(&self) -> Result<PathBuf, BurrowError> {
        if let Some(path) = &self.interpreter {
            if path.is_file() {
                return Ok(path.clone());
            }
            // Bare names such as `python3.12` are looked up on PATH.
            if path.components().count() == 1 {
                if let Ok(found) = which::which(path) {
                    return Ok(found);
                }
            }
            return Err(BurrowError::Configuration(format!(
                "python interpreter not found: {} (from {VAR_PYTHON} or config)",
                path.display()
            )));
        }
        which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|_| {
                BurrowError::Configuration(format!(
                    "no python interpreter found on PATH; install python3 or set {VAR_PYTHON}"
                ))
            })
    }

    pub fn ensure_registry_root(&self) -> Result<(), BurrowError> {
        fs::create_dir_all(&self.registry_root).map_err(|source| {
            BurrowError::RegistryUncreatable {
                path: self.registry_root.clone(),
                source,
            }
        })?;
        if !self.registry_root.is_dir() {
            return Err(BurrowError::RegistryUncreatable {
                path: self.registry_root.clone(),
                source: io::Error::new(io::ErrorKind::Other, "not a directory"),
            });
        }
        Ok(())
    }

    pub fn to_env(&self, shell: Shell, interpreter: Option<&Path>) -> BTreeMap<String, String> {
        let mut envs = BTreeMap::new();
        envs.insert(
            VAR_ROOT.to_string(),
            self.registry_root.to_string_lossy().to_string(),
        );
        envs.insert(
            VAR_DEFAULT.to_string(),
            self.default_env.clone().unwrap_or_default(),
        );
        envs.insert(VAR_LOCAL.to_string(), self.local_marker.clone());
        if let Some(python) = interpreter {
            envs.insert(VAR_PYTHON.to_string(), python.to_string_lossy().to_string());
        }
        envs.insert(VAR_SHELL.to_string(), shell.name().to_string());
        envs
    }
}

pub fn resolve_config_path<F>(override_path: Option<&PathBuf>, vars: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = override_path {
        return path.clone();
    }
    if let Some(path) = vars(VAR_CONFIG) {
        return PathBuf::from(path);
    }
    let mut base = match vars(VAR_CONFIG_DIR) {
        Some(dir) => PathBuf::from(dir),
        None => {
            let mut base = home_dir().unwrap_or_else(|| PathBuf::from("."));
            base.push(".config");
            base.push("burrow");
            base
        }
    };
    base.push("config.yaml");
    base
}

fn read_config_from_str(content: &str) -> Result<FileConfig, BurrowError> {
    let cfg: FileConfig = serde_yaml::from_str(content)?;
    if cfg.version != CONFIG_VERSION {
        return Err(BurrowError::Configuration(format!(
            "unsupported config version {}",
            cfg.version
        )));
    }
    Ok(cfg)
}

fn expand_path(input: &str) -> PathBuf {
    if input == "~" {
        if let Some(home) = home_dir() {
            return home;
        }
    }
    if let Some(stripped) = input.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(input)
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_file() {
        let dir = tempdir().unwrap();
        let settings = Settings::resolve(&dir.path().join("missing.yaml"), vars(&[])).unwrap();
        assert_eq!(settings.default_env(), Some("default"));
        assert_eq!(settings.local_marker(), ".burrow");
        assert_eq!(settings.toggle(), TogglePolicy::LocalThenDefault);
        assert!(settings.autocreate());
        assert_eq!(settings.manager(), "burrow-manage");
        assert!(settings.source().is_none());
        assert!(!settings.registry_root().starts_with("~"));
    }

    #[test]
    fn env_vars_override_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "version: 1\nregistry_root: /srv/envs\ndefault_env: main\ntoggle: local\n",
        )
        .unwrap();
        let settings = Settings::resolve(
            &path,
            vars(&[(VAR_DEFAULT, "other"), (VAR_AUTOCREATE, "no")]),
        )
        .unwrap();
        assert_eq!(settings.registry_root(), Path::new("/srv/envs"));
        assert_eq!(settings.default_env(), Some("other"));
        assert_eq!(settings.toggle(), TogglePolicy::Local);
        assert!(!settings.autocreate());
        assert_eq!(settings.source(), Some(path.as_path()));
    }

    #[test]
    fn config_unknown_field_errors() {
        let result = read_config_from_str("version: 1\nunknown: true\n");
        assert!(matches!(result, Err(BurrowError::Yaml(_))));
    }

    #[test]
    fn config_wrong_version_errors() {
        let err = read_config_from_str("version: 7\n").unwrap_err();
        assert!(err.to_string().contains("unsupported config version 7"));
    }

    #[test]
    fn empty_default_disables_default_env() {
        let dir = tempdir().unwrap();
        let settings =
            Settings::resolve(&dir.path().join("none.yaml"), vars(&[(VAR_DEFAULT, "")])).unwrap();
        assert_eq!(settings.default_env(), None);
    }

    #[test]
    fn default_env_outside_registry_is_rejected() {
        let dir = tempdir().unwrap();
        for name in ["../escape", "/abs", "a/../b", "./web"] {
            let err = Settings::resolve(&dir.path().join("none.yaml"), vars(&[(VAR_DEFAULT, name)]))
                .unwrap_err();
            assert_eq!(err.exit_code(), crate::error::EXIT_CONFIGURATION, "{name}");
        }
        let nested =
            Settings::resolve(&dir.path().join("none.yaml"), vars(&[(VAR_DEFAULT, "work/api")]))
                .unwrap();
        assert_eq!(nested.default_env(), Some("work/api"));
    }

    #[test]
    fn invalid_toggle_policy_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let err = Settings::resolve(&dir.path().join("none.yaml"), vars(&[(VAR_TOGGLE, "sideways")]))
            .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIGURATION);
    }

    #[test]
    fn local_marker_must_be_one_component() {
        let dir = tempdir().unwrap();
        for marker in ["a/b", "..", "/abs", ""] {
            let err = Settings::resolve(&dir.path().join("none.yaml"), vars(&[(VAR_LOCAL, marker)]))
                .unwrap_err();
            assert!(err.to_string().contains("local marker"), "{marker}");
        }
    }

    #[test]
    fn interpreter_override_must_exist() {
        let dir = tempdir().unwrap();
        let python = dir.path().join("python3");
        let settings = Settings::resolve(
            &dir.path().join("none.yaml"),
            vars(&[(VAR_PYTHON, python.to_str().unwrap())]),
        )
        .unwrap();
        assert!(settings.interpreter().is_err());
        fs::write(&python, "").unwrap();
        assert_eq!(settings.interpreter().unwrap(), python);
    }

    #[test]
    fn ensure_registry_root_is_idempotent() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("envs");
        let settings = Settings::resolve(
            &dir.path().join("none.yaml"),
            vars(&[(VAR_ROOT, root.to_str().unwrap())]),
        )
        .unwrap();
        settings.ensure_registry_root().unwrap();
        settings.ensure_registry_root().unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn registry_root_blocked_by_file_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let settings = Settings::resolve(
            &dir.path().join("none.yaml"),
            vars(&[(VAR_ROOT, blocker.join("envs").to_str().unwrap())]),
        )
        .unwrap();
        let err = settings.ensure_registry_root().unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_REGISTRY_UNCREATABLE);
    }

    #[test]
    fn config_path_resolution_order() {
        let explicit = PathBuf::from("/tmp/explicit.yaml");
        assert_eq!(
            resolve_config_path(Some(&explicit), vars(&[(VAR_CONFIG, "/tmp/env.yaml")])),
            explicit
        );
        assert_eq!(
            resolve_config_path(None, vars(&[(VAR_CONFIG, "/tmp/env.yaml")])),
            PathBuf::from("/tmp/env.yaml")
        );
        assert_eq!(
            resolve_config_path(None, vars(&[(VAR_CONFIG_DIR, "/tmp/cfg")])),
            PathBuf::from("/tmp/cfg/config.yaml")
        );
    }

    #[test]
    fn manager_env_carries_resolved_settings() {
        let dir = tempdir().unwrap();
        let settings = Settings::resolve(
            &dir.path().join("none.yaml"),
            vars(&[(VAR_ROOT, "/srv/envs"), (VAR_DEFAULT, "")]),
        )
        .unwrap();
        let envs = settings.to_env(Shell::Fish, Some(Path::new("/usr/bin/python3")));
        assert_eq!(envs[VAR_ROOT], "/srv/envs");
        assert_eq!(envs[VAR_DEFAULT], "");
        assert_eq!(envs[VAR_PYTHON], "/usr/bin/python3");
        assert_eq!(envs[VAR_SHELL], "fish");
    }
}
