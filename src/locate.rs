use crate::config::Settings;
use crate::env::{is_valid, Environment, Scope};
use crate::shell::Shell;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Environment),
    Missing(PathBuf),
    InvalidName,
}

pub struct Locator<'a> {
    settings: &'a Settings,
    shell: Shell,
}

impl<'a> Locator<'a> {
    pub fn new(settings: &'a Settings, shell: Shell) -> Self {
        Self { settings, shell }
    }

    pub fn by_name(&self, name: &str) -> Lookup {
        if !is_registry_name(name) {
            debug!(name, "rejected environment name");
            return Lookup::InvalidName;
        }
        let root = self.settings.registry_root().join(name);
        if is_valid(&root, self.shell) {
            debug!(name, root = %root.display(), "registry environment found");
            Lookup::Found(Environment::new(name, root, Scope::Registry))
        } else {
            debug!(name, root = %root.display(), "no valid registry environment");
            Lookup::Missing(root)
        }
    }

    pub fn nearest_local(&self, cwd: &Path) -> Option<Environment> {
        let found = self.local_candidates(cwd).next();
        if found.is_none() {
            debug!(cwd = %cwd.display(), marker = self.settings.local_marker(), "no local environment");
        }
        found
    }

    pub fn local_candidates(&self, cwd: &Path) -> LocalCandidates<'_> {
        LocalCandidates {
            next_dir: Some(cwd.to_path_buf()),
            marker: self.settings.local_marker(),
            shell: self.shell,
        }
    }

    pub fn name_for_root(&self, root: &Path) -> String {
        let registry = self.settings.registry_root();
        let registry = registry.canonicalize().unwrap_or_else(|_| registry.to_path_buf());
        let resolved = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        if let Ok(relative) = resolved.strip_prefix(&registry) {
            if !relative.as_os_str().is_empty() {
                return relative.to_string_lossy().to_string();
            }
        }
        let dir_name = |path: &Path| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_string())
        };
        if dir_name(&resolved).as_deref() == Some(self.settings.local_marker()) {
            if let Some(project) = resolved.parent().and_then(dir_name) {
                return project;
            }
        }
        dir_name(&resolved).unwrap_or_else(|| resolved.to_string_lossy().to_string())
    }

    pub fn scope_for_root(&self, root: &Path) -> Scope {
        let registry = self.settings.registry_root();
        let registry = registry.canonicalize().unwrap_or_else(|_| registry.to_path_buf());
        let resolved = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        if resolved.starts_with(&registry) && resolved != registry {
            Scope::Registry
        } else {
            Scope::Local
        }
    }
}

// Walks from a directory up to the filesystem root, yielding every valid
// local environment on the way, nearest first. Restart by calling
// `Locator::local_candidates` again.
pub struct LocalCandidates<'a> {
    next_dir: Option<PathBuf>,
    marker: &'a str,
    shell: Shell,
}

impl Iterator for LocalCandidates<'_> {
    type Item = Environment;

    fn next(&mut self) -> Option<Environment> {
        while let Some(dir) = self.next_dir.take() {
            self.next_dir = dir.parent().map(Path::to_path_buf);
            let candidate = dir.join(self.marker);
            trace!(candidate = %candidate.display(), "checking local marker");
            if is_valid(&candidate, self.shell) {
                let name = dir
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| dir.to_string_lossy().to_string());
                return Some(Environment::new(name, candidate, Scope::Local));
            }
        }
        None
    }
}

pub fn is_registry_name(name: &str) -> bool {
    if name.trim().is_empty() {
        return false;
    }
    Path::new(name)
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
}
