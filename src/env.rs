use crate::shell::Shell;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const INTERPRETER: &str = "bin/python";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Registry,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    name: String,
    root: PathBuf,
    scope: Scope,
}

impl Environment {
    pub fn new(name: impl Into<String>, root: PathBuf, scope: Scope) -> Self {
        Self {
            name: name.into(),
            root,
            scope,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    // Same directory on disk, however it was spelled.
    pub fn same_root(&self, other: &Environment) -> bool {
        let left = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let right = other.root.canonicalize().unwrap_or_else(|_| other.root.clone());
        left == right
    }
}

pub fn is_valid(root: &Path, shell: Shell) -> bool {
    root.join(shell.activate_artifact()).is_file() && root.join(INTERPRETER).is_file()
}

#[cfg(test)]
pub(crate) fn make_env_dir(root: &Path) {
    use std::fs;
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::write(root.join("bin/activate"), "# activate\n").unwrap();
    fs::write(root.join("bin/activate.fish"), "# activate.fish\n").unwrap();
    fs::write(root.join(INTERPRETER), "").unwrap();
}
