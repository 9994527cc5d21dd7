use crate::config::Settings;
use crate::env::Environment;
use crate::error::BurrowError;
use crate::locate::{Locator, Lookup};
use crate::manager::ManagementSubsystem;
use crate::router::ManagementCommand;
use crate::shell::{Shell, ACTIVE_VAR};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const FOREIGN_ACTIVE_VAR: &str = "VIRTUAL_ENV";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Named(String),
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Toggle,
    ActivateNamed(Target),
    Deactivate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", content = "environment", rename_all = "snake_case")]
pub enum Effect {
    Deactivate(Environment),
    Activate(Environment),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Inactive,
    Active(Environment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "environment", rename_all = "snake_case")]
pub enum Status {
    Activated(Environment),
    Deactivated(Environment),
    AlreadyInactive,
}

#[derive(Debug)]
pub struct Outcome {
    pub effects: Vec<Effect>,
    pub result: Result<Status, BurrowError>,
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    settings: Settings,
    shell: Shell,
    cwd: PathBuf,
    interpreter: Option<PathBuf>,
    state: State,
}

pub fn active_marker<F>(vars: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    [ACTIVE_VAR, FOREIGN_ACTIVE_VAR]
        .into_iter()
        .filter_map(|key| vars(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
}

impl SessionContext {
    pub fn new(settings: Settings, shell: Shell, cwd: PathBuf, active: Option<&Path>) -> Self {
        let state = match active {
            Some(root) => {
                let locator = Locator::new(&settings, shell);
                State::Active(Environment::new(
                    locator.name_for_root(root),
                    root.to_path_buf(),
                    locator.scope_for_root(root),
                ))
            }
            None => State::Inactive,
        };
        Self {
            settings,
            shell,
            cwd,
            interpreter: None,
            state,
        }
    }

    pub fn with_interpreter(mut self, interpreter: PathBuf) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn step<M>(mut self, command: Command, manager: &M) -> (SessionContext, Outcome)
    where
        M: ManagementSubsystem + ?Sized,
    {
        debug!(?command, state = ?self.state, "transition");
        let mut effects = Vec::new();
        let result = match command {
            Command::Deactivate => Ok(match self.deactivate(&mut effects) {
                Some(env) => Status::Deactivated(env),
                None => Status::AlreadyInactive,
            }),
            Command::Toggle => match self.deactivate(&mut effects) {
                Some(env) => Ok(Status::Deactivated(env)),
                None => match self.resolve_toggle_target(manager) {
                    Ok(env) => self.activate(env, &mut effects),
                    Err(err) => Err(err),
                },
            },
            Command::ActivateNamed(target) => match self.resolve_target(&target) {
                Ok(env) => {
                    if let State::Active(current) = &self.state {
                        if current.same_root(&env) {
                            debug!(name = env.name(), "re-activating current environment");
                        }
                    }
                    // Always a clean re-activation, even for the same environment.
                    self.deactivate(&mut effects);
                    self.activate(env, &mut effects)
                }
                Err(err) => Err(err),
            },
        };
        (self, Outcome { effects, result })
    }

    fn deactivate(&mut self, effects: &mut Vec<Effect>) -> Option<Environment> {
        match std::mem::replace(&mut self.state, State::Inactive) {
            State::Active(env) => {
                info!(name = env.name(), root = %env.root().display(), "deactivating");
                effects.push(Effect::Deactivate(env.clone()));
                Some(env)
            }
            State::Inactive => None,
        }
    }

    fn activate(
        &mut self,
        env: Environment,
        effects: &mut Vec<Effect>,
    ) -> Result<Status, BurrowError> {
        debug_assert!(matches!(self.state, State::Inactive));
        let failed = |reason: String| BurrowError::ActivationFailed {
            name: env.name().to_string(),
            root: env.root().to_path_buf(),
            reason,
        };
        let root = fs::canonicalize(env.root()).map_err(|err| failed(err.to_string()))?;
        if root.to_str().is_none() {
            return Err(failed("path is not valid UTF-8".to_string()));
        }
        let artifact = root.join(self.shell.activate_artifact());
        fs::File::open(&artifact).map_err(|err| {
            warn!(artifact = %artifact.display(), error = %err, "activation artifact unusable");
            failed(format!("{}: {err}", artifact.display()))
        })?;
        let env = Environment::new(env.name(), root, env.scope());
        info!(name = env.name(), root = %env.root().display(), "activating");
        effects.push(Effect::Activate(env.clone()));
        self.state = State::Active(env.clone());
        Ok(Status::Activated(env))
    }

    fn resolve_target(&self, target: &Target) -> Result<Environment, BurrowError> {
        let locator = Locator::new(&self.settings, self.shell);
        match target {
            Target::Local => {
                locator
                    .nearest_local(&self.cwd)
                    .ok_or_else(|| BurrowError::LocalMissing {
                        marker: self.settings.local_marker().to_string(),
                        cwd: self.cwd.clone(),
                    })
            }
            Target::Named(name) => match locator.by_name(name) {
                Lookup::Found(env) => Ok(env),
                Lookup::Missing(root) => {
                    debug!(name, root = %root.display(), "named environment missing");
                    Err(BurrowError::NamedNotFound {
                        name: name.clone(),
                        root: self.settings.registry_root().to_path_buf(),
                    })
                }
                Lookup::InvalidName => Err(BurrowError::NamedNotFound {
                    name: name.clone(),
                    root: self.settings.registry_root().to_path_buf(),
                }),
            },
        }
    }

    fn resolve_toggle_target<M>(&self, manager: &M) -> Result<Environment, BurrowError>
    where
        M: ManagementSubsystem + ?Sized,
    {
        let policy = self.settings.toggle();
        let locator = Locator::new(&self.settings, self.shell);
        if policy.searches_local() {
            if let Some(env) = locator.nearest_local(&self.cwd) {
                return Ok(env);
            }
        }
        let default = if policy.uses_default() {
            self.settings.default_env()
        } else {
            None
        };
        let Some(default) = default else {
            return Err(BurrowError::NoEnvironment(format!(
                "no local environment '{}' above {} and no default environment configured",
                self.settings.local_marker(),
                self.cwd.display()
            )));
        };
        match locator.by_name(default) {
            Lookup::Found(env) => return Ok(env),
            Lookup::InvalidName => {
                return Err(BurrowError::NoEnvironment(format!(
                    "default environment '{default}' is not a valid registry name"
                )))
            }
            Lookup::Missing(_) => {}
        }
        if !self.settings.autocreate() {
            return Err(BurrowError::NoEnvironment(format!(
                "default environment '{default}' does not exist in {} and autocreate is off",
                self.settings.registry_root().display()
            )));
        }

        info!(name = default, "creating default environment");
        let args = vec![
            ManagementCommand::New.keyword().to_string(),
            default.to_string(),
        ];
        let envs = self
            .settings
            .to_env(self.shell, self.interpreter.as_deref());
        match manager.run(&args, &envs) {
            Ok(0) => {}
            Ok(code) => {
                return Err(BurrowError::NoEnvironment(format!(
                    "cannot activate default environment '{default}': `{} new {default}` exited with status {code}",
                    manager.program()
                )))
            }
            Err(err) => {
                return Err(BurrowError::NoEnvironment(format!(
                    "cannot activate default environment '{default}': `{}` could not be started: {err}",
                    manager.program()
                )))
            }
        }
        match locator.by_name(default) {
            Lookup::Found(env) => Ok(env),
            _ => Err(BurrowError::NoEnvironment(format!(
                "cannot activate default environment '{default}': still missing after creation"
            ))),
        }
    }
}
