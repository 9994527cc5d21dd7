use std::collections::BTreeMap;
use std::io;
use std::process::{Command, Stdio};
use tracing::debug;

// Environment creation, deletion, listing and the other administrative verbs
// live in a separate program; burrow only forwards to it.
pub trait ManagementSubsystem {
    fn program(&self) -> &str;

    fn run(&self, args: &[String], env_overrides: &BTreeMap<String, String>) -> io::Result<i32>;
}

pub struct ExternalManager {
    program: String,
    stdout_to_stderr: bool,
}

impl ExternalManager {
    pub fn new(program: impl Into<String>, stdout_to_stderr: bool) -> Self {
        Self {
            program: program.into(),
            stdout_to_stderr,
        }
    }
}

impl ManagementSubsystem for ExternalManager {
    fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, args: &[String], env_overrides: &BTreeMap<String, String>) -> io::Result<i32> {
        debug!(program = %self.program, ?args, "delegating to management subsystem");
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        for (key, value) in env_overrides {
            cmd.env(key, value);
        }
        // In eval mode stdout belongs to the activation script.
        if self.stdout_to_stderr {
            cmd.stdout(Stdio::from(io::stderr()));
        }
        let status = cmd.status()?;
        let status_code = status
            .code()
            .unwrap_or(if status.success() { 0 } else { 1 });
        debug!(program = %self.program, status_code, "management subsystem finished");
        Ok(status_code)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub args: Vec<String>,
        pub env_overrides: BTreeMap<String, String>,
    }

    type Hook = Box<dyn Fn(&[String])>;

    #[derive(Default)]
    pub struct MockManager {
        calls: RefCell<Vec<RecordedCall>>,
        statuses: RefCell<Vec<io::Result<i32>>>,
        hook: Option<Hook>,
    }

    impl MockManager {
        pub fn with_hook(hook: impl Fn(&[String]) + 'static) -> Self {
            Self {
                hook: Some(Box::new(hook)),
                ..Self::default()
            }
        }

        pub fn push_status(&self, status: io::Result<i32>) {
            self.statuses.borrow_mut().push(status);
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.borrow().clone()
        }
    }

    impl ManagementSubsystem for MockManager {
        fn program(&self) -> &str {
            "mock-manage"
        }

        fn run(&self, args: &[String], env_overrides: &BTreeMap<String, String>) -> io::Result<i32> {
            self.calls.borrow_mut().push(RecordedCall {
                args: args.to_vec(),
                env_overrides: env_overrides.clone(),
            });
            if let Some(hook) = &self.hook {
                hook(args);
            }
            let mut queued = self.statuses.borrow_mut();
            if queued.is_empty() {
                return Ok(0);
            }
            queued.remove(0)
        }
    }
}
