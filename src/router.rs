use crate::session::{Command, Target};

pub const LOCAL_SELECTORS: [&str; 3] = ["--here", "--local", "-l"];
pub const DEACTIVATE_TOKEN: &str = "--off";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementCommand {
    New,
    Delete,
    List,
    Status,
    Env,
    Clean,
    Attach,
    Detach,
    Exec,
    Setup,
    Install,
    Uninstall,
    Help,
}

impl ManagementCommand {
    pub const ALL: [ManagementCommand; 13] = [
        ManagementCommand::New,
        ManagementCommand::Delete,
        ManagementCommand::List,
        ManagementCommand::Status,
        ManagementCommand::Env,
        ManagementCommand::Clean,
        ManagementCommand::Attach,
        ManagementCommand::Detach,
        ManagementCommand::Exec,
        ManagementCommand::Setup,
        ManagementCommand::Install,
        ManagementCommand::Uninstall,
        ManagementCommand::Help,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            ManagementCommand::New => "new",
            ManagementCommand::Delete => "delete",
            ManagementCommand::List => "list",
            ManagementCommand::Status => "status",
            ManagementCommand::Env => "env",
            ManagementCommand::Clean => "clean",
            ManagementCommand::Attach => "attach",
            ManagementCommand::Detach => "detach",
            ManagementCommand::Exec => "exec",
            ManagementCommand::Setup => "setup",
            ManagementCommand::Install => "install",
            ManagementCommand::Uninstall => "uninstall",
            ManagementCommand::Help => "help",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            ManagementCommand::Delete => &["rm"],
            ManagementCommand::List => &["ls"],
            ManagementCommand::Attach => &["possess"],
            _ => &[],
        }
    }

    pub fn from_keyword(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.keyword() == token || command.aliases().contains(&token))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Transition(Command),
    Delegate {
        command: Option<ManagementCommand>,
        args: Vec<String>,
    },
}

pub fn classify(args: &[String]) -> Route {
    let Some(first) = args.first() else {
        return Route::Transition(Command::Toggle);
    };
    if let Some(command) = ManagementCommand::from_keyword(first) {
        return Route::Delegate {
            command: Some(command),
            args: args.to_vec(),
        };
    }
    if args.len() > 1 {
        return Route::Delegate {
            command: None,
            args: args.to_vec(),
        };
    }
    if LOCAL_SELECTORS.contains(&first.as_str()) {
        return Route::Transition(Command::ActivateNamed(Target::Local));
    }
    if first == DEACTIVATE_TOKEN {
        return Route::Transition(Command::Deactivate);
    }
    Route::Transition(Command::ActivateNamed(Target::Named(first.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn zero_args_toggle() {
        assert_eq!(classify(&[]), Route::Transition(Command::Toggle));
    }

    #[test]
    fn keywords_delegate_verbatim() {
        let input = args(&["new", "web", "--prompt", "x"]);
        assert_eq!(
            classify(&input),
            Route::Delegate {
                command: Some(ManagementCommand::New),
                args: input.clone(),
            }
        );
        assert_eq!(
            classify(&args(&["rm"])),
            Route::Delegate {
                command: Some(ManagementCommand::Delete),
                args: args(&["rm"]),
            }
        );
    }

    #[test]
    fn keyword_wins_over_environment_name() {
        // Even if a registry environment called "status" exists.
        assert!(matches!(
            classify(&args(&["status"])),
            Route::Delegate {
                command: Some(ManagementCommand::Status),
                ..
            }
        ));
    }

    #[test]
    fn single_argument_selects_target() {
        assert_eq!(
            classify(&args(&["web"])),
            Route::Transition(Command::ActivateNamed(Target::Named("web".to_string())))
        );
        for selector in LOCAL_SELECTORS {
            assert_eq!(
                classify(&args(&[selector])),
                Route::Transition(Command::ActivateNamed(Target::Local))
            );
        }
        assert_eq!(
            classify(&args(&["--off"])),
            Route::Transition(Command::Deactivate)
        );
    }

    #[test]
    fn multiple_unknown_arguments_fall_back_to_delegation() {
        let input = args(&["web", "api"]);
        assert_eq!(
            classify(&input),
            Route::Delegate {
                command: None,
                args: input.clone(),
            }
        );
        assert!(matches!(
            classify(&args(&["--here", "web"])),
            Route::Delegate { command: None, .. }
        ));
    }

    #[test]
    fn every_keyword_round_trips() {
        for command in ManagementCommand::ALL {
            assert_eq!(ManagementCommand::from_keyword(command.keyword()), Some(command));
        }
        assert_eq!(
            ManagementCommand::from_keyword("possess"),
            Some(ManagementCommand::Attach)
        );
        assert_eq!(ManagementCommand::from_keyword("web"), None);
        assert_eq!(ManagementCommand::from_keyword("--here"), None);
    }
}
