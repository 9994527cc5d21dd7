use crate::env::Environment;
use crate::session::Effect;
use clap::ValueEnum;
use std::fmt;
use std::path::Path;

pub const ACTIVE_VAR: &str = "BURROW_ACTIVE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    pub fn detect(explicit: Option<Shell>, shell_var: Option<&str>) -> Shell {
        if let Some(shell) = explicit {
            return shell;
        }
        let name = shell_var
            .and_then(|value| Path::new(value).file_name())
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        Shell::from_str(&name, true).unwrap_or(Shell::Bash)
    }

    pub fn name(self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
        }
    }

    pub fn activate_artifact(self) -> &'static str {
        match self {
            Shell::Bash | Shell::Zsh => "bin/activate",
            Shell::Fish => "bin/activate.fish",
        }
    }

    pub fn render(self, effects: &[Effect]) -> String {
        let mut script = String::new();
        for effect in effects {
            match effect {
                Effect::Deactivate(_) => self.push_deactivate(&mut script),
                Effect::Activate(env) => self.push_activate(&mut script, env),
            }
        }
        script
    }

    fn push_activate(self, script: &mut String, env: &Environment) {
        let activate = env.root().join(self.activate_artifact());
        let root = env.root().to_string_lossy();
        match self {
            Shell::Bash | Shell::Zsh => {
                script.push_str(&format!(". {}\n", posix_quote(&activate.to_string_lossy())));
                script.push_str(&format!("export {ACTIVE_VAR}={}\n", posix_quote(&root)));
            }
            Shell::Fish => {
                script.push_str(&format!("source {}\n", fish_quote(&activate.to_string_lossy())));
                script.push_str(&format!("set -gx {ACTIVE_VAR} {}\n", fish_quote(&root)));
            }
        }
    }

    fn push_deactivate(self, script: &mut String) {
        match self {
            Shell::Bash | Shell::Zsh => {
                script.push_str("if command -v deactivate >/dev/null 2>&1; then deactivate; fi\n");
                script.push_str(&format!("unset {ACTIVE_VAR}\n"));
            }
            Shell::Fish => {
                script.push_str("functions -q deactivate; and deactivate\n");
                script.push_str(&format!("set -e {ACTIVE_VAR}\n"));
            }
        }
    }

    pub fn shim(self, exe: &Path) -> String {
        let exe = exe.to_string_lossy();
        match self {
            Shell::Bash | Shell::Zsh => format!(
                "burrow() {{\n    local __burrow_script __burrow_status\n    __burrow_script=\"$(mktemp)\" || return 1\n    command {exe} --shell {shell} --script \"$__burrow_script\" \"$@\"\n    __burrow_status=$?\n    if [ -s \"$__burrow_script\" ]; then . \"$__burrow_script\"; fi\n    rm -f \"$__burrow_script\"\n    return $__burrow_status\n}}\n",
                exe = posix_quote(&exe),
                shell = self.name()
            ),
            Shell::Fish => format!(
                "function burrow\n    set -l __burrow_script (mktemp); or return 1\n    command {exe} --shell fish --script $__burrow_script $argv\n    set -l __burrow_status $status\n    if test -s $__burrow_script\n        source $__burrow_script\n    end\n    rm -f $__burrow_script\n    return $__burrow_status\nend\n",
                exe = fish_quote(&exe)
            ),
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn posix_quote(value: &str) -> String {
    // foo'bar -> 'foo'\''bar'
    let mut out = String::new();
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

fn fish_quote(value: &str) -> String {
    let mut out = String::new();
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}
