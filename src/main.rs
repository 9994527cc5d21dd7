mod config;
mod env;
mod error;
mod locate;
mod manager;
mod router;
mod session;
mod shell;

use crate::config::{resolve_config_path, Settings, VAR_SHELL};
use crate::error::{BurrowError, EXIT_OK};
use crate::manager::{ExternalManager, ManagementSubsystem};
use crate::router::{classify, ManagementCommand, Route};
use crate::session::{active_marker, Command, Effect, SessionContext, Status};
use crate::shell::Shell;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const LOG_VAR: &str = "BURROW_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "burrow",
    version,
    about = "Toggle Python virtual environments in the current shell",
    args_override_self = true
)]
struct Cli {
    #[arg(long, value_enum)]
    shell: Option<Shell>,
    #[arg(long, value_name = "FILE", conflicts_with = "eval")]
    script: Option<PathBuf>,
    #[arg(long)]
    eval: bool,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    json: bool,
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    #[arg(short, long)]
    verbose: bool,
    #[arg(long, value_enum, value_name = "SHELL")]
    print_shim: Option<Shell>,
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Serialize)]
struct JsonResult<T: Serialize> {
    ok: bool,
    result: Option<T>,
    error: Option<String>,
    error_kind: Option<&'static str>,
    exit_code: i32,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => report_error(&cli, &err),
    };
    std::process::exit(code);
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("burrow=debug")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn run(cli: &Cli) -> Result<i32, BurrowError> {
    let shell_var = env_var(VAR_SHELL).or_else(|| env_var("SHELL"));
    let shell = Shell::detect(cli.shell, shell_var.as_deref());

    if let Some(target) = cli.print_shim {
        print!("{}", render_shim(target, std::env::current_exe())?);
        io::stdout().flush()?;
        return Ok(EXIT_OK);
    }

    let config_path = resolve_config_path(cli.config.as_ref(), env_var);
    let settings = Settings::resolve(&config_path, env_var)?;
    debug!(config = ?settings.source(), %shell, "settings resolved");

    match classify(&cli.args) {
        Route::Delegate { command, args } => delegate(cli, &settings, shell, command, &args),
        Route::Transition(command) => transition(cli, settings, shell, command),
    }
}

fn render_shim(target: Shell, exe: io::Result<PathBuf>) -> Result<String, BurrowError> {
    let exe = exe.map_err(|err| {
        BurrowError::Configuration(format!("cannot locate the burrow executable: {err}"))
    })?;
    Ok(target.shim(&exe))
}

fn delegate(
    cli: &Cli,
    settings: &Settings,
    shell: Shell,
    command: Option<ManagementCommand>,
    args: &[String],
) -> Result<i32, BurrowError> {
    let interpreter = settings.interpreter().ok();
    let envs = settings.to_env(shell, interpreter.as_deref());
    let manager = ExternalManager::new(settings.manager(), cli.eval);
    info!(
        command = command.map(ManagementCommand::keyword).unwrap_or("<unrecognized>"),
        "forwarding to management command"
    );
    let code = manager
        .run(args, &envs)
        .map_err(|source| BurrowError::ManagerUnavailable {
            program: manager.program().to_string(),
            source,
        })?;
    if cli.json {
        print_json(&JsonResult {
            ok: code == EXIT_OK,
            result: Some(json!({
                "delegated": command.map(ManagementCommand::keyword),
                "program": manager.program(),
                "args": args,
            })),
            error: None,
            error_kind: None,
            exit_code: code,
        })?;
    }
    Ok(code)
}

fn transition(
    cli: &Cli,
    settings: Settings,
    shell: Shell,
    command: Command,
) -> Result<i32, BurrowError> {
    if cli.script.is_none() && !cli.eval {
        return Err(BurrowError::NotSourced {
            shell: shell.name().to_string(),
        });
    }
    let interpreter = settings.interpreter()?;
    settings.ensure_registry_root()?;
    let cwd = std::env::current_dir().map_err(|err| {
        BurrowError::Configuration(format!("cannot determine working directory: {err}"))
    })?;
    let active = active_marker(env_var);
    debug!(python = %interpreter.display(), active = ?active, "pre-flight passed");

    let manager = ExternalManager::new(settings.manager(), cli.eval);
    let session = SessionContext::new(settings, shell, cwd, active.as_deref())
        .with_interpreter(interpreter);
    let (session, outcome) = session.step(command, &manager);
    debug!(state = ?session.state(), effects = outcome.effects.len(), "transition finished");

    // Effects recorded before a failure still have to reach the shell.
    write_script(cli, &shell.render(&outcome.effects))?;
    let status = outcome.result?;
    report_status(cli, &status, &outcome.effects)?;
    Ok(EXIT_OK)
}

fn write_script(cli: &Cli, script: &str) -> Result<(), BurrowError> {
    if let Some(path) = &cli.script {
        fs::write(path, script)?;
    } else if cli.eval {
        let mut stdout = io::stdout();
        stdout.write_all(script.as_bytes())?;
        stdout.flush()?;
    }
    Ok(())
}

fn report_status(cli: &Cli, status: &Status, effects: &[Effect]) -> Result<(), BurrowError> {
    if cli.json {
        return print_json(&JsonResult {
            ok: true,
            result: Some(json!({ "transition": status, "effects": effects })),
            error: None,
            error_kind: None,
            exit_code: EXIT_OK,
        });
    }
    if cli.quiet {
        return Ok(());
    }
    match status {
        Status::Activated(env) => {
            eprintln!("burrow: activated {} ({})", env.name(), env.root().display())
        }
        Status::Deactivated(env) => eprintln!("burrow: deactivated {}", env.name()),
        Status::AlreadyInactive => eprintln!("burrow: no environment is active"),
    }
    Ok(())
}

fn report_error(cli: &Cli, err: &BurrowError) -> i32 {
    let code = err.exit_code();
    if cli.json {
        let payload = JsonResult::<serde_json::Value> {
            ok: false,
            result: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            exit_code: code,
        };
        if print_json(&payload).is_ok() {
            return code;
        }
    }
    eprintln!("burrow: {err}");
    code
}

// stdout belongs to the activation script, so machine output goes to stderr.
fn print_json<T: Serialize>(payload: &T) -> Result<(), BurrowError> {
    let text = serde_json::to_string_pretty(payload)
        .map_err(|err| BurrowError::Configuration(format!("cannot encode json: {err}")))?;
    eprintln!("{text}");
    Ok(())
}
