//! Command-line runtime for the editor relay.
//!
//! The runner splits configuration flags from the command line, loads the
//! layered [`relay_config::Config`], installs logging, and runs one command
//! against the configured editor through [`relay_dispatch::CommandClient`].
//! The [`relay_dispatch::ResultEnvelope`] is printed to stdout as JSON; the
//! process exits successfully only when the envelope reports success.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use relay_config::Config;
use relay_dispatch::{
    CommandClient, FramedTransport, InstanceHandle, InstanceId, ResultEnvelope, RetryPolicy,
    SessionId, SessionRegistry, manage_prefabs,
};
use tracing::debug;

mod cli;
mod command;
mod config;
mod errors;
mod telemetry;

#[cfg(test)]
mod tests;

use cli::Cli;
use command::CommandRequest;
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
use errors::AppError;

/// Session the CLI binds for its single command.
pub const CLI_SESSION: &str = "cli";

/// Instance identity given to the configured editor endpoint.
pub const DEFAULT_INSTANCE: &str = "default";

const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runner");

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let result = Cli::try_parse_from(&split.command_arguments)
        .map_err(AppError::CliUsage)
        .and_then(|cli| {
            loader
                .load(&split.config_arguments)
                .map(|config| (cli, config))
        })
        .and_then(|(cli, config)| {
            telemetry::initialise(&config)?;
            let request = CommandRequest::try_from(cli.command)?;
            execute(request, &config)
        })
        .and_then(|envelope| write_envelope(stdout, &envelope).map(|()| envelope.success));

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            let _ = write!(stdout, "{error}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}

/// Binds the CLI session to the configured editor and runs `request`.
fn execute(request: CommandRequest, config: &Config) -> Result<ResultEnvelope, AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;

    let session = SessionId::new(CLI_SESSION);
    let registry = SessionRegistry::new();
    registry.bind(
        session.clone(),
        InstanceHandle::new(
            InstanceId::new(DEFAULT_INSTANCE),
            config.editor_endpoint().clone(),
        ),
    );
    let client = CommandClient::new(registry, FramedTransport::new(), RetryPolicy::from(config));
    debug!(
        target: CLI_TARGET,
        endpoint = %config.editor_endpoint(),
        max_attempts = config.max_attempts(),
        "executing command"
    );

    Ok(runtime.block_on(async {
        match request {
            CommandRequest::Prefab { action, arguments } => {
                manage_prefabs(&client, &session, action, &arguments).await
            }
            CommandRequest::Call { action, params } => {
                client.execute_command(&session, &action, params).await
            }
        }
    }))
}

fn write_envelope<W: Write>(stdout: &mut W, envelope: &ResultEnvelope) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(envelope).map_err(AppError::SerialiseResult)?;
    writeln!(stdout, "{text}").map_err(AppError::WriteResult)
}
