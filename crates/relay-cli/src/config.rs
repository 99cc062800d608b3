//! Configuration loading helpers for the relay CLI.
//!
//! Leading configuration flags are peeled off for `ortho_config`; the first
//! token that is not a known configuration flag starts the command line that
//! clap parses.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use relay_config::Config;

use crate::AppError;

/// CLI flags recognised by the configuration loader.
///
/// Must list every field of [`Config`] that can be set from the command line.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--editor-endpoint",
    "--max-attempts",
    "--attempt-timeout-ms",
    "--retry-base-delay-ms",
    "--retry-max-delay-ms",
    "--log-filter",
    "--log-format",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration for the CLI.
    ///
    /// Configuration flags must appear before the subcommand; later ones are
    /// handed to clap and rejected there.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Stop;
    }
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_arguments: Vec<OsString>,
}

/// Splits `args` (program name first) into configuration and command halves.
///
/// Both halves start with the program name so each parser sees a complete
/// argument vector.
pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some((program, rest)) = args.split_first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_arguments: Vec::new(),
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut remaining = rest.iter().peekable();
    while let Some(argument) = remaining.peek() {
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push((*argument).clone());
                remaining.next();
                if needs_value && let Some(value) = remaining.next() {
                    config_arguments.push(value.clone());
                }
            }
            FlagAction::Stop => break,
        }
    }

    let mut command_arguments = vec![program.clone()];
    command_arguments.extend(remaining.cloned());
    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}
