//! CLI argument definitions for the editor relay.

use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{Args, Parser, Subcommand};
use relay_dispatch::PrefabAction;

/// Command-line interface for sending commands to a running editor.
#[derive(Parser, Debug)]
#[command(name = "relay", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Operation to run against the editor.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Operations the relay can run.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Runs a prefab operation.
    Prefab {
        /// The prefab action to perform.
        #[arg(
            value_name = "ACTION",
            value_parser = PossibleValuesParser::new(PrefabAction::names().iter().copied())
                .try_map(|name| name.parse::<PrefabAction>())
        )]
        action: PrefabAction,
        /// Arguments forwarded with the action.
        #[command(flatten)]
        arguments: PrefabFlags,
    },
    /// Sends an arbitrary command with JSON parameters.
    Call {
        /// Command identifier understood by the editor.
        #[arg(value_name = "ACTION")]
        action: String,
        /// Parameters as a JSON object.
        #[arg(long, value_name = "JSON")]
        params: Option<String>,
    },
}

/// Prefab arguments as typed on the command line.
///
/// Flags and numbers are taken as text and coerced later, so `--allow-overwrite
/// yes` and `--page-size 50.0` are both accepted.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct PrefabFlags {
    /// Prefab asset path, e.g. `Assets/Prefabs/Crate.prefab`.
    #[arg(long)]
    pub(crate) prefab_path: Option<String>,
    /// Prefab stage mode.
    #[arg(long)]
    pub(crate) mode: Option<String>,
    /// Save before leaving the stage.
    #[arg(long, value_name = "BOOL")]
    pub(crate) save_before_close: Option<String>,
    /// Scene object to turn into a prefab.
    #[arg(long)]
    pub(crate) target: Option<String>,
    /// Replace an existing prefab at the same path.
    #[arg(long, value_name = "BOOL")]
    pub(crate) allow_overwrite: Option<String>,
    /// Include inactive objects when resolving the target.
    #[arg(long, value_name = "BOOL")]
    pub(crate) search_inactive: Option<String>,
    /// Hierarchy node to list.
    #[arg(long)]
    pub(crate) parent: Option<String>,
    /// Items per hierarchy page.
    #[arg(long, value_name = "N")]
    pub(crate) page_size: Option<String>,
    /// Start index of the hierarchy page.
    #[arg(long, value_name = "N")]
    pub(crate) cursor: Option<String>,
    /// Include transform data in hierarchy items.
    #[arg(long, value_name = "BOOL")]
    pub(crate) include_transform: Option<String>,
}
