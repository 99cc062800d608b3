//! Conversion of parsed CLI arguments into editor requests.

use relay_dispatch::{ParamValue, Params, PrefabAction, PrefabArgs};
use serde_json::{Map, Value};

use crate::AppError;
use crate::cli::{CliCommand, PrefabFlags};

/// A single request ready to run against the editor.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CommandRequest {
    /// A prefab operation with loosely typed arguments.
    Prefab {
        action: PrefabAction,
        arguments: PrefabArgs,
    },
    /// An arbitrary command with pre-typed parameters.
    Call { action: String, params: Params },
}

impl TryFrom<CliCommand> for CommandRequest {
    type Error = AppError;

    fn try_from(command: CliCommand) -> Result<Self, Self::Error> {
        match command {
            CliCommand::Prefab { action, arguments } => Ok(Self::Prefab {
                action,
                arguments: arguments.into(),
            }),
            CliCommand::Call { action, params } => Ok(Self::Call {
                action,
                params: parse_params(params.as_deref())?,
            }),
        }
    }
}

impl From<PrefabFlags> for PrefabArgs {
    fn from(flags: PrefabFlags) -> Self {
        Self {
            prefab_path: flags.prefab_path,
            mode: flags.mode,
            save_before_close: flags.save_before_close.map(Value::String),
            target: flags.target,
            allow_overwrite: flags.allow_overwrite.map(Value::String),
            search_inactive: flags.search_inactive.map(Value::String),
            parent: flags.parent,
            page_size: flags.page_size.map(Value::String),
            cursor: flags.cursor.map(Value::String),
            include_transform: flags.include_transform.map(Value::String),
        }
    }
}

fn parse_params(raw: Option<&str>) -> Result<Params, AppError> {
    let Some(text) = raw.filter(|text| !text.trim().is_empty()) else {
        return Ok(Params::new());
    };
    let object: Map<String, Value> =
        serde_json::from_str(text).map_err(AppError::InvalidParams)?;
    Ok(object
        .into_iter()
        .map(|(key, value)| (key, ParamValue::from(value)))
        .collect())
}
