//! Prefab operations front end.
//!
//! Packs loosely typed prefab arguments into a `manage_prefabs` command and
//! runs it through a [`CommandClient`]. The prefab action travels as the
//! first parameter; every other key is present only when its argument was
//! supplied and could be coerced.

use serde::Deserialize;
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString, VariantNames};

use crate::client::CommandClient;
use crate::envelope::{ParamValue, Params, ResultEnvelope};
use crate::params::ParamsBuilder;
use crate::registry::{InstanceRegistry, SessionId};
use crate::retry::Clock;
use crate::transport::Transport;

/// Editor command that carries every prefab action.
pub const MANAGE_PREFABS_COMMAND: &str = "manage_prefabs";

/// Prefab operations the editor understands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, VariantNames, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PrefabAction {
    /// Open a prefab asset in an editing stage.
    OpenStage,
    /// Leave the current prefab stage.
    CloseStage,
    /// Save the prefab open in the current stage.
    SaveOpenStage,
    /// Turn a scene object into a prefab asset.
    CreateFromGameobject,
    /// Page through the hierarchy of a prefab.
    GetHierarchy,
}

impl PrefabAction {
    /// Wire names of every action.
    #[must_use]
    pub const fn names() -> &'static [&'static str] {
        Self::VARIANTS
    }
}

/// Raw prefab arguments as a caller supplied them.
///
/// Flags and numbers stay untyped until [`PrefabArgs::to_params`] coerces
/// them, so `"yes"`, `1` and `true` are all accepted for a flag.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PrefabArgs {
    /// Asset path such as `Assets/Prefabs/Crate.prefab`.
    pub prefab_path: Option<String>,
    /// Stage mode, e.g. `InIsolation`.
    pub mode: Option<String>,
    /// Save before `close_stage` leaves the stage.
    pub save_before_close: Option<Value>,
    /// Scene object used by `create_from_gameobject`.
    pub target: Option<String>,
    /// Replace an existing asset at the same path.
    pub allow_overwrite: Option<Value>,
    /// Include inactive objects when looking up `target`.
    pub search_inactive: Option<Value>,
    /// Hierarchy node to list; the prefab root when absent.
    pub parent: Option<String>,
    /// Items per hierarchy page.
    pub page_size: Option<Value>,
    /// Start index of the hierarchy page.
    pub cursor: Option<Value>,
    /// Include transform data in hierarchy items.
    pub include_transform: Option<Value>,
}

impl PrefabArgs {
    /// Builds the command parameters for `action`.
    #[must_use]
    pub fn to_params(&self, action: PrefabAction) -> Params {
        ParamsBuilder::new()
            .value("action", ParamValue::from(action.as_ref()))
            .text("prefabPath", self.prefab_path.as_deref())
            .text("mode", self.mode.as_deref())
            .flag("saveBeforeClose", self.save_before_close.as_ref())
            .text("target", self.target.as_deref())
            .flag("allowOverwrite", self.allow_overwrite.as_ref())
            .flag("searchInactive", self.search_inactive.as_ref())
            .text("parent", self.parent.as_deref())
            .integer("pageSize", self.page_size.as_ref(), None)
            .integer("cursor", self.cursor.as_ref(), None)
            .flag("includeTransform", self.include_transform.as_ref())
            .build()
    }
}

/// Runs a prefab action for `session`.
pub async fn manage_prefabs<R, T, C>(
    client: &CommandClient<R, T, C>,
    session: &SessionId,
    action: PrefabAction,
    args: &PrefabArgs,
) -> ResultEnvelope
where
    R: InstanceRegistry,
    T: Transport,
    C: Clock,
{
    client
        .execute_command(session, MANAGE_PREFABS_COMMAND, args.to_params(action))
        .await
}
