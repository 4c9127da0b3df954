//! Save file and object models.
//!
//! Only the fields this tool reads or rewrites are typed. Everything else is
//! carried verbatim, in file order, inside the flattened `rest` map so a save
//! survives a split/assemble cycle without losing fields the tool never heard
//! of.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root of a save file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    #[serde(rename = "SaveName", default, skip_serializing_if = "String::is_empty")]
    pub save_name: String,

    #[serde(rename = "LuaScript", default, skip_serializing_if = "String::is_empty")]
    pub lua_script: String,

    #[serde(
        rename = "LuaScriptState",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub lua_script_state: String,

    #[serde(rename = "XmlUI", default, skip_serializing_if = "String::is_empty")]
    pub xml_ui: String,

    /// Top-level objects placed in the world.
    #[serde(rename = "ObjectStates", default)]
    pub object_states: Vec<GameObject>,

    /// Every other save-level field, untouched.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// One object in the save, owning its nested collections exclusively.
///
/// Payload strings treat "absent" and "empty" as the same thing; the nested
/// collections do not, which is why they are wrapped in `Option`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameObject {
    #[serde(rename = "GUID", default, skip_serializing_if = "String::is_empty")]
    pub guid: String,

    /// Type name of the object.
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(rename = "Nickname", default, skip_serializing_if = "String::is_empty")]
    pub nickname: String,

    #[serde(rename = "LuaScript", default, skip_serializing_if = "String::is_empty")]
    pub lua_script: String,

    #[serde(
        rename = "LuaScriptState",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub lua_script_state: String,

    #[serde(rename = "XmlUI", default, skip_serializing_if = "String::is_empty")]
    pub xml_ui: String,

    /// Inventory-style list of objects stored inside this one.
    #[serde(
        rename = "ContainedObjects",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub contained_objects: Option<Vec<GameObject>>,

    /// Alternate versions of this object, keyed by state id.
    #[serde(rename = "States", default, skip_serializing_if = "Option::is_none")]
    pub states: Option<BTreeMap<String, GameObject>>,

    /// Physically attached parts.
    #[serde(
        rename = "ChildObjects",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub child_objects: Option<Vec<GameObject>>,

    /// Every other object field, untouched.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl GameObject {
    /// Display name used for directory naming: the nickname when set, the
    /// type name otherwise.
    pub fn display_name(&self) -> &str {
        if self.nickname.is_empty() {
            &self.name
        } else {
            &self.nickname
        }
    }
}

/// One entry of a `Contents.json` or `Children.json` manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentsEntry {
    /// Path to the object's directory, relative to its parent's directory.
    pub path: String,
}

/// One entry of a `States.json` manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Path to the state's directory, relative to the owning object's
    /// directory.
    pub path: String,
}

/// Shape of a `Contents.json` or `Children.json` manifest.
pub type ContentsFile = Vec<ContentsEntry>;

/// Shape of a `States.json` manifest, keyed by state id.
pub type StatesFile = BTreeMap<String, StateEntry>;
