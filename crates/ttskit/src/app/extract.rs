//! Splitting a save into a directory-per-object tree.
//!
//! Every object becomes a directory holding its payload files, a `Data.json`
//! with the fields no other file claims, and one manifest per nested
//! collection recording where the members were written. The inverse walk
//! lives in [`embed`](crate::app::embed).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::app::scripts::{self, ScriptBundler};
use crate::domain::model::{ContentsEntry, GameObject, SaveFile, StateEntry, StatesFile};
use crate::infra::fs as fsio;

/// Fields written to their own files or manifests; everything else lands in
/// `Data.json`.
const HANDLED_KEYS: [&str; 7] = [
    "LuaScript",
    "LuaScriptState",
    "XmlUI",
    "ContainedObjects",
    "ObjectStates",
    "States",
    "ChildObjects",
];

/// Options for [`extract_save`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Directory the save is split into.
    pub output: PathBuf,
    /// Round numeric values to this many decimals when set.
    pub normalize: Option<u32>,
    /// Sub-path for contained objects, relative to the parent's directory.
    pub contents_path: String,
    /// Sub-path for state objects.
    pub states_path: String,
    /// Sub-path for child objects.
    pub children_path: String,
    /// File extension for extracted scripts.
    pub script_extension: String,
}

impl ExtractOptions {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            normalize: None,
            contents_path: ".".into(),
            states_path: ".".into(),
            children_path: ".".into(),
            script_extension: "ttslua".into(),
        }
    }
}

/// Per-call counters disambiguating sibling directories that would otherwise
/// share a name, keyed by the parent directory they are created in.
#[derive(Debug, Default)]
struct DirectoryNames {
    seen: HashMap<PathBuf, HashMap<String, u32>>,
}

impl DirectoryNames {
    /// Claim `base` under `parent`: the first claim keeps the bare name,
    /// later claims get `.1`, `.2`, ... suffixes in order of encounter.
    fn claim(&mut self, parent: &Path, base: String) -> String {
        let names = self.seen.entry(parent.to_path_buf()).or_default();
        let count = names.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}.{}", *count - 1)
        }
    }
}

/// Unbundle a copy of `save`, split it into a directory tree under
/// `options.output`, and return the unbundled copy.
pub fn extract_save(
    save: &SaveFile,
    options: &ExtractOptions,
    scripts: &dyn ScriptBundler,
) -> Result<SaveFile> {
    let unbundled = scripts::unbundle_save(save, scripts)?;
    write_extracted_save(&unbundled, options)?;
    Ok(unbundled)
}

/// Write an already unbundled save below `options.output`.
pub fn write_extracted_save(save: &SaveFile, options: &ExtractOptions) -> Result<()> {
    let mut names = DirectoryNames::default();
    fsio::create_dir_all(&options.output)?;

    write_payloads(
        &options.output,
        &save.lua_script,
        &save.lua_script_state,
        &save.xml_ui,
        options,
    )?;
    write_contents(&save.object_states, &options.output, options, &mut names)?;
    write_data(data_value(save)?, &options.output, options)?;

    tracing::debug!(output = %options.output.display(), "extracted save");
    Ok(())
}

/// Write a single unbundled object (and everything below it) into its own
/// directory under `options.output`.
pub fn write_extracted_object(object: &GameObject, options: &ExtractOptions) -> Result<()> {
    let mut names = DirectoryNames::default();
    let directory = names.claim(&options.output, directory_name(object));
    write_object(object, &options.output.join(directory), options, &mut names)
}

fn write_object(
    object: &GameObject,
    dir: &Path,
    options: &ExtractOptions,
    names: &mut DirectoryNames,
) -> Result<()> {
    fsio::create_dir_all(dir)?;

    write_payloads(
        dir,
        &object.lua_script,
        &object.lua_script_state,
        &object.xml_ui,
        options,
    )?;
    if let Some(contained) = &object.contained_objects {
        write_contents(contained, dir, options, names)?;
    }
    write_states(object, dir, options, names)?;
    write_children(object, dir, options, names)?;
    write_data(data_value(object)?, dir, options)
}

fn write_payloads(
    dir: &Path,
    script: &str,
    script_state: &str,
    ui: &str,
    options: &ExtractOptions,
) -> Result<()> {
    if !script.is_empty() {
        let file = format!("Script.{}", options.script_extension);
        fsio::write_file(&dir.join(file), script)?;
    }
    if !script_state.is_empty() {
        fsio::write_file(&dir.join("State.txt"), script_state)?;
    }
    if !ui.is_empty() {
        fsio::write_file(&dir.join("UI.xml"), ui)?;
    }
    Ok(())
}

fn write_contents(
    objects: &[GameObject],
    dir: &Path,
    options: &ExtractOptions,
    names: &mut DirectoryNames,
) -> Result<()> {
    let mut manifest = Vec::with_capacity(objects.len());

    for object in objects {
        let parent = dir.join(&options.contents_path);
        let directory = names.claim(&parent, directory_name(object));
        let relative = format!("{}/{}", options.contents_path, directory);
        manifest.push(ContentsEntry {
            path: relative.clone(),
        });
        write_object(object, &dir.join(&relative), options, names)?;
    }

    fsio::write_json(&dir.join("Contents.json"), &manifest)
}

fn write_states(
    object: &GameObject,
    dir: &Path,
    options: &ExtractOptions,
    names: &mut DirectoryNames,
) -> Result<()> {
    let Some(states) = &object.states else {
        return Ok(());
    };

    // State ids are unique keys already; the id prefix keeps the directory
    // names apart without a collision counter.
    let mut manifest = StatesFile::new();
    for (id, state) in states {
        let relative = format!("{}/{id}-{}", options.states_path, directory_name(state));
        manifest.insert(
            id.clone(),
            StateEntry {
                path: relative.clone(),
            },
        );
        write_object(state, &dir.join(&relative), options, names)?;
    }

    fsio::write_json(&dir.join("States.json"), &manifest)
}

fn write_children(
    object: &GameObject,
    dir: &Path,
    options: &ExtractOptions,
    names: &mut DirectoryNames,
) -> Result<()> {
    let Some(children) = &object.child_objects else {
        return Ok(());
    };

    let mut manifest = Vec::with_capacity(children.len());
    for child in children {
        let parent = dir.join(&options.children_path);
        let directory = names.claim(&parent, directory_name(child));
        let relative = format!("{}/{}", options.children_path, directory);
        manifest.push(ContentsEntry {
            path: relative.clone(),
        });
        write_object(child, &dir.join(&relative), options, names)?;
    }

    fsio::write_json(&dir.join("Children.json"), &manifest)
}

fn write_data(mut value: Value, dir: &Path, options: &ExtractOptions) -> Result<()> {
    if let Some(digits) = options.normalize {
        round_numbers(&mut value, digits);
    }
    fsio::write_json(&dir.join("Data.json"), &value)
}

/// Serialize `value` and drop the handled keys; the result is what
/// `Data.json` holds.
fn data_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    let mut data = serde_json::to_value(value).context("failed to serialize object data")?;
    if let Value::Object(map) = &mut data {
        for key in HANDLED_KEYS {
            map.remove(key);
        }
    }
    Ok(data)
}

/// Round every fractional numeric leaf to `digits` decimals. Integers pass
/// through untouched.
fn round_numbers(value: &mut Value, digits: u32) {
    match value {
        Value::Number(number) => {
            if number.as_i64().is_some() || number.as_u64().is_some() {
                return;
            }
            if let Some(float) = number.as_f64() {
                let offset = 10f64.powi(digits as i32);
                let rounded = (float * offset).round() / offset;
                if let Some(rounded) = serde_json::Number::from_f64(rounded) {
                    *value = Value::Number(rounded);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                round_numbers(item, digits);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                round_numbers(item, digits);
            }
        }
        _ => {}
    }
}

/// Directory name for an object: `<display-name>.<GUID>` with unsafe
/// characters replaced.
fn directory_name(object: &GameObject) -> String {
    format!("{}.{}", object.display_name(), object.guid)
        .chars()
        .map(|c| if is_safe_name_char(c) { c } else { '-' })
        .collect()
}

fn is_safe_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            ' ' | '_'
                | '^'
                | '&'
                | '\''
                | '@'
                | '{'
                | '}'
                | '['
                | ']'
                | ','
                | '$'
                | '='
                | '!'
                | '-'
                | '#'
                | '('
                | ')'
                | '%'
                | '.'
                | '+'
                | '~'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::app::embed::{self, EmbedOptions};

    fn object(name: &str, guid: &str) -> GameObject {
        GameObject {
            guid: guid.into(),
            name: name.into(),
            ..GameObject::default()
        }
    }

    #[test]
    fn directory_names_replace_unsafe_characters() {
        let card = object("A/B:C\"D", "abc123");
        assert_eq!(directory_name(&card), "A-B-C-D.abc123");

        let quirky = object("Res (v2) [draft] 50%", "def456");
        assert_eq!(directory_name(&quirky), "Res (v2) [draft] 50%.def456");
    }

    #[test]
    fn sibling_collisions_get_numeric_suffixes() {
        let mut names = DirectoryNames::default();
        let parent = Path::new("out");

        assert_eq!(names.claim(parent, "Card.abc".into()), "Card.abc");
        assert_eq!(names.claim(parent, "Card.abc".into()), "Card.abc.1");
        assert_eq!(names.claim(parent, "Card.abc".into()), "Card.abc.2");

        // A different parent directory starts over.
        let other = Path::new("out/nested");
        assert_eq!(names.claim(other, "Card.abc".into()), "Card.abc");
    }

    #[test]
    fn handled_keys_are_dropped_from_data() {
        let mut card = object("Card", "abc123");
        card.lua_script = "print(1)".into();
        card.contained_objects = Some(vec![object("Token", "def456")]);
        card.rest
            .insert("Transform".into(), serde_json::json!({ "posX": 1.0 }));

        let data = data_value(&card).unwrap();
        let map = data.as_object().unwrap();

        assert!(map.contains_key("GUID"));
        assert!(map.contains_key("Transform"));
        assert!(!map.contains_key("LuaScript"));
        assert!(!map.contains_key("ContainedObjects"));
    }

    #[test]
    fn single_objects_extract_into_their_own_directory() {
        let temp = tempfile::tempdir().unwrap();
        let out = temp.path().join("out");

        let mut card = object("Card", "abc123");
        card.lua_script = "print(1)".into();
        card.contained_objects = Some(vec![object("Token", "def456")]);

        write_extracted_object(&card, &ExtractOptions::new(&out)).unwrap();

        let dir = out.join("Card.abc123");
        assert!(dir.join("Script.ttslua").exists());
        assert!(dir.join("Contents.json").exists());

        let rebuilt =
            embed::read_extracted_object(&dir, &EmbedOptions::new(Vec::new())).unwrap();
        assert_eq!(rebuilt, card);
    }

    #[test]
    fn rounding_only_touches_fractional_numbers() {
        let mut value = serde_json::json!({
            "posX": 1.23456789,
            "rotY": 180,
            "nested": { "scale": [0.00009, 2.5] },
            "label": "1.23456789"
        });

        round_numbers(&mut value, 4);

        assert_eq!(value["posX"], serde_json::json!(1.2346));
        assert_eq!(value["rotY"], serde_json::json!(180));
        assert_eq!(value["nested"]["scale"][0], serde_json::json!(0.0001));
        assert_eq!(value["nested"]["scale"][1], serde_json::json!(2.5));
        assert_eq!(value["label"], serde_json::json!("1.23456789"));
    }
}
