//! Reading an extracted tree back into a save.
//!
//! The mirror of [`extract`](crate::app::extract): directories are walked by
//! following the manifests, payload files are re-attached, and the result is
//! re-bundled so it is ready to hand to the running simulation.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::app::scripts::{self, ScriptBundler};
use crate::domain::errors::AssembleError;
use crate::domain::model::{ContentsFile, GameObject, SaveFile, StatesFile};
use crate::infra::fs as fsio;

/// Options for [`embed_save`].
#[derive(Debug, Clone)]
pub struct EmbedOptions {
    /// Include search roots, highest priority first.
    pub include_paths: Vec<PathBuf>,
    /// File extension the extracted scripts were written with.
    pub script_extension: String,
}

impl EmbedOptions {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self {
            include_paths,
            script_extension: "ttslua".into(),
        }
    }
}

/// Assemble an extracted save directory and re-bundle its payloads: the
/// inverse of extraction.
pub fn embed_save(
    root: &Path,
    options: &EmbedOptions,
    scripts: &dyn ScriptBundler,
) -> Result<SaveFile> {
    let save = read_extracted_save(root, options)?;
    scripts::bundle_save(&save, &options.include_paths, scripts)
}

/// Read an extracted save directory back into an (unbundled) save.
///
/// A missing payload file means "empty"; a missing manifest means "no such
/// collection". A manifest pointing at a directory without object data fails
/// the whole call.
pub fn read_extracted_save(root: &Path, options: &EmbedOptions) -> Result<SaveFile> {
    let data_path = root.join("Data.json");
    let data = fsio::read_to_string(&data_path)?;
    let mut save: SaveFile = serde_json::from_str(&data)
        .with_context(|| format!("invalid save data in {}", data_path.display()))?;

    save.lua_script = read_payload(root, &script_file(options))?;
    save.lua_script_state = read_payload(root, "State.txt")?;
    save.xml_ui = read_payload(root, "UI.xml")?;
    save.object_states = read_contents(root, options)?.unwrap_or_default();

    Ok(save)
}

/// Read one extracted object directory, recursing through its manifests.
pub fn read_extracted_object(dir: &Path, options: &EmbedOptions) -> Result<GameObject> {
    let data_path = dir.join("Data.json");
    let data = fsio::read_to_string(&data_path)?;
    let object = serde_json::from_str(&data)
        .with_context(|| format!("invalid object data in {}", data_path.display()))?;
    fill_object(object, dir, options)
}

fn read_object(dir: &Path, manifest: &Path, options: &EmbedOptions) -> Result<GameObject> {
    let data_path = dir.join("Data.json");
    let Some(data) = fsio::read_optional(&data_path)? else {
        return Err(AssembleError::ManifestMismatch {
            manifest: manifest.to_path_buf(),
            target: dir.to_path_buf(),
        }
        .into());
    };

    let object = serde_json::from_str(&data)
        .with_context(|| format!("invalid object data in {}", data_path.display()))?;
    fill_object(object, dir, options)
}

fn fill_object(
    mut object: GameObject,
    dir: &Path,
    options: &EmbedOptions,
) -> Result<GameObject> {
    object.lua_script = read_payload(dir, &script_file(options))?;
    object.lua_script_state = read_payload(dir, "State.txt")?;
    object.xml_ui = read_payload(dir, "UI.xml")?;

    object.contained_objects = read_contents(dir, options)?;
    object.states = read_states(dir, options)?;
    object.child_objects = read_children(dir, options)?;

    Ok(object)
}

fn read_contents(dir: &Path, options: &EmbedOptions) -> Result<Option<Vec<GameObject>>> {
    read_list_manifest(dir, "Contents.json", options)
}

fn read_children(dir: &Path, options: &EmbedOptions) -> Result<Option<Vec<GameObject>>> {
    read_list_manifest(dir, "Children.json", options)
}

fn read_list_manifest(
    dir: &Path,
    file: &str,
    options: &EmbedOptions,
) -> Result<Option<Vec<GameObject>>> {
    let manifest_path = dir.join(file);
    let Some(raw) = fsio::read_optional(&manifest_path)? else {
        return Ok(None);
    };

    let entries: ContentsFile = serde_json::from_str(&raw)
        .with_context(|| format!("invalid manifest {}", manifest_path.display()))?;

    let mut objects = Vec::with_capacity(entries.len());
    for entry in &entries {
        objects.push(read_object(&dir.join(&entry.path), &manifest_path, options)?);
    }
    Ok(Some(objects))
}

fn read_states(
    dir: &Path,
    options: &EmbedOptions,
) -> Result<Option<BTreeMap<String, GameObject>>> {
    let manifest_path = dir.join("States.json");
    let Some(raw) = fsio::read_optional(&manifest_path)? else {
        return Ok(None);
    };

    let entries: StatesFile = serde_json::from_str(&raw)
        .with_context(|| format!("invalid manifest {}", manifest_path.display()))?;

    let mut states = BTreeMap::new();
    for (id, entry) in &entries {
        states.insert(
            id.clone(),
            read_object(&dir.join(&entry.path), &manifest_path, options)?,
        );
    }
    Ok(Some(states))
}

fn read_payload(dir: &Path, file: &str) -> Result<String> {
    Ok(fsio::read_optional(&dir.join(file))?.unwrap_or_default())
}

fn script_file(options: &EmbedOptions) -> String {
    format!("Script.{}", options.script_extension)
}

/// Serialize a save as pretty JSON with characters outside printable ASCII
/// escaped, the encoding the simulation itself writes.
pub fn to_save_json(save: &SaveFile) -> Result<String> {
    let json = serde_json::to_string_pretty(save).context("failed to serialize save")?;
    Ok(escape_non_ascii(&json))
}

fn escape_non_ascii(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if (c as u32) < 0x7f {
            escaped.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(escaped, "\\u{unit:04x}");
            }
        }
    }
    escaped
}
