//! Save-level payload rewriting and the script bundler seam.
//!
//! XML UI payloads are bundled and unbundled by this crate; Lua scripts are
//! handled by an external resolver whose contract is captured in the
//! [`ScriptBundler`] trait. Both transformations walk the object tree the
//! same way and always produce a copy, leaving the caller's save untouched.

use std::path::PathBuf;

use anyhow::Result;

use crate::app::{bundle, unbundle};
use crate::domain::model::{GameObject, SaveFile};

/// Contract of the external Lua script bundler. Only the input/output shape
/// matters here; the actual resolution logic lives outside this crate.
pub trait ScriptBundler {
    /// Inline external references in `script`, searching `roots` in order.
    fn bundle(&self, script: &str, roots: &[PathBuf]) -> Result<String>;

    /// Recover the original root script from a bundled one.
    fn unbundle(&self, script: &str) -> Result<String>;
}

/// Script bundler that leaves scripts untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughScripts;

impl ScriptBundler for PassthroughScripts {
    fn bundle(&self, script: &str, _roots: &[PathBuf]) -> Result<String> {
        Ok(script.to_string())
    }

    fn unbundle(&self, script: &str) -> Result<String> {
        Ok(script.to_string())
    }
}

/// Return a copy of `save` with every script and XML payload unbundled.
pub fn unbundle_save(save: &SaveFile, scripts: &dyn ScriptBundler) -> Result<SaveFile> {
    let mut copy = save.clone();

    if !copy.lua_script.is_empty() {
        copy.lua_script = scripts.unbundle(&copy.lua_script)?;
    }
    if !copy.xml_ui.is_empty() {
        copy.xml_ui = unbundle::unbundle_root(&copy.xml_ui);
    }
    for object in &mut copy.object_states {
        unbundle_object(object, scripts)?;
    }

    Ok(copy)
}

/// Return a copy of `save` with every script and XML payload bundled over
/// the given include roots.
pub fn bundle_save(
    save: &SaveFile,
    roots: &[PathBuf],
    scripts: &dyn ScriptBundler,
) -> Result<SaveFile> {
    let mut copy = save.clone();

    if !copy.lua_script.is_empty() {
        copy.lua_script = scripts.bundle(&copy.lua_script, roots)?;
    }
    if !copy.xml_ui.is_empty() {
        copy.xml_ui = bundle::bundle(&copy.xml_ui, roots)?;
    }
    for object in &mut copy.object_states {
        bundle_object(object, roots, scripts)?;
    }

    Ok(copy)
}

fn unbundle_object(object: &mut GameObject, scripts: &dyn ScriptBundler) -> Result<()> {
    if !object.lua_script.is_empty() {
        object.lua_script = scripts.unbundle(&object.lua_script)?;
    }
    if !object.xml_ui.is_empty() {
        object.xml_ui = unbundle::unbundle_root(&object.xml_ui);
    }

    for_each_nested(object, &mut |nested| unbundle_object(nested, scripts))
}

fn bundle_object(
    object: &mut GameObject,
    roots: &[PathBuf],
    scripts: &dyn ScriptBundler,
) -> Result<()> {
    if !object.lua_script.is_empty() {
        object.lua_script = scripts.bundle(&object.lua_script, roots)?;
    }
    if !object.xml_ui.is_empty() {
        object.xml_ui = bundle::bundle(&object.xml_ui, roots)?;
    }

    for_each_nested(object, &mut |nested| bundle_object(nested, roots, scripts))
}

fn for_each_nested(
    object: &mut GameObject,
    apply: &mut dyn FnMut(&mut GameObject) -> Result<()>,
) -> Result<()> {
    if let Some(contained) = &mut object.contained_objects {
        for nested in contained {
            apply(nested)?;
        }
    }
    if let Some(children) = &mut object.child_objects {
        for nested in children {
            apply(nested)?;
        }
    }
    if let Some(states) = &mut object.states {
        for nested in states.values_mut() {
            apply(nested)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;

    use tempfile::TempDir;

    fn save_with_ui(ui: &str) -> SaveFile {
        let mut nested = GameObject {
            guid: "def456".into(),
            name: "Card".into(),
            xml_ui: ui.into(),
            ..GameObject::default()
        };
        nested.lua_script = "print(2)".into();

        let object = GameObject {
            guid: "abc123".into(),
            name: "Deck".into(),
            xml_ui: ui.into(),
            contained_objects: Some(vec![nested.clone()]),
            states: Some(BTreeMap::from([("2".to_string(), nested)])),
            ..GameObject::default()
        };

        SaveFile {
            save_name: "Demo".into(),
            xml_ui: ui.into(),
            object_states: vec![object],
            ..SaveFile::default()
        }
    }

    #[test]
    fn bundles_every_ui_payload_in_the_tree() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.xml"), "<Panel />").unwrap();
        let roots = vec![dir.path().to_path_buf()];

        let save = save_with_ui("<Include src=\"main\" />");
        let bundled = bundle_save(&save, &roots, &PassthroughScripts).unwrap();

        let expected = "<!-- include main -->\n<Panel />\n<!-- include main -->";
        assert_eq!(bundled.xml_ui, expected);

        let object = &bundled.object_states[0];
        assert_eq!(object.xml_ui, expected);
        assert_eq!(object.contained_objects.as_ref().unwrap()[0].xml_ui, expected);
        assert_eq!(object.states.as_ref().unwrap()["2"].xml_ui, expected);

        // The input save is untouched.
        assert_eq!(save.xml_ui, "<Include src=\"main\" />");
    }

    #[test]
    fn unbundle_inverts_bundle_for_the_whole_save() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.xml"), "<Panel />").unwrap();
        let roots = vec![dir.path().to_path_buf()];

        let save = save_with_ui("<Include src=\"main\" />");
        let bundled = bundle_save(&save, &roots, &PassthroughScripts).unwrap();
        let unbundled = unbundle_save(&bundled, &PassthroughScripts).unwrap();

        assert_eq!(unbundled, save);
    }

    #[test]
    fn scripts_pass_through_unchanged() {
        let save = save_with_ui("");
        let bundled = bundle_save(&save, &[], &PassthroughScripts).unwrap();

        assert_eq!(
            bundled.object_states[0].contained_objects.as_ref().unwrap()[0].lua_script,
            "print(2)"
        );
    }
}
