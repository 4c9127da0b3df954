use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ttskit::app::embed::{self, EmbedOptions};
use ttskit::app::extract::{self, ExtractOptions};
use ttskit::app::scripts::PassthroughScripts;
use ttskit::domain::errors::AssembleError;
use ttskit::domain::model::{GameObject, SaveFile};

fn object(name: &str, guid: &str) -> GameObject {
    GameObject {
        guid: guid.into(),
        name: name.into(),
        ..GameObject::default()
    }
}

/// A save exercising every collection: contained objects with a name
/// collision, a state, and an attached child.
fn demo_save() -> SaveFile {
    let mut deck = object("Deck", "abc123");
    deck.lua_script = "print(2)".into();
    deck.contained_objects = Some(vec![object("Card", "def456"), object("Card", "def456")]);
    deck.states = Some(BTreeMap::from([("2".to_string(), object("Alt", "ghi789"))]));
    deck.child_objects = Some(vec![object("Base", "jkl012")]);
    deck.rest
        .insert("Transform".into(), serde_json::json!({ "posX": 1.5 }));

    let mut save = SaveFile {
        save_name: "Demo".into(),
        lua_script: "print(1)".into(),
        object_states: vec![deck],
        ..SaveFile::default()
    };
    save.rest.insert("GameMode".into(), "Test".into());
    save
}

#[test]
fn split_then_assemble_reproduces_the_save() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("out");
    let save = demo_save();

    let options = ExtractOptions::new(&out);
    let extracted = extract::extract_save(&save, &options, &PassthroughScripts).unwrap();
    assert_eq!(extracted, save);

    let deck = out.join("Deck.abc123");
    assert!(deck.join("Card.def456").join("Data.json").exists());
    assert!(deck.join("Card.def456.1").join("Data.json").exists());
    assert!(deck.join("2-Alt.ghi789").join("Data.json").exists());
    assert!(deck.join("Base.jkl012").join("Data.json").exists());

    let assembled = embed::read_extracted_save(&out, &EmbedOptions::new(Vec::new())).unwrap();
    assert_eq!(assembled, save);
}

#[test]
fn sibling_collision_keeps_both_objects_apart() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("out");

    let mut save = demo_save();
    let twins = save.object_states[0].contained_objects.as_mut().unwrap();
    twins[0].nickname = "First".into();
    twins[1].nickname = "First".into();
    twins[1].lua_script = "print(3)".into();

    extract::extract_save(&save, &ExtractOptions::new(&out), &PassthroughScripts).unwrap();

    let deck = out.join("Deck.abc123");
    assert!(deck.join("First.def456").exists());
    assert!(deck.join("First.def456.1").join("Script.ttslua").exists());

    let assembled = embed::read_extracted_save(&out, &EmbedOptions::new(Vec::new())).unwrap();
    let rebuilt = assembled.object_states[0].contained_objects.as_ref().unwrap();
    assert_eq!(rebuilt[0].lua_script, "");
    assert_eq!(rebuilt[1].lua_script, "print(3)");
}

#[test]
fn embed_rebundles_ui_payloads() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("out");
    let includes = temp.path().join("xml");
    fs::create_dir_all(&includes).unwrap();
    fs::write(includes.join("main.xml"), "<Panel />").unwrap();

    let mut save = demo_save();
    save.xml_ui = "<Include src=\"main\" />".into();
    save.object_states[0].xml_ui = "<Include src=\"main\" />".into();

    let extracted =
        extract::extract_save(&save, &ExtractOptions::new(&out), &PassthroughScripts).unwrap();
    // Directives carry no markers, so the unbundled copy matches the input.
    assert_eq!(extracted, save);
    assert_eq!(
        fs::read_to_string(out.join("UI.xml")).unwrap(),
        "<Include src=\"main\" />"
    );

    let options = EmbedOptions::new(vec![includes]);
    let embedded = embed::embed_save(&out, &options, &PassthroughScripts).unwrap();

    let expected = "<!-- include main -->\n<Panel />\n<!-- include main -->";
    assert_eq!(embedded.xml_ui, expected);
    assert_eq!(embedded.object_states[0].xml_ui, expected);
}

#[test]
fn extracting_a_bundled_save_recovers_the_directives() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("out");

    let mut save = demo_save();
    save.xml_ui = "<!-- include main -->\n<Panel />\n<!-- include main -->".into();

    extract::extract_save(&save, &ExtractOptions::new(&out), &PassthroughScripts).unwrap();

    assert_eq!(
        fs::read_to_string(out.join("UI.xml")).unwrap(),
        "<Include src=\"main\" />"
    );
}

#[test]
fn state_absence_and_emptiness_are_distinguishable() {
    let temp = tempfile::tempdir().unwrap();

    let mut save = demo_save();
    save.object_states[0].states = None;
    let without = temp.path().join("without");
    extract::extract_save(&save, &ExtractOptions::new(&without), &PassthroughScripts).unwrap();
    assert!(!without.join("Deck.abc123").join("States.json").exists());

    let assembled =
        embed::read_extracted_save(&without, &EmbedOptions::new(Vec::new())).unwrap();
    assert!(assembled.object_states[0].states.is_none());

    save.object_states[0].states = Some(BTreeMap::new());
    let with_empty = temp.path().join("with_empty");
    extract::extract_save(&save, &ExtractOptions::new(&with_empty), &PassthroughScripts).unwrap();
    assert!(with_empty.join("Deck.abc123").join("States.json").exists());

    let assembled =
        embed::read_extracted_save(&with_empty, &EmbedOptions::new(Vec::new())).unwrap();
    assert_eq!(assembled.object_states[0].states, Some(BTreeMap::new()));
}

#[test]
fn manifest_mismatch_aborts_the_assembly() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("out");

    extract::extract_save(&demo_save(), &ExtractOptions::new(&out), &PassthroughScripts).unwrap();
    fs::remove_dir_all(out.join("Deck.abc123").join("Card.def456")).unwrap();

    let err = embed::read_extracted_save(&out, &EmbedOptions::new(Vec::new())).unwrap_err();

    let mismatch = err
        .downcast_ref::<AssembleError>()
        .expect("typed assembly error");
    assert!(matches!(mismatch, AssembleError::ManifestMismatch { .. }));
}

#[test]
fn normalization_rounds_on_disk_but_not_in_memory() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("out");

    let mut save = demo_save();
    save.rest
        .insert("Gravity".into(), serde_json::json!(0.12345678));

    let mut options = ExtractOptions::new(&out);
    options.normalize = Some(4);
    let extracted = extract::extract_save(&save, &options, &PassthroughScripts).unwrap();

    // The returned copy keeps full precision.
    assert_eq!(extracted.rest["Gravity"], serde_json::json!(0.12345678));

    let data: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("Data.json")).unwrap()).unwrap();
    assert_eq!(data["Gravity"], serde_json::json!(0.1235));
}

#[test]
fn manifests_record_relative_paths() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("out");

    extract::extract_save(&demo_save(), &ExtractOptions::new(&out), &PassthroughScripts).unwrap();

    let contents: serde_json::Value = read_json(&out.join("Contents.json"));
    assert_eq!(contents[0]["path"], "./Deck.abc123");

    let deck = out.join("Deck.abc123");
    let contents: serde_json::Value = read_json(&deck.join("Contents.json"));
    assert_eq!(contents[0]["path"], "./Card.def456");
    assert_eq!(contents[1]["path"], "./Card.def456.1");

    let states: serde_json::Value = read_json(&deck.join("States.json"));
    assert_eq!(states["2"]["path"], "./2-Alt.ghi789");

    let children: serde_json::Value = read_json(&deck.join("Children.json"));
    assert_eq!(children[0]["path"], "./Base.jkl012");
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}
